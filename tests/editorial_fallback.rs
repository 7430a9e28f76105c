// tests/editorial_fallback.rs
mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{EditMode, ScriptedLlm};
use satire_desk::editorial::{EditorialPipeline, Stage};
use satire_desk::llm::MockLlmClient;
use satire_desk::style::StyleCatalog;
use satire_desk::Error;

fn pipeline(llm: Arc<ScriptedLlm>, timeout: Duration) -> EditorialPipeline {
    EditorialPipeline::new(llm, Arc::new(StyleCatalog::builtin()), timeout, 0.8)
}

async fn run_with(mode: EditMode) -> (satire_desk::editorial::EditedArticle, satire_desk::editorial::Draft) {
    let source = common::source("n1", "Mayor cancels Tuesday");
    let voice = common::voice("w1");

    let reference = pipeline(Arc::new(ScriptedLlm::new()), Duration::from_secs(5));
    let draft = reference.draft(&voice, &source, "deadpan_wire").await.unwrap();

    let llm = Arc::new(ScriptedLlm::new().with_edits(mode));
    let p = pipeline(llm.clone(), Duration::from_millis(200));
    let edited = p.run(&voice, &source, "deadpan_wire").await.unwrap();
    assert_eq!(llm.draft_calls.load(Ordering::SeqCst), 1);
    assert_eq!(llm.edit_calls.load(Ordering::SeqCst), 3);
    (edited, draft)
}

#[tokio::test]
async fn failing_edits_leave_the_draft_untouched() {
    for mode in [EditMode::Unsuccessful, EditMode::Error] {
        let (edited, draft) = run_with(mode).await;
        assert_eq!(edited.draft, draft, "mode {mode:?}");
        assert_eq!(edited.notes.len(), 3);
        assert!(edited.notes.iter().all(|n| !n.changed));
        assert_eq!(
            edited.notes.iter().map(|n| n.stage).collect::<Vec<_>>(),
            vec![Stage::StructuralEdit, Stage::HumorEdit, Stage::CopyEdit]
        );
    }
}

#[tokio::test(start_paused = true)]
async fn hung_edits_time_out_and_fall_back() {
    let (edited, draft) = run_with(EditMode::Hang).await;
    assert_eq!(edited.draft.content, draft.content);
    assert!(edited.notes.iter().all(|n| n.note.contains("skipped")));
}

#[tokio::test]
async fn echoing_editor_keeps_content() {
    let (edited, draft) = run_with(EditMode::Echo).await;
    assert_eq!(edited.draft.content, draft.content);
    assert_eq!(edited.style_key, "deadpan_wire");
    for n in &edited.notes {
        assert!(!n.changed);
        assert!(n.note.ends_with("no changes needed"), "{}", n.note);
    }
}

#[tokio::test]
async fn mock_client_completes_every_edit_stage() {
    let p = EditorialPipeline::new(
        Arc::new(MockLlmClient),
        Arc::new(StyleCatalog::builtin()),
        Duration::from_secs(5),
        0.8,
    );
    let edited = p
        .run(&common::voice("w1"), &common::source("n1", "Mayor cancels Tuesday"), "deadpan_wire")
        .await
        .unwrap();
    assert_eq!(edited.notes.len(), 3);
    assert!(
        edited.notes.iter().all(|n| !n.note.contains("skipped")),
        "{:?}",
        edited.notes
    );
    assert!(edited.draft.content.contains("Mayor cancels Tuesday"));
}

#[tokio::test]
async fn each_stage_edits_the_previous_output() {
    let (edited, draft) = run_with(EditMode::Tag { fail: None }).await;
    let content = &edited.draft.content;
    assert!(content.starts_with(draft.content.as_str()), "{content}");
    assert!(content.ends_with("[structural] [humor] [copy]"), "{content}");
    assert!(edited.notes.iter().all(|n| n.changed && n.note.ends_with("revised")));
}

#[tokio::test]
async fn failing_middle_stage_keeps_its_neighbours_work() {
    let (edited, _) = run_with(EditMode::Tag { fail: Some("humor") }).await;
    let content = &edited.draft.content;
    assert!(content.ends_with("[structural] [copy]"), "{content}");
    assert!(!content.contains("[humor]"));

    let changed: Vec<(Stage, bool)> = edited.notes.iter().map(|n| (n.stage, n.changed)).collect();
    assert_eq!(
        changed,
        vec![
            (Stage::StructuralEdit, true),
            (Stage::HumorEdit, false),
            (Stage::CopyEdit, true),
        ]
    );
    assert!(edited.notes[1].note.contains("skipped"));
}

#[tokio::test]
async fn broken_draft_aborts_the_article() {
    let llm = Arc::new(ScriptedLlm::new().failing_draft_for("Mayor cancels Tuesday"));
    let p = pipeline(llm.clone(), Duration::from_secs(5));

    let err = p
        .run(&common::voice("w1"), &common::source("n1", "Mayor cancels Tuesday"), "deadpan_wire")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DraftFailed(_)));
    assert_eq!(llm.edit_calls.load(Ordering::SeqCst), 0, "no edits after a failed draft");
}

#[tokio::test]
async fn unknown_style_uses_default_profile() {
    let p = pipeline(Arc::new(ScriptedLlm::new()), Duration::from_secs(5));
    let edited = p
        .run(&common::voice("w1"), &common::source("n2", "Bridge opens"), "no_such_style")
        .await
        .unwrap();
    assert!(edited.draft.title.contains("Bridge opens"));
}
