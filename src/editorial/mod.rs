// src/editorial/mod.rs
//! Four-stage editorial pipeline: draft, structural edit, humor edit, copy edit.
//!
//! Only the draft can sink an article. Every later stage returns its input
//! unchanged when its LLM call fails, times out or answers with nothing, so a
//! flaky provider costs quality, never the article.

pub mod prompts;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::llm::{extract_article_body, DynLlm, LlmRequest};
use crate::models::{Category, SourceItem, Voice};
use crate::style::StyleCatalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Draft,
    StructuralEdit,
    HumorEdit,
    CopyEdit,
    Ready,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Draft => "draft",
            Stage::StructuralEdit => "structural_edit",
            Stage::HumorEdit => "humor_edit",
            Stage::CopyEdit => "copy_edit",
            Stage::Ready => "ready",
        }
    }

    pub fn next(&self) -> Stage {
        match self {
            Stage::Draft => Stage::StructuralEdit,
            Stage::StructuralEdit => Stage::HumorEdit,
            Stage::HumorEdit => Stage::CopyEdit,
            Stage::CopyEdit | Stage::Ready => Stage::Ready,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured output of the draft stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub title: String,
    pub content: String,
    pub category: Category,
    pub short_description: String,
    pub image_prompt: String,
}

#[derive(Debug, Deserialize)]
struct DraftJson {
    title: String,
    content: String,
    #[serde(default)]
    category: String,
    #[serde(default, alias = "shortDescription")]
    short_description: String,
    #[serde(default, alias = "imagePrompt")]
    image_prompt: String,
}

/// Parse the draft reply. Tolerates code fences and chatter around the JSON
/// object; a missing title/content or broken JSON is a draft failure.
pub fn parse_draft(text: &str) -> Result<Draft> {
    let start = text
        .find('{')
        .ok_or_else(|| Error::DraftFailed("no JSON object in reply".into()))?;
    let end = text
        .rfind('}')
        .filter(|&e| e > start)
        .ok_or_else(|| Error::DraftFailed("unterminated JSON object in reply".into()))?;
    let raw: DraftJson = serde_json::from_str(&text[start..=end])
        .map_err(|e| Error::DraftFailed(format!("malformed draft JSON: {e}")))?;

    let title = raw.title.trim().to_string();
    let content = raw.content.trim().to_string();
    if title.is_empty() || content.is_empty() {
        return Err(Error::DraftFailed("draft missing title or content".into()));
    }
    let category = raw.category.parse::<Category>().unwrap_or_else(|e| {
        debug!(target: "editorial", error = %e, "draft category defaulted");
        Category::default()
    });
    let short_description = if raw.short_description.trim().is_empty() {
        first_sentence(&content)
    } else {
        raw.short_description.trim().to_string()
    };
    Ok(Draft {
        image_prompt: if raw.image_prompt.trim().is_empty() {
            title.clone()
        } else {
            raw.image_prompt.trim().to_string()
        },
        title,
        content,
        category,
        short_description,
    })
}

fn first_sentence(text: &str) -> String {
    let end = text
        .find(['.', '!', '?'])
        .map(|i| i + 1)
        .unwrap_or(text.len());
    text[..end].chars().take(200).collect::<String>().trim().to_string()
}

/// Result of one non-draft stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome {
    pub text: String,
    pub changed: bool,
    /// Human-readable editor note.
    pub note: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditorNote {
    pub stage: Stage,
    pub changed: bool,
    pub note: String,
}

/// A draft that has been through every stage; `draft.content` holds the final text.
#[derive(Debug, Clone)]
pub struct EditedArticle {
    pub draft: Draft,
    pub style_key: String,
    pub notes: Vec<EditorNote>,
}

pub struct EditorialPipeline {
    llm: DynLlm,
    styles: Arc<StyleCatalog>,
    call_timeout: Duration,
    draft_temperature: f32,
}

impl EditorialPipeline {
    pub fn new(
        llm: DynLlm,
        styles: Arc<StyleCatalog>,
        call_timeout: Duration,
        draft_temperature: f32,
    ) -> Self {
        Self {
            llm,
            styles,
            call_timeout,
            draft_temperature,
        }
    }

    pub fn styles(&self) -> &StyleCatalog {
        &self.styles
    }

    /// One bounded LLM call; anything but a non-empty successful reply is a failure.
    async fn call(&self, stage: Stage, req: &LlmRequest) -> Result<String> {
        let failure = |reason: String| Error::StageFailure {
            stage: stage.as_str(),
            reason,
        };
        let resp = match tokio::time::timeout(self.call_timeout, self.llm.generate(req)).await {
            Ok(Ok(r)) => r,
            Ok(Err(e)) => return Err(failure(e.to_string())),
            Err(_) => return Err(failure(format!("timed out after {:?}", self.call_timeout))),
        };
        if !resp.success || resp.text.trim().is_empty() {
            return Err(failure("unsuccessful or empty reply".into()));
        }
        Ok(resp.text)
    }

    /// First stage. Failure here abandons the article.
    pub async fn draft(&self, voice: &Voice, source: &SourceItem, style_key: &str) -> Result<Draft> {
        let style = self.styles.get_or_default(style_key);
        let req = prompts::draft(voice, style, source, self.draft_temperature);
        let text = self
            .call(Stage::Draft, &req)
            .await
            .map_err(|e| Error::DraftFailed(e.to_string()))?;
        parse_draft(&text)
    }

    pub async fn structural_edit(&self, text: &str, source: &SourceItem) -> StageOutcome {
        let req = prompts::structural_edit(text, source);
        let res = self.call(Stage::StructuralEdit, &req).await;
        settle(Stage::StructuralEdit, text, res)
    }

    pub async fn humor_edit(&self, text: &str, style_key: &str) -> StageOutcome {
        let req = prompts::humor_edit(text, self.styles.get_or_default(style_key));
        let res = self.call(Stage::HumorEdit, &req).await;
        settle(Stage::HumorEdit, text, res)
    }

    pub async fn copy_edit(&self, text: &str, style_key: &str) -> StageOutcome {
        let req = prompts::copy_edit(text, self.styles.get_or_default(style_key));
        let res = self.call(Stage::CopyEdit, &req).await;
        settle(Stage::CopyEdit, text, res)
    }

    /// Run all stages in order for one article.
    pub async fn run(&self, voice: &Voice, source: &SourceItem, style_key: &str) -> Result<EditedArticle> {
        let mut draft = self.draft(voice, source, style_key).await?;
        let mut notes = Vec::with_capacity(3);
        let mut stage = Stage::Draft.next();

        while stage != Stage::Ready {
            let outcome = match stage {
                Stage::StructuralEdit => self.structural_edit(&draft.content, source).await,
                Stage::HumorEdit => self.humor_edit(&draft.content, style_key).await,
                Stage::CopyEdit => self.copy_edit(&draft.content, style_key).await,
                Stage::Draft | Stage::Ready => unreachable!("draft handled above, ready ends the loop"),
            };
            notes.push(EditorNote {
                stage,
                changed: outcome.changed,
                note: outcome.note,
            });
            draft.content = outcome.text;
            stage = stage.next();
        }

        Ok(EditedArticle {
            draft,
            style_key: style_key.to_string(),
            notes,
        })
    }
}

/// Models sometimes echo the tags or wrap replies in fences; keep the body only.
fn clean_edit_output(reply: &str) -> String {
    let body = extract_article_body(reply).unwrap_or(reply);
    body.trim()
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
        .to_string()
}

/// Apply the fallback rule for a non-draft stage.
fn settle(stage: Stage, input: &str, res: Result<String>) -> StageOutcome {
    match res {
        Ok(reply) => {
            let text = clean_edit_output(&reply);
            if text.is_empty() {
                return fallback(stage, input, "reply had no article body");
            }
            let changed = text != input.trim();
            let note = if changed {
                format!("{stage}: revised")
            } else {
                format!("{stage}: no changes needed")
            };
            StageOutcome {
                text,
                changed,
                note,
            }
        }
        Err(e) => fallback(stage, input, &e.to_string()),
    }
}

fn fallback(stage: Stage, input: &str, reason: &str) -> StageOutcome {
    warn!(target: "editorial", stage = stage.as_str(), reason, "stage failed, keeping previous text");
    counter!("editorial_stage_fallbacks_total", "stage" => stage.as_str()).increment(1);
    StageOutcome {
        text: input.to_string(),
        changed: false,
        note: format!("{stage}: skipped ({reason})"),
    }
}
