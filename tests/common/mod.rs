// tests/common/mod.rs
// Shared fakes for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use satire_desk::llm::{
    extract_article_body, LlmClient, LlmRequest, LlmResponse, MockLlmClient, ResponseFormat,
};
use satire_desk::models::{Category, GeneratedArticle, SourceItem, Voice, WriterType};
use satire_desk::news::{NewsPage, RawNewsItem};
use satire_desk::Error;

/// How the edit stages (text requests) misbehave.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditMode {
    Echo,
    /// Each stage appends its own `[structural]`, `[humor]` or `[copy]` marker.
    /// A stage named in `fail` answers unsuccessfully instead.
    Tag { fail: Option<&'static str> },
    Unsuccessful,
    Error,
    Hang,
}

/// Mock LLM with knobs: drafts fail for chosen headlines, edits can fail.
pub struct ScriptedLlm {
    pub fail_draft_for: Vec<String>,
    pub edits: EditMode,
    pub draft_calls: AtomicUsize,
    pub edit_calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self {
            fail_draft_for: Vec::new(),
            edits: EditMode::Echo,
            draft_calls: AtomicUsize::new(0),
            edit_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_draft_for(mut self, headline: &str) -> Self {
        self.fail_draft_for.push(headline.to_string());
        self
    }

    pub fn with_edits(mut self, mode: EditMode) -> Self {
        self.edits = mode;
        self
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn generate(&self, req: &LlmRequest) -> satire_desk::Result<LlmResponse> {
        match req.format {
            ResponseFormat::Json => {
                self.draft_calls.fetch_add(1, Ordering::SeqCst);
                if self.fail_draft_for.iter().any(|h| req.prompt.contains(h.as_str())) {
                    return Ok(LlmResponse::ok("{\"title\": \"half a draft\""));
                }
                MockLlmClient.generate(req).await
            }
            ResponseFormat::Text => {
                self.edit_calls.fetch_add(1, Ordering::SeqCst);
                match self.edits {
                    EditMode::Echo => MockLlmClient.generate(req).await,
                    EditMode::Tag { fail } => {
                        let tag = stage_tag(&req.prompt);
                        if fail == Some(tag) {
                            return Ok(LlmResponse::failed());
                        }
                        let body = extract_article_body(&req.prompt).unwrap_or_default();
                        Ok(LlmResponse::ok(format!("<article>\n{body} [{tag}]\n</article>")))
                    }
                    EditMode::Unsuccessful => Ok(LlmResponse::failed()),
                    EditMode::Error => Err(Error::Upstream {
                        service: "scripted",
                        message: "edit refused".into(),
                    }),
                    EditMode::Hang => {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        Ok(LlmResponse::failed())
                    }
                }
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

/// Which edit stage a prompt belongs to, going by the editor it addresses.
pub fn stage_tag(prompt: &str) -> &'static str {
    if prompt.contains("structural editor") {
        "structural"
    } else if prompt.contains("humor editor") {
        "humor"
    } else if prompt.contains("copy editor") {
        "copy"
    } else {
        "unknown"
    }
}

pub fn raw_item(id: &str, title: &str) -> RawNewsItem {
    RawNewsItem {
        id: id.to_string(),
        title: title.to_string(),
        description: Some(format!("Details about {title}.")),
        published_at: Some("2024-05-02 08:00:00".to_string()),
        timezone: Some("UTC".to_string()),
    }
}

/// `pages` pages of `per_page` items with ids `{prefix}-{page}-{n}`, chained.
pub fn pages(prefix: &str, pages: usize, per_page: usize) -> Vec<NewsPage> {
    (0..pages)
        .map(|p| NewsPage {
            items: (0..per_page)
                .map(|n| {
                    raw_item(
                        &format!("{prefix}-{p}-{n}"),
                        &format!("Story {n} on page {p}"),
                    )
                })
                .collect(),
            next_page: None,
        })
        .collect()
}

pub fn source(id: &str, title: &str) -> SourceItem {
    SourceItem {
        id: id.to_string(),
        title: title.to_string(),
        description: format!("Details about {title}."),
        published_at: Utc::now(),
        timezone: "UTC".to_string(),
    }
}

pub fn voice(key: &str) -> Voice {
    Voice {
        key: key.to_string(),
        display_name: format!("Writer {key}"),
        bio: String::new(),
        system_prompt: format!("You are writer {key}."),
        profile_image_ref: String::new(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn article_at(key: &str, ts: DateTime<Utc>) -> GeneratedArticle {
    article_with_timestamp(key, &ts.to_rfc3339())
}

pub fn article_with_timestamp(key: &str, timestamp: &str) -> GeneratedArticle {
    GeneratedArticle {
        key: key.to_string(),
        title: format!("Article {key}"),
        content: "Body.".to_string(),
        author_ref: "staff".to_string(),
        timestamp: timestamp.to_string(),
        category: Category::World,
        head_image_ref: "images/placeholder.webp".to_string(),
        short_description: "Teaser.".to_string(),
        source_item_ref: None,
        writer_type: WriterType::Human,
        is_featured: false,
        featured_date: None,
    }
}
