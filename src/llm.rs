// src/llm.rs
//! LLM provider abstraction: OpenAI-compatible chat completions, a disabled
//! client and a deterministic mock for local runs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::llm::LlmConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Text,
    /// Ask the provider for a single JSON object.
    Json,
}

#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub format: ResponseFormat,
    pub temperature: f32,
}

/// `success == false` means the provider answered but produced nothing usable.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmResponse {
    pub success: bool,
    pub text: String,
}

impl LlmResponse {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            success: true,
            text: text.into(),
        }
    }

    pub fn failed() -> Self {
        Self {
            success: false,
            text: String::new(),
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, req: &LlmRequest) -> Result<LlmResponse>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynLlm = Arc<dyn LlmClient>;

/// Build a client according to config and environment.
///
/// * `AI_TEST_MODE=mock` returns [`MockLlmClient`].
/// * `enabled = false` returns [`DisabledClient`].
/// * Otherwise an [`OpenAiClient`].
pub fn build_llm_client(cfg: &LlmConfig) -> Result<DynLlm> {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        info!("LLM in mock mode (AI_TEST_MODE=mock)");
        return Ok(Arc::new(MockLlmClient));
    }
    if !cfg.enabled {
        info!("LLM disabled in config; drafts will fail and produce nothing");
        return Ok(Arc::new(DisabledClient));
    }
    match cfg.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiClient::new(cfg)?)),
        other => Err(Error::Config(format!("unsupported LLM provider `{other}`"))),
    }
}

/// Chat Completions client. Works with any OpenAI-compatible endpoint.
pub struct OpenAiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(cfg: &LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("satire-desk/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: cfg.endpoint.clone(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate(&self, req: &LlmRequest) -> Result<LlmResponse> {
        if self.api_key.is_empty() {
            return Ok(LlmResponse::failed());
        }

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Format {
            #[serde(rename = "type")]
            kind: &'static str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            #[serde(skip_serializing_if = "Option::is_none")]
            response_format: Option<Format>,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: Option<String>,
        }

        let mut messages = Vec::with_capacity(2);
        if let Some(sys) = req.system.as_deref() {
            messages.push(Msg {
                role: "system",
                content: sys,
            });
        }
        messages.push(Msg {
            role: "user",
            content: &req.prompt,
        });
        let body = Req {
            model: &self.model,
            messages,
            temperature: req.temperature,
            response_format: match req.format {
                ResponseFormat::Json => Some(Format {
                    kind: "json_object",
                }),
                ResponseFormat::Text => None,
            },
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            debug!(target: "llm", %status, "chat completion returned non-success status");
            return Ok(LlmResponse::failed());
        }
        let parsed: Resp = resp.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(LlmResponse::failed());
        }
        Ok(LlmResponse::ok(content))
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// Always unsuccessful; used when the LLM is switched off.
pub struct DisabledClient;

#[async_trait]
impl LlmClient for DisabledClient {
    async fn generate(&self, _req: &LlmRequest) -> Result<LlmResponse> {
        Ok(LlmResponse::failed())
    }

    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Deterministic stand-in: JSON requests get a fixed draft built from the
/// prompt's headline line; text requests echo the `<article>` body back.
pub struct MockLlmClient;

/// Text between the last `<article>` and the `</article>` after it, if present.
/// Instructions may mention the tags before the real block.
pub fn extract_article_body(prompt: &str) -> Option<&str> {
    let start = prompt.rfind("<article>")? + "<article>".len();
    let end = prompt[start..].find("</article>")? + start;
    Some(prompt[start..end].trim())
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn generate(&self, req: &LlmRequest) -> Result<LlmResponse> {
        match req.format {
            ResponseFormat::Json => {
                let headline = req
                    .prompt
                    .lines()
                    .find_map(|l| l.strip_prefix("Headline: "))
                    .unwrap_or("Area Desk Reports Quiet Day")
                    .trim();
                let draft = serde_json::json!({
                    "title": format!("Nation Reacts: {headline}"),
                    "content": format!("In a development experts called \"entirely foreseeable\", {headline}."),
                    "category": "world",
                    "short_description": format!("{headline}, reportedly."),
                    "image_prompt": format!("editorial photo illustrating: {headline}"),
                });
                Ok(LlmResponse::ok(draft.to_string()))
            }
            ResponseFormat::Text => Ok(extract_article_body(&req.prompt)
                .map(LlmResponse::ok)
                .unwrap_or_else(LlmResponse::failed)),
        }
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
