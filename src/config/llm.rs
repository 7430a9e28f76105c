// src/config/llm.rs
use serde::{Deserialize, Serialize};
use std::env;

fn default_provider() -> String {
    "openai".to_string()
}
fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_temperature() -> f32 {
    0.8
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Only "openai" (any OpenAI-compatible endpoint) is supported.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" means: read from OPENAI_API_KEY.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    /// Draft temperature; edit stages run cooler.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Per-call budget; a call that exceeds it counts as a failed stage.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_provider(),
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: default_api_key(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Lower-case the provider, resolve "ENV" keys and sanitize numbers.
    pub fn normalize(&mut self) {
        self.provider = self.provider.trim().to_lowercase();

        if self.api_key.trim().eq_ignore_ascii_case("env") {
            self.api_key = env::var("OPENAI_API_KEY").unwrap_or_default();
            if self.enabled && self.api_key.is_empty() {
                tracing::warn!("LLM enabled but OPENAI_API_KEY is not set; calls will fail");
            }
        }

        if !self.temperature.is_finite() || !(0.0..=2.0).contains(&self.temperature) {
            self.temperature = default_temperature();
        }
        if self.timeout_secs == 0 {
            self.timeout_secs = default_timeout_secs();
        }
    }
}
