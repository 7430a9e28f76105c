// src/error.rs
//! Error taxonomy for the desk. Routine outcomes (budget or feed exhausted,
//! duplicate create) are either plain return values or `is_expected()` variants.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Not enough news-API tokens left today.
    #[error("news budget exhausted: need {needed} token(s), {remaining} remaining")]
    BudgetExhausted { needed: u32, remaining: u32 },

    /// The news feed ran out of pages before the request was satisfied.
    #[error("news source exhausted after {pages} page(s)")]
    SourceExhausted { pages: u32 },

    /// A non-draft editorial stage failed; callers fall back to the stage input.
    #[error("editorial stage `{stage}` failed: {reason}")]
    StageFailure { stage: &'static str, reason: String },

    /// The draft stage failed; nothing to edit, the article is abandoned.
    #[error("draft failed: {0}")]
    DraftFailed(String),

    #[error("{entity} `{key}` not found")]
    NotFound { entity: &'static str, key: String },

    #[error("malformed timestamp `{0}`")]
    MalformedTimestamp(String),

    #[error("{what} timed out after {after:?}")]
    Timeout { what: &'static str, after: Duration },

    #[error("storage: {0}")]
    Storage(#[from] rusqlite::Error),

    /// A thread panicked while holding a store lock.
    #[error("storage: {0} lock poisoned")]
    LockPoisoned(&'static str),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote answered, but with an error payload.
    #[error("upstream {service}: {message}")]
    Upstream {
        service: &'static str,
        message: String,
    },

    #[error("config: {0}")]
    Config(String),
}

impl Error {
    /// True for conditions that just mean "try again next cycle".
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Error::BudgetExhausted { .. } | Error::SourceExhausted { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
