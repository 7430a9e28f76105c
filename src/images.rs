// src/images.rs
//! Head-image collaborator. Generation and compression live elsewhere; the
//! desk only needs an opaque reference back.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait ImageService: Send + Sync {
    /// Produce and store an image for `prompt`, returning its reference.
    async fn generate_and_store(&self, prompt: &str) -> Result<String>;
}

/// Hands out the same stock reference for every article.
pub struct PlaceholderImages {
    reference: String,
}

impl PlaceholderImages {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
        }
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }
}

#[async_trait]
impl ImageService for PlaceholderImages {
    async fn generate_and_store(&self, _prompt: &str) -> Result<String> {
        Ok(self.reference.clone())
    }
}
