// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod budget;
pub mod config;
pub mod desk;
pub mod editorial;
pub mod error;
pub mod featured;
pub mod generation;
pub mod images;
pub mod llm;
pub mod metrics;
pub mod models;
pub mod news;
pub mod quota;
pub mod scheduler;
pub mod seed;
pub mod store;
pub mod style;

// ---- Re-exports for stable public API ----
pub use crate::desk::{Desk, Stores};
pub use crate::error::{Error, Result};
pub use crate::generation::{ArticleGenerator, GenerationReport};
