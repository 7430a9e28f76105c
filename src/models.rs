// src/models.rs
//! Entities persisted by the desk and their key/update rules.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::store::Record;

/// A real news item pulled from the feed. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceItem {
    /// Feed-assigned, globally unique.
    pub id: String,
    pub title: String,
    pub description: String,
    pub published_at: DateTime<Utc>,
    /// Timezone label reported by the feed (e.g. "UTC"), kept verbatim.
    pub timezone: String,
}

/// A persona ("writer") whose system prompt flavors the draft.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Voice {
    pub key: String,
    pub display_name: String,
    #[serde(default)]
    pub bio: String,
    pub system_prompt: String,
    #[serde(default)]
    pub profile_image_ref: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// Tone template applied on top of a voice for a single article.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StyleProfile {
    pub style_key: String,
    pub name: String,
    pub description: String,
    pub voice_guidelines: String,
    pub comedic_approach: String,
    #[serde(default)]
    pub example_headline: Option<String>,
    #[serde(default)]
    pub example_paragraph: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    World,
    Politics,
    Business,
    Technology,
    Science,
    Health,
    Sports,
    Entertainment,
    Lifestyle,
    Local,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::World,
        Category::Politics,
        Category::Business,
        Category::Technology,
        Category::Science,
        Category::Health,
        Category::Sports,
        Category::Entertainment,
        Category::Lifestyle,
        Category::Local,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::World => "world",
            Category::Politics => "politics",
            Category::Business => "business",
            Category::Technology => "technology",
            Category::Science => "science",
            Category::Health => "health",
            Category::Sports => "sports",
            Category::Entertainment => "entertainment",
            Category::Lifestyle => "lifestyle",
            Category::Local => "local",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    /// Case-insensitive; accepts a few common synonyms the model likes to emit.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase();
        let hit = match norm.as_str() {
            "tech" => Some(Category::Technology),
            "finance" | "economy" => Some(Category::Business),
            "culture" | "arts" => Some(Category::Entertainment),
            "international" | "global" => Some(Category::World),
            other => Category::ALL.iter().copied().find(|c| c.as_str() == other),
        };
        hit.ok_or_else(|| format!("unknown category `{s}`"))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum WriterType {
    #[default]
    #[serde(rename = "AI")]
    Ai,
    Human,
    Synthesis,
}

impl WriterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriterType::Ai => "AI",
            WriterType::Human => "Human",
            WriterType::Synthesis => "Synthesis",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "AI" => Some(WriterType::Ai),
            "Human" => Some(WriterType::Human),
            "Synthesis" => Some(WriterType::Synthesis),
            _ => None,
        }
    }
}

/// Terminal output of the editorial pipeline.
///
/// `timestamp` is stored as RFC 3339 text and parsed on read, so a corrupted
/// row surfaces as `None` from [`GeneratedArticle::published_at`] instead of
/// failing the whole listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeneratedArticle {
    pub key: String,
    pub title: String,
    pub content: String,
    pub author_ref: String,
    pub timestamp: String,
    pub category: Category,
    pub head_image_ref: String,
    pub short_description: String,
    pub source_item_ref: Option<String>,
    pub writer_type: WriterType,
    pub is_featured: bool,
    /// `YYYY-MM-DD` in local time.
    pub featured_date: Option<String>,
}

impl GeneratedArticle {
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn is_featured_on(&self, day: NaiveDate) -> bool {
        self.is_featured && self.featured_date.as_deref() == Some(featured_day_key(day).as_str())
    }
}

/// The day's pick; `date` is the natural key so one pick per day is enforced
/// by idempotent create.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeaturedArticle {
    pub date: String,
    pub article_key: String,
    pub created_at: DateTime<Utc>,
}

pub fn featured_day_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

// ------------------------------------------------------------
// Record impls: key access + which fields are mutable
// ------------------------------------------------------------

impl Record for SourceItem {
    const ENTITY: &'static str = "source_item";

    fn key(&self) -> &str {
        &self.id
    }
    fn set_key(&mut self, key: String) {
        self.id = key;
    }
    fn apply_update(&self, _target: &mut Self) -> bool {
        false
    }
}

impl Record for Voice {
    const ENTITY: &'static str = "voice";

    fn key(&self) -> &str {
        &self.key
    }
    fn set_key(&mut self, key: String) {
        self.key = key;
    }
    fn apply_update(&self, target: &mut Self) -> bool {
        let changed = target.display_name != self.display_name
            || target.bio != self.bio
            || target.system_prompt != self.system_prompt
            || target.profile_image_ref != self.profile_image_ref;
        if changed {
            target.display_name = self.display_name.clone();
            target.bio = self.bio.clone();
            target.system_prompt = self.system_prompt.clone();
            target.profile_image_ref = self.profile_image_ref.clone();
            target.updated_at = Utc::now();
        }
        changed
    }
}

impl Record for StyleProfile {
    const ENTITY: &'static str = "style_profile";

    fn key(&self) -> &str {
        &self.style_key
    }
    fn set_key(&mut self, key: String) {
        self.style_key = key;
    }
    fn apply_update(&self, _target: &mut Self) -> bool {
        false
    }
}

impl Record for GeneratedArticle {
    const ENTITY: &'static str = "article";

    fn key(&self) -> &str {
        &self.key
    }
    fn set_key(&mut self, key: String) {
        self.key = key;
    }
    fn apply_update(&self, target: &mut Self) -> bool {
        let changed =
            target.is_featured != self.is_featured || target.featured_date != self.featured_date;
        target.is_featured = self.is_featured;
        target.featured_date = self.featured_date.clone();
        changed
    }
}

impl Record for FeaturedArticle {
    const ENTITY: &'static str = "featured_article";

    fn key(&self) -> &str {
        &self.date
    }
    fn set_key(&mut self, key: String) {
        self.date = key;
    }
    fn apply_update(&self, target: &mut Self) -> bool {
        let changed = target.article_key != self.article_key;
        target.article_key = self.article_key.clone();
        changed
    }
}
