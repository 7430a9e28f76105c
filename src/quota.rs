// src/quota.rs
//! Inventory quota: how many articles the trailing window is short of, and
//! how many source items to ask the feed for to cover it.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::warn;

use crate::error::Result;
use crate::models::{GeneratedArticle, SourceItem};
use crate::store::Repository;

/// Start of a trailing window of `hours` ending at `now`.
pub fn window_start(now: DateTime<Utc>, hours: u32) -> DateTime<Utc> {
    now - Duration::hours(i64::from(hours))
}

/// Articles stamped at or after `since`. Rows with an unparsable timestamp
/// are skipped with a warning; they are never repaired or removed here.
pub fn count_articles_since(articles: &[GeneratedArticle], since: DateTime<Utc>) -> usize {
    articles
        .iter()
        .filter(|a| match a.published_at() {
            Some(ts) => ts >= since,
            None => {
                warn!(
                    target: "quota",
                    key = %a.key,
                    timestamp = %a.timestamp,
                    "malformed article timestamp, excluded from quota"
                );
                false
            }
        })
        .count()
}

/// `max(0, minimum - existing)`.
pub fn shortfall(existing: usize, minimum: u32) -> u32 {
    let existing = u32::try_from(existing).unwrap_or(u32::MAX);
    minimum.saturating_sub(existing)
}

/// How many articles the window `[window_start, now]` is short of `minimum`.
pub fn deficit(
    articles: &Repository<GeneratedArticle>,
    window_start: DateTime<Utc>,
    minimum: u32,
) -> Result<u32> {
    let all = articles.read_all()?;
    Ok(shortfall(count_articles_since(&all, window_start), minimum))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillPlan {
    /// Articles to generate this cycle.
    pub deficit: u32,
    /// Source items to request; oversampled so the random draw has choices.
    pub source_request: u32,
}

/// `None` when there is nothing to backfill.
pub fn plan_backfill(deficit: u32, oversample_factor: u32) -> Option<BackfillPlan> {
    if deficit == 0 {
        return None;
    }
    Some(BackfillPlan {
        deficit,
        source_request: deficit.saturating_mul(oversample_factor.max(1)),
    })
}

/// Stored items no article points at yet, newest first.
pub fn unused_sources(sources: Vec<SourceItem>, articles: &[GeneratedArticle]) -> Vec<SourceItem> {
    let used: HashSet<&str> = articles
        .iter()
        .filter_map(|a| a.source_item_ref.as_deref())
        .collect();
    let mut out: Vec<SourceItem> = sources
        .into_iter()
        .filter(|s| !used.contains(s.id.as_str()))
        .collect();
    out.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    out
}

/// Draw up to `n` items uniformly at random without replacement.
pub fn draw_sources<R: Rng + ?Sized>(
    mut pool: Vec<SourceItem>,
    n: usize,
    rng: &mut R,
) -> Vec<SourceItem> {
    pool.shuffle(rng);
    pool.truncate(n);
    pool
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, WriterType};
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn article(key: &str, ts: &str, source: Option<&str>) -> GeneratedArticle {
        GeneratedArticle {
            key: key.into(),
            title: key.into(),
            content: String::new(),
            author_ref: "w".into(),
            timestamp: ts.into(),
            category: Category::World,
            head_image_ref: String::new(),
            short_description: String::new(),
            source_item_ref: source.map(String::from),
            writer_type: WriterType::Ai,
            is_featured: false,
            featured_date: None,
        }
    }

    fn item(id: &str, hour: u32) -> SourceItem {
        SourceItem {
            id: id.into(),
            title: id.into(),
            description: String::new(),
            published_at: Utc.with_ymd_and_hms(2025, 5, 1, hour, 0, 0).unwrap(),
            timezone: "UTC".into(),
        }
    }

    #[test]
    fn counts_only_parsable_in_window() {
        let since = Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap();
        let arts = vec![
            article("old", "2025-04-30T23:59:59Z", None),
            article("edge", "2025-05-01T00:00:00Z", None),
            article("new", "2025-05-01T12:00:00+02:00", None),
            article("junk", "not a date", None),
        ];
        assert_eq!(count_articles_since(&arts, since), 2);
    }

    #[test]
    fn shortfall_never_negative() {
        assert_eq!(shortfall(7, 10), 3);
        assert_eq!(shortfall(10, 10), 0);
        assert_eq!(shortfall(25, 10), 0);
    }

    #[test]
    fn plan_oversamples() {
        assert_eq!(plan_backfill(0, 2), None);
        assert_eq!(
            plan_backfill(3, 2),
            Some(BackfillPlan {
                deficit: 3,
                source_request: 6
            })
        );
    }

    #[test]
    fn unused_excludes_referenced_and_sorts_newest_first() {
        let sources = vec![item("a", 1), item("b", 5), item("c", 3)];
        let arts = vec![article("x", "2025-05-01T00:00:00Z", Some("b"))];
        let out = unused_sources(sources, &arts);
        let ids: Vec<&str> = out.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[test]
    fn draw_is_without_replacement() {
        let pool: Vec<SourceItem> = (0..6).map(|i| item(&format!("s{i}"), i)).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let picked = draw_sources(pool, 3, &mut rng);
        assert_eq!(picked.len(), 3);
        let ids: HashSet<&str> = picked.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn draw_from_small_pool_returns_all() {
        let pool = vec![item("only", 1)];
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(draw_sources(pool, 3, &mut rng).len(), 1);
    }
}
