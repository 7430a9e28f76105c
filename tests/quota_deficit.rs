// tests/quota_deficit.rs
mod common;

use chrono::{Duration, Utc};
use satire_desk::models::GeneratedArticle;
use satire_desk::quota::{deficit, plan_backfill, window_start};
use satire_desk::store::memory::MemoryAdapter;
use satire_desk::store::Repository;

#[test]
fn seven_recent_of_ten_needs_three() {
    let now = Utc::now();
    let mut rows = Vec::new();
    for i in 0..7 {
        rows.push(common::article_at(&format!("recent-{i}"), now - Duration::hours(i + 1)));
    }
    // outside the window, and one row nobody can parse
    rows.push(common::article_at("old", now - Duration::hours(30)));
    rows.push(common::article_with_timestamp("broken", "yesterday-ish"));

    let repo: Repository<GeneratedArticle> =
        Repository::new(MemoryAdapter::with_records(rows));
    let d = deficit(&repo, window_start(now, 24), 10).unwrap();
    assert_eq!(d, 3);

    let plan = plan_backfill(d, 2).unwrap();
    assert_eq!(plan.source_request, 6);
}

#[test]
fn surplus_is_zero_deficit() {
    let now = Utc::now();
    let rows: Vec<_> = (0..12)
        .map(|i| common::article_at(&format!("a{i}"), now - Duration::minutes(i * 10)))
        .collect();
    let repo: Repository<GeneratedArticle> =
        Repository::new(MemoryAdapter::with_records(rows));

    let d = deficit(&repo, window_start(now, 24), 10).unwrap();
    assert_eq!(d, 0);
    assert!(plan_backfill(d, 2).is_none());
}

#[test]
fn window_boundary_is_inclusive() {
    let now = Utc::now();
    let since = window_start(now, 24);
    let repo: Repository<GeneratedArticle> = Repository::new(MemoryAdapter::with_records(vec![
        common::article_at("edge", since),
        common::article_at("just-out", since - Duration::seconds(1)),
    ]));
    assert_eq!(deficit(&repo, since, 2).unwrap(), 1);
}
