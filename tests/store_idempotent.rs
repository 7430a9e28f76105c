// tests/store_idempotent.rs
mod common;

use satire_desk::models::{FeaturedArticle, GeneratedArticle, SourceItem};
use satire_desk::store::memory::MemoryAdapter;
use satire_desk::store::sqlite::SqliteStore;
use satire_desk::store::Repository;
use satire_desk::Error;

fn exercise_sources(repo: &Repository<SourceItem>) {
    let mut a = common::source("nd-1", "First");
    assert!(repo.create(&mut a).unwrap());

    // same key, different payload: still a duplicate, original kept
    let mut dup = common::source("nd-1", "Changed title");
    assert!(!repo.create(&mut dup).unwrap());
    assert_eq!(repo.read_all().unwrap().len(), 1);
    assert_eq!(repo.read_by_key("nd-1").unwrap().unwrap().title, "First");
    assert!(repo.read_by_key("nd-404").unwrap().is_none());
}

fn exercise_articles(repo: &Repository<GeneratedArticle>) {
    let mut a = common::article_with_timestamp("", "2024-05-02T10:00:00Z");
    assert!(repo.create(&mut a).unwrap());
    assert!(!a.key.is_empty(), "create assigns a key");

    let mut flagged = a.clone();
    flagged.is_featured = true;
    flagged.featured_date = Some("2024-05-02".into());
    flagged.title = "ignored".into();
    assert!(repo.update(&flagged).unwrap());
    assert!(!repo.update(&flagged).unwrap(), "second identical update is a no-op");

    let stored = repo.read_by_key(&a.key).unwrap().unwrap();
    assert!(stored.is_featured);
    assert_eq!(stored.title, a.title, "title is not a mutable field");

    let ghost = common::article_with_timestamp("ghost", "2024-05-02T10:00:00Z");
    assert!(matches!(repo.update(&ghost), Err(Error::NotFound { .. })));
}

#[test]
fn memory_engine_is_idempotent() {
    exercise_sources(&Repository::new(MemoryAdapter::<SourceItem>::new()));
    exercise_articles(&Repository::new(MemoryAdapter::<GeneratedArticle>::new()));
}

#[test]
fn sqlite_engine_is_idempotent_and_durable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("desk.sqlite");
    {
        let db = SqliteStore::open(&path).unwrap();
        exercise_sources(&Repository::new(db.adapter::<SourceItem>()));
        exercise_articles(&Repository::new(db.adapter::<GeneratedArticle>()));
    }
    // reopen: rows survived, duplicates still refused
    let db = SqliteStore::open(&path).unwrap();
    let sources: Repository<SourceItem> = Repository::new(db.adapter::<SourceItem>());
    assert_eq!(sources.read_all().unwrap().len(), 1);
    assert!(!sources.create(&mut common::source("nd-1", "Again")).unwrap());
}

#[test]
fn one_featured_record_per_day() {
    let db = SqliteStore::open_in_memory().unwrap();
    let repo: Repository<FeaturedArticle> = Repository::new(db.adapter::<FeaturedArticle>());
    let mut first = FeaturedArticle {
        date: "2024-05-02".into(),
        article_key: "a".into(),
        created_at: chrono::Utc::now(),
    };
    let mut second = FeaturedArticle {
        article_key: "b".into(),
        ..first.clone()
    };
    assert!(repo.create(&mut first).unwrap());
    assert!(!repo.create(&mut second).unwrap());
    assert_eq!(repo.read_by_key("2024-05-02").unwrap().unwrap().article_key, "a");
}
