// src/store/sqlite.rs
//! Embedded SQLite engine. One table per entity; the per-entity column
//! mapping is the [`SqlMapping`] impl, picked by type at compile time.

use std::marker::PhantomData;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, ToSql};
use tracing::info;

use super::{EntityAdapter, Record};
use crate::error::{Error, Result};
use crate::models::{
    Category, FeaturedArticle, GeneratedArticle, SourceItem, StyleProfile, Voice, WriterType,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS source_items (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    published_at TEXT NOT NULL,
    timezone TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS writers (
    key TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    bio TEXT NOT NULL,
    system_prompt TEXT NOT NULL,
    profile_image_ref TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS articles (
    key TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    author_ref TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    category TEXT NOT NULL,
    head_image_ref TEXT NOT NULL,
    short_description TEXT NOT NULL,
    source_item_ref TEXT,
    writer_type TEXT NOT NULL,
    is_featured INTEGER NOT NULL DEFAULT 0,
    featured_date TEXT
);
CREATE INDEX IF NOT EXISTS idx_articles_timestamp ON articles(timestamp);
CREATE TABLE IF NOT EXISTS featured_articles (
    date TEXT PRIMARY KEY,
    article_key TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS styles (
    style_key TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    voice_guidelines TEXT NOT NULL,
    comedic_approach TEXT NOT NULL,
    example_headline TEXT,
    example_paragraph TEXT,
    is_default INTEGER NOT NULL DEFAULT 0
);
"#;

/// Shared connection handle. Writes are visible to the next read immediately.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                let _ = std::fs::create_dir_all(dir); // best-effort; open reports the real error
            }
        }
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "sqlite store opened");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Adapter for entity `P` on this store.
    pub fn adapter<P: SqlMapping>(&self) -> SqliteAdapter<P> {
        SqliteAdapter {
            store: self.clone(),
            _entity: PhantomData,
        }
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| Error::LockPoisoned("sqlite connection"))?;
        Ok(f(&conn)?)
    }
}

/// Column mapping for one table.
pub trait SqlMapping: Record {
    const TABLE: &'static str;
    const KEY_COLUMN: &'static str;
    /// Column order shared by `to_params` and `from_row`.
    const COLUMNS: &'static [&'static str];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
    fn to_params(&self) -> Vec<Box<dyn ToSql>>;
}

pub struct SqliteAdapter<P> {
    store: SqliteStore,
    _entity: PhantomData<fn() -> P>,
}

impl<P: SqlMapping> SqliteAdapter<P> {
    fn select_sql() -> String {
        format!("SELECT {} FROM {}", P::COLUMNS.join(", "), P::TABLE)
    }

    fn write_sql(verb: &str) -> String {
        let placeholders: Vec<String> = (1..=P::COLUMNS.len()).map(|i| format!("?{i}")).collect();
        format!(
            "{verb} INTO {} ({}) VALUES ({})",
            P::TABLE,
            P::COLUMNS.join(", "),
            placeholders.join(", ")
        )
    }

    fn write(&self, verb: &str, p: &P) -> Result<usize> {
        let sql = Self::write_sql(verb);
        let params_vec = p.to_params();
        let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();
        self.store
            .with_conn(|conn| conn.execute(&sql, params_refs.as_slice()))
    }
}

impl<P: SqlMapping> EntityAdapter<P> for SqliteAdapter<P> {
    fn exists(&self, p: &P) -> Result<bool> {
        let sql = format!(
            "SELECT 1 FROM {} WHERE {} = ?1 LIMIT 1",
            P::TABLE,
            P::KEY_COLUMN
        );
        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            stmt.exists([p.key()])
        })
    }

    fn find(&self, key: &str) -> Result<Option<P>> {
        let sql = format!("{} WHERE {} = ?1", Self::select_sql(), P::KEY_COLUMN);
        self.store.with_conn(|conn| {
            conn.query_row(&sql, [key], |row| P::from_row(row)).optional()
        })
    }

    fn insert(&self, p: &P) -> Result<bool> {
        Ok(self.write("INSERT OR IGNORE", p)? > 0)
    }

    fn save(&self, p: &P) -> Result<()> {
        self.write("INSERT OR REPLACE", p)?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<P>> {
        let sql = format!("{} ORDER BY rowid", Self::select_sql());
        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], |row| P::from_row(row))?;
            let out = rows.collect::<rusqlite::Result<Vec<P>>>();
            out
        })
    }
}

// ------------------------------------------------------------
// Per-entity mappings
// ------------------------------------------------------------

fn ts_to_sql(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

/// Parse a stored RFC 3339 timestamp, defaulting to the Unix epoch.
fn ts_from_sql(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

impl SqlMapping for SourceItem {
    const TABLE: &'static str = "source_items";
    const KEY_COLUMN: &'static str = "id";
    const COLUMNS: &'static [&'static str] =
        &["id", "title", "description", "published_at", "timezone"];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(SourceItem {
            id: row.get("id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            published_at: ts_from_sql(&row.get::<_, String>("published_at")?),
            timezone: row.get("timezone")?,
        })
    }

    fn to_params(&self) -> Vec<Box<dyn ToSql>> {
        vec![
            Box::new(self.id.clone()),
            Box::new(self.title.clone()),
            Box::new(self.description.clone()),
            Box::new(ts_to_sql(&self.published_at)),
            Box::new(self.timezone.clone()),
        ]
    }
}

impl SqlMapping for Voice {
    const TABLE: &'static str = "writers";
    const KEY_COLUMN: &'static str = "key";
    const COLUMNS: &'static [&'static str] = &[
        "key",
        "display_name",
        "bio",
        "system_prompt",
        "profile_image_ref",
        "created_at",
        "updated_at",
    ];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Voice {
            key: row.get("key")?,
            display_name: row.get("display_name")?,
            bio: row.get("bio")?,
            system_prompt: row.get("system_prompt")?,
            profile_image_ref: row.get("profile_image_ref")?,
            created_at: ts_from_sql(&row.get::<_, String>("created_at")?),
            updated_at: ts_from_sql(&row.get::<_, String>("updated_at")?),
        })
    }

    fn to_params(&self) -> Vec<Box<dyn ToSql>> {
        vec![
            Box::new(self.key.clone()),
            Box::new(self.display_name.clone()),
            Box::new(self.bio.clone()),
            Box::new(self.system_prompt.clone()),
            Box::new(self.profile_image_ref.clone()),
            Box::new(ts_to_sql(&self.created_at)),
            Box::new(ts_to_sql(&self.updated_at)),
        ]
    }
}

impl SqlMapping for GeneratedArticle {
    const TABLE: &'static str = "articles";
    const KEY_COLUMN: &'static str = "key";
    const COLUMNS: &'static [&'static str] = &[
        "key",
        "title",
        "content",
        "author_ref",
        "timestamp",
        "category",
        "head_image_ref",
        "short_description",
        "source_item_ref",
        "writer_type",
        "is_featured",
        "featured_date",
    ];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        // Unknown enum text degrades to the default instead of failing the listing.
        let category = row
            .get::<_, String>("category")?
            .parse::<Category>()
            .unwrap_or_default();
        let writer_type =
            WriterType::parse(&row.get::<_, String>("writer_type")?).unwrap_or_default();
        Ok(GeneratedArticle {
            key: row.get("key")?,
            title: row.get("title")?,
            content: row.get("content")?,
            author_ref: row.get("author_ref")?,
            timestamp: row.get("timestamp")?,
            category,
            head_image_ref: row.get("head_image_ref")?,
            short_description: row.get("short_description")?,
            source_item_ref: row.get("source_item_ref")?,
            writer_type,
            is_featured: row.get("is_featured")?,
            featured_date: row.get("featured_date")?,
        })
    }

    fn to_params(&self) -> Vec<Box<dyn ToSql>> {
        vec![
            Box::new(self.key.clone()),
            Box::new(self.title.clone()),
            Box::new(self.content.clone()),
            Box::new(self.author_ref.clone()),
            Box::new(self.timestamp.clone()),
            Box::new(self.category.as_str()),
            Box::new(self.head_image_ref.clone()),
            Box::new(self.short_description.clone()),
            Box::new(self.source_item_ref.clone()),
            Box::new(self.writer_type.as_str()),
            Box::new(self.is_featured),
            Box::new(self.featured_date.clone()),
        ]
    }
}

impl SqlMapping for FeaturedArticle {
    const TABLE: &'static str = "featured_articles";
    const KEY_COLUMN: &'static str = "date";
    const COLUMNS: &'static [&'static str] = &["date", "article_key", "created_at"];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(FeaturedArticle {
            date: row.get("date")?,
            article_key: row.get("article_key")?,
            created_at: ts_from_sql(&row.get::<_, String>("created_at")?),
        })
    }

    fn to_params(&self) -> Vec<Box<dyn ToSql>> {
        vec![
            Box::new(self.date.clone()),
            Box::new(self.article_key.clone()),
            Box::new(ts_to_sql(&self.created_at)),
        ]
    }
}

impl SqlMapping for StyleProfile {
    const TABLE: &'static str = "styles";
    const KEY_COLUMN: &'static str = "style_key";
    const COLUMNS: &'static [&'static str] = &[
        "style_key",
        "name",
        "description",
        "voice_guidelines",
        "comedic_approach",
        "example_headline",
        "example_paragraph",
        "is_default",
    ];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(StyleProfile {
            style_key: row.get("style_key")?,
            name: row.get("name")?,
            description: row.get("description")?,
            voice_guidelines: row.get("voice_guidelines")?,
            comedic_approach: row.get("comedic_approach")?,
            example_headline: row.get("example_headline")?,
            example_paragraph: row.get("example_paragraph")?,
            is_default: row.get("is_default")?,
        })
    }

    fn to_params(&self) -> Vec<Box<dyn ToSql>> {
        vec![
            Box::new(self.style_key.clone()),
            Box::new(self.name.clone()),
            Box::new(self.description.clone()),
            Box::new(self.voice_guidelines.clone()),
            Box::new(self.comedic_approach.clone()),
            Box::new(self.example_headline.clone()),
            Box::new(self.example_paragraph.clone()),
            Box::new(self.is_default),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Repository;
    use chrono::TimeZone;

    fn item(id: &str) -> SourceItem {
        SourceItem {
            id: id.into(),
            title: format!("title {id}"),
            description: "desc".into(),
            published_at: Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap(),
            timezone: "UTC".into(),
        }
    }

    #[test]
    fn source_items_round_trip_and_dedup() {
        let store = SqliteStore::open_in_memory().unwrap();
        let repo = Repository::new(store.adapter::<SourceItem>());
        assert!(repo.create(&mut item("n1")).unwrap());
        assert!(!repo.create(&mut item("n1")).unwrap());
        assert!(repo.create(&mut item("n2")).unwrap());

        let all = repo.read_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], item("n1"));
    }

    #[test]
    fn raw_insert_ignores_duplicates() {
        let store = SqliteStore::open_in_memory().unwrap();
        let adapter = store.adapter::<SourceItem>();
        assert!(adapter.insert(&item("x")).unwrap());
        assert!(!adapter.insert(&item("x")).unwrap());
    }

    #[test]
    fn article_update_persists_featured_flag() {
        let store = SqliteStore::open_in_memory().unwrap();
        let repo = Repository::new(store.adapter::<GeneratedArticle>());
        let mut a = GeneratedArticle {
            key: String::new(),
            title: "Local Man".into(),
            content: "body".into(),
            author_ref: "w1".into(),
            timestamp: "2025-03-01T08:00:00+00:00".into(),
            category: Category::Local,
            head_image_ref: String::new(),
            short_description: "short".into(),
            source_item_ref: Some("n1".into()),
            writer_type: WriterType::Ai,
            is_featured: false,
            featured_date: None,
        };
        assert!(repo.create(&mut a).unwrap());

        a.is_featured = true;
        a.featured_date = Some("2025-03-01".into());
        assert!(repo.update(&a).unwrap());

        let back = repo.read_by_key(&a.key).unwrap().unwrap();
        assert!(back.is_featured);
        assert_eq!(back.featured_date.as_deref(), Some("2025-03-01"));
        assert_eq!(back.category, Category::Local);
    }
}
