// src/store/mod.rs
//! Generic idempotent persistence.
//!
//! Every entity goes through a [`Repository`], which only knows the
//! [`EntityAdapter`] contract. Column mapping and engine details live in the
//! adapter (`memory` for tests/staging, `sqlite` for the real store).

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};

/// Key access and mutable-field rules for a persisted entity.
pub trait Record: Clone + Send + Sync + 'static {
    /// Short entity name for logs and errors.
    const ENTITY: &'static str;

    /// Natural key; may be empty before the first create.
    fn key(&self) -> &str;
    fn set_key(&mut self, key: String);
    /// Copy mutable fields from `self` onto `target`. Returns whether anything changed.
    fn apply_update(&self, target: &mut Self) -> bool;
}

/// Storage-side half of the persistence contract for one entity type.
pub trait EntityAdapter<P: Record>: Send + Sync {
    /// True if a record with `p`'s key is already stored.
    fn exists(&self, p: &P) -> Result<bool>;

    fn find(&self, key: &str) -> Result<Option<P>>;

    fn get_key(&self, p: &P) -> String {
        p.key().to_string()
    }

    fn apply_update(&self, from: &P, to: &mut P) -> bool {
        from.apply_update(to)
    }

    /// Insert unless the key is taken. Returns whether a record was written.
    fn insert(&self, p: &P) -> Result<bool>;

    /// Overwrite the stored record with the same key.
    fn save(&self, p: &P) -> Result<()>;

    fn list(&self) -> Result<Vec<P>>;
}

/// Create/read/update over any adapter. Cheap to clone.
pub struct Repository<P: Record> {
    adapter: Arc<dyn EntityAdapter<P>>,
}

impl<P: Record> Clone for Repository<P> {
    fn clone(&self) -> Self {
        Self {
            adapter: Arc::clone(&self.adapter),
        }
    }
}

impl<P: Record> Repository<P> {
    pub fn new<A: EntityAdapter<P> + 'static>(adapter: A) -> Self {
        Self {
            adapter: Arc::new(adapter),
        }
    }

    /// Persist `p`, assigning a fresh key if it has none.
    ///
    /// Returns `Ok(false)` when a record with the same key already exists;
    /// duplicate submission is a normal outcome, not an error.
    pub fn create(&self, p: &mut P) -> Result<bool> {
        if self.adapter.get_key(p).is_empty() {
            p.set_key(uuid::Uuid::new_v4().to_string());
        }
        if self.adapter.exists(p)? {
            debug!(entity = P::ENTITY, key = p.key(), "create skipped: duplicate key");
            return Ok(false);
        }
        // A concurrent create may win between `exists` and `insert`; the
        // adapter's insert is itself idempotent and reports that as `false`.
        let written = self.adapter.insert(p)?;
        if !written {
            debug!(entity = P::ENTITY, key = p.key(), "create lost race: duplicate key");
        }
        Ok(written)
    }

    pub fn read_all(&self) -> Result<Vec<P>> {
        self.adapter.list()
    }

    pub fn read_by_key(&self, key: &str) -> Result<Option<P>> {
        self.adapter.find(key)
    }

    /// Copy `p`'s mutable fields onto the stored record and persist it.
    /// Returns whether anything changed; a missing record is `NotFound`.
    pub fn update(&self, p: &P) -> Result<bool> {
        let key = self.adapter.get_key(p);
        let mut stored = self.adapter.find(&key)?.ok_or_else(|| Error::NotFound {
            entity: P::ENTITY,
            key: key.clone(),
        })?;
        let changed = self.adapter.apply_update(p, &mut stored);
        if changed {
            self.adapter.save(&stored)?;
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryAdapter;
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        key: String,
        body: String,
    }

    impl Record for Note {
        const ENTITY: &'static str = "note";
        fn key(&self) -> &str {
            &self.key
        }
        fn set_key(&mut self, key: String) {
            self.key = key;
        }
        fn apply_update(&self, target: &mut Self) -> bool {
            let changed = target.body != self.body;
            target.body = self.body.clone();
            changed
        }
    }

    #[test]
    fn create_assigns_key_when_empty() {
        let repo = Repository::new(MemoryAdapter::<Note>::new());
        let mut n = Note {
            key: String::new(),
            body: "hi".into(),
        };
        assert!(repo.create(&mut n).unwrap());
        assert!(!n.key.is_empty());
        assert_eq!(repo.read_by_key(&n.key).unwrap(), Some(n));
    }

    #[test]
    fn duplicate_create_returns_false() {
        let repo = Repository::new(MemoryAdapter::<Note>::new());
        let mut a = Note {
            key: "k".into(),
            body: "first".into(),
        };
        let mut b = Note {
            key: "k".into(),
            body: "second".into(),
        };
        assert!(repo.create(&mut a).unwrap());
        assert!(!repo.create(&mut b).unwrap());
        let all = repo.read_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].body, "first");
    }

    #[test]
    fn update_missing_is_not_found() {
        let repo = Repository::new(MemoryAdapter::<Note>::new());
        let n = Note {
            key: "ghost".into(),
            body: "x".into(),
        };
        assert!(matches!(repo.update(&n), Err(Error::NotFound { .. })));
    }

    #[test]
    fn update_reports_change() {
        let repo = Repository::new(MemoryAdapter::<Note>::new());
        let mut n = Note {
            key: "k".into(),
            body: "a".into(),
        };
        repo.create(&mut n).unwrap();
        assert!(!repo.update(&n).unwrap());
        n.body = "b".into();
        assert!(repo.update(&n).unwrap());
        assert_eq!(repo.read_by_key("k").unwrap().unwrap().body, "b");
    }
}
