// src/store/memory.rs
//! In-process engine, used by tests and by staging runs without a database file.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{EntityAdapter, Record};
use crate::error::{Error, Result};

/// Insertion-ordered map guarded by a `Mutex`; insert is atomic under the lock.
#[derive(Debug)]
pub struct MemoryAdapter<P: Record> {
    inner: Mutex<Inner<P>>,
}

#[derive(Debug)]
struct Inner<P> {
    order: Vec<String>,
    rows: HashMap<String, P>,
}

impl<P: Record> MemoryAdapter<P> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                order: Vec::new(),
                rows: HashMap::new(),
            }),
        }
    }

    /// Pre-populate; later duplicates of an earlier key are dropped.
    pub fn with_records(records: impl IntoIterator<Item = P>) -> Self {
        let mut me = Self::new();
        {
            let g = me.inner.get_mut().unwrap_or_else(|e| e.into_inner());
            for r in records {
                let k = r.key().to_string();
                if !g.rows.contains_key(&k) {
                    g.order.push(k.clone());
                    g.rows.insert(k, r);
                }
            }
        }
        me
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner<P>>> {
        self.inner
            .lock()
            .map_err(|_| Error::LockPoisoned(P::ENTITY))
    }
}

impl<P: Record> Default for MemoryAdapter<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Record> EntityAdapter<P> for MemoryAdapter<P> {
    fn exists(&self, p: &P) -> Result<bool> {
        let g = self.lock()?;
        Ok(g.rows.contains_key(p.key()))
    }

    fn find(&self, key: &str) -> Result<Option<P>> {
        let g = self.lock()?;
        Ok(g.rows.get(key).cloned())
    }

    fn insert(&self, p: &P) -> Result<bool> {
        let mut g = self.lock()?;
        let k = p.key().to_string();
        if g.rows.contains_key(&k) {
            return Ok(false);
        }
        g.order.push(k.clone());
        g.rows.insert(k, p.clone());
        Ok(true)
    }

    fn save(&self, p: &P) -> Result<()> {
        let mut g = self.lock()?;
        let k = p.key().to_string();
        if !g.rows.contains_key(&k) {
            g.order.push(k.clone());
        }
        g.rows.insert(k, p.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<P>> {
        let g = self.lock()?;
        Ok(g.order.iter().filter_map(|k| g.rows.get(k).cloned()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Debug, Clone)]
    struct Row(String);

    impl Record for Row {
        const ENTITY: &'static str = "row";
        fn key(&self) -> &str {
            &self.0
        }
        fn set_key(&mut self, key: String) {
            self.0 = key;
        }
        fn apply_update(&self, _target: &mut Self) -> bool {
            false
        }
    }

    #[test]
    fn poisoned_lock_is_an_error_not_a_panic() {
        let adapter = Arc::new(MemoryAdapter::with_records(vec![Row("a".into())]));
        let holder = adapter.clone();
        let crashed = std::thread::spawn(move || {
            let _guard = holder.inner.lock().unwrap();
            panic!("writer died mid-update");
        })
        .join();
        assert!(crashed.is_err());

        assert!(matches!(adapter.list(), Err(Error::LockPoisoned("row"))));
        assert!(matches!(
            adapter.insert(&Row("b".into())),
            Err(Error::LockPoisoned(_))
        ));
    }
}
