//! Key/value cache used for hot aggregates.
//!
//! Entries never expire; callers are responsible for invalidating keys when
//! the underlying data changes.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Mutex;

/// Outcome of a cache read. A backend failure is an `Err`, never a `Miss`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(String),
    Miss,
}

pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<CacheLookup>;

    fn set(&self, key: &str, value: String) -> Result<()>;

    /// Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<()>;
}

/// Process local cache.
#[derive(Default)]
pub struct InMemoryCacheStore {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CacheStore for InMemoryCacheStore {
    fn get(&self, key: &str) -> Result<CacheLookup> {
        Ok(match self.entries().get(key) {
            Some(value) => CacheLookup::Hit(value.clone()),
            None => CacheLookup::Miss,
        })
    }

    fn set(&self, key: &str, value: String) -> Result<()> {
        self.entries().insert(key.to_owned(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries().remove(key);
        Ok(())
    }
}
