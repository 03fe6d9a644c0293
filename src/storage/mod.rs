//! Durable key-value storage for state that outlives a session.
//!
//! [`KeyValueStore`] is the seam the filter subsystem writes through. The
//! SQLite-backed [`Database`] is the production implementation; [`MemoryStore`]
//! keeps everything in process and is used where no file should be touched.

mod preferences;
mod schema;
mod types;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use futures::future::BoxFuture;
use futures::FutureExt;

pub use schema::Database;
pub use types::DatabaseError;

/// Asynchronous string key-value area.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, Result<()>>;
}

impl KeyValueStore for Database {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        self.get_preference(key).boxed()
    }

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, Result<()>> {
        self.set_preference(key, value).boxed()
    }
}

/// In-process store. Clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous read, handy for assertions.
    pub fn snapshot(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }
}

impl KeyValueStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        let value = self.snapshot(key);
        async move { Ok(value) }.boxed()
    }

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, Result<()>> {
        let result = self
            .entries
            .lock()
            .map(|mut entries| {
                entries.insert(key.to_string(), value.to_string());
            })
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"));
        async move { result }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_clones_share_entries() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.set("k", "v").await.unwrap();
        assert_eq!(other.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_database_implements_store() {
        let db = Database::open(":memory:").await.unwrap();
        let store: Arc<dyn KeyValueStore> = Arc::new(db);
        assert_eq!(store.get("missing").await.unwrap(), None);
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
    }
}
