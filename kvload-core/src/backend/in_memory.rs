//! In-memory store for dry runs and tests.
//!
//! The store is [`Clone`] so callers can hold a handle for direct inspection while the
//! dispatcher owns a shared copy.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;

use super::{Store, StoreResult};

type Map = HashMap<String, Bytes>;

/// A [`Store`] backed by a `HashMap`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    map: Arc<Mutex<Map>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a clone of the stored value, if present.
    pub fn get_stored(&self, key: &str) -> Option<Bytes> {
        self.with_map(|map| map.get(key).cloned())
    }

    /// Returns the number of stored keys.
    pub fn len(&self) -> usize {
        self.with_map(|map| map.len())
    }

    /// Returns `true` if the store has no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_map<T>(&self, f: impl FnOnce(&mut Map) -> T) -> T {
        let mut map = self.map.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut map)
    }
}

#[async_trait::async_trait]
impl Store for InMemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn upsert(&self, key: &str, value: Bytes) -> StoreResult<()> {
        self.with_map(|map| map.insert(key.to_owned(), value));
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        Ok(self.with_map(|map| map.get(key).cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_overwrites() {
        let store = InMemoryStore::new();
        assert!(store.is_empty());

        store.upsert("k-1", Bytes::from_static(b"one")).await.unwrap();
        store.upsert("k-1", Bytes::from_static(b"two")).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("k-1").await.unwrap().as_deref(), Some(&b"two"[..]));
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let store = InMemoryStore::new();
        assert_eq!(store.get("k-404").await.unwrap(), None);
    }
}
