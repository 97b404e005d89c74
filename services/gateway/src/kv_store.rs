//! Key-value store abstraction used by every handler.
//!
//! Values are opaque strings at the trait level; the helpers in this module
//! layer JSON (de)serialization on top. Backends only need exact-key
//! get/put/delete, no transactions and no prefix listing.

use crate::error::StoreError;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Exact-key persistence collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// Fetch the raw value stored under `key`, if any
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Create or fully overwrite the value under `key`
    async fn put(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Connectivity check for readiness probes
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Read and decode a JSON value
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Encode and write a JSON value
pub async fn put_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value)?;
    store.put(key, raw).await
}

/// Process-local store. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the stored keys, sorted
    #[cfg(test)]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    #[cfg(test)]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<(), StoreError> {
        debug!(key = %key, bytes = value.len(), "memory store put");
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        debug!(key = %key, "memory store delete");
        self.entries.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[tokio::test]
    async fn test_memory_store_put_get_delete() {
        let store = MemoryStore::new();

        assert_eq!(store.get("missing").await.unwrap(), None);

        store.put("a", "1".to_string()).await.unwrap();
        store.put("a", "2".to_string()).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some("2".to_string()));

        store.delete("a").await.unwrap();
        assert!(!store.contains_key("a"));

        // Deleting again is fine
        store.delete("a").await.unwrap();
    }

    #[tokio::test]
    async fn test_json_helpers() {
        let store = MemoryStore::new();
        let sample = Sample {
            name: "x".to_string(),
            count: 3,
        };

        put_json(&store, "sample", &sample).await.unwrap();
        let loaded: Option<Sample> = get_json(&store, "sample").await.unwrap();
        assert_eq!(loaded, Some(sample));

        let missing: Option<Sample> = get_json(&store, "nope").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_get_json_rejects_corrupt_value() {
        let store = MemoryStore::new();
        store.put("sample", "not json".to_string()).await.unwrap();

        let result: Result<Option<Sample>, _> = get_json(&store, "sample").await;
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }

    #[test]
    fn test_keys_are_sorted() {
        let store = MemoryStore::new();
        tokio_test::block_on(async {
            store.put("b", "{}".to_string()).await.unwrap();
            store.put("a", "{}".to_string()).await.unwrap();
        });
        assert_eq!(store.keys(), vec!["a".to_string(), "b".to_string()]);
    }
}
