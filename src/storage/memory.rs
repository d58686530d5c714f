//! In-memory config store
//!
//! Backs tests and embedded deployments. Entries survive only for the
//! process lifetime.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{ConfigStore, StorageEntry};
use crate::errors::Result;

/// Process-local [`ConfigStore`] over a guarded map
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, serde_json::Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Option<StorageEntry>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(path)
            .map(|value| StorageEntry { key: path.to_string(), value: value.clone() }))
    }

    async fn put(&self, entry: StorageEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(entry.key, entry.value);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.remove(path);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = self.entries.read().await;
        let mut keys: Vec<String> =
            entries.keys().filter(|k| k.starts_with(prefix)).cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_put_delete() {
        let store = MemoryStore::new();
        assert!(store.get("config/a").await.unwrap().is_none());

        store
            .put(StorageEntry { key: "config/a".into(), value: json!({"plugin_name": "sqlite"}) })
            .await
            .unwrap();
        let entry = store.get("config/a").await.unwrap().unwrap();
        assert_eq!(entry.value["plugin_name"], "sqlite");

        store.delete("config/a").await.unwrap();
        assert!(store.get("config/a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_prefix() {
        let store = MemoryStore::new();
        for key in ["config/a", "config/b", "role/r1"] {
            store.put(StorageEntry { key: key.into(), value: json!({}) }).await.unwrap();
        }
        assert_eq!(store.list("config/").await.unwrap(), vec!["config/a", "config/b"]);
        assert_eq!(store.list("role/").await.unwrap(), vec!["role/r1"]);
    }
}
