//! # Persistent Configuration Store
//!
//! Trait boundary to the external key/value store that owns connection
//! configs and role records. The store is only mirrored here: entries are
//! read on cache miss, and change notifications flow back in through
//! [`crate::cache::ConnectionCache::invalidate`].
//!
//! Connection configs live under `config/<name>`, role records under
//! `role/<name>`.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::errors::{KeyplaneError, Result};

/// Key namespace for connection configurations
pub const CONNECTION_CONFIG_PREFIX: &str = "config/";

/// Key namespace for role records
pub const ROLE_PREFIX: &str = "role/";

/// Storage path for the named connection config
pub fn connection_config_path(name: &str) -> String {
    format!("{}{}", CONNECTION_CONFIG_PREFIX, name)
}

/// Storage path for the named role record
pub fn role_path(name: &str) -> String {
    format!("{}{}", ROLE_PREFIX, name)
}

/// A single record in the config store
#[derive(Debug, Clone, PartialEq)]
pub struct StorageEntry {
    pub key: String,
    pub value: Value,
}

impl StorageEntry {
    /// Build an entry by JSON-encoding a serializable record
    pub fn encode<T: Serialize>(key: impl Into<String>, record: &T) -> Result<Self> {
        Ok(Self { key: key.into(), value: serde_json::to_value(record)? })
    }

    /// Decode the entry's value into a concrete record type
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.value.clone()).map_err(|e| KeyplaneError::Serialization {
            source: e,
            context: format!("failed to decode storage entry {:?}", self.key),
        })
    }
}

/// The external key/value store holding connection configs and role records.
///
/// Implementations are provided by the hosting environment; [`MemoryStore`]
/// backs tests and embedded use.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Fetch the entry at `path`, or `None` when absent
    async fn get(&self, path: &str) -> Result<Option<StorageEntry>>;

    /// Store an entry, replacing any previous value at its key
    async fn put(&self, entry: StorageEntry) -> Result<()>;

    /// Delete the entry at `path` (no error when absent)
    async fn delete(&self, path: &str) -> Result<()>;

    /// List keys under the given prefix
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn test_paths() {
        assert_eq!(connection_config_path("pg-prod"), "config/pg-prod");
        assert_eq!(role_path("readonly"), "role/readonly");
    }

    #[test]
    fn test_entry_roundtrip() {
        let sample = Sample { name: "a".into(), count: 3 };
        let entry = StorageEntry::encode("config/a", &sample).unwrap();
        let decoded: Sample = entry.decode().unwrap();
        assert_eq!(decoded, sample);
    }

    #[test]
    fn test_entry_decode_mismatch() {
        let entry = StorageEntry { key: "config/a".into(), value: serde_json::json!("scalar") };
        let result: Result<Sample> = entry.decode();
        assert!(matches!(result, Err(KeyplaneError::Serialization { .. })));
    }
}
