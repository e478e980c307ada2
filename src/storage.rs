//! Storage collaborator: JSON records keyed by path.
//!
//! The engine persists nothing itself; the host platform hands it a
//! [`Storage`] implementation and the engine reads and writes opaque JSON
//! records at `config/admin` and `roles/<name>`. [`MemoryStorage`] is the
//! reference implementation used throughout the test suite.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn put(&self, key: &str, record: Value) -> Result<()>;

    /// Deleting an absent key is a no-op.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Key suffixes under `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

/// In-memory [`Storage`] backed by a sorted map.
///
/// Tracks the number of `get` calls served; tests use the counter to observe
/// whether the client cache re-read the admin configuration.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: RwLock<BTreeMap<String, Value>>,
    reads: AtomicU64,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `get` calls served so far.
    #[must_use]
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, record: Value) -> Result<()> {
        self.records.write().await.insert(key.to_string(), record);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.records.write().await.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .records
            .read()
            .await
            .keys()
            .filter_map(|key| key.strip_prefix(prefix))
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;

    #[tokio::test]
    async fn records_round_trip() -> Result<()> {
        let storage = MemoryStorage::new();

        storage.put("config/admin", json!({"username": "admin"})).await?;
        let record = storage.get("config/admin").await?;
        assert_eq!(record, Some(json!({"username": "admin"})));

        storage.delete("config/admin").await?;
        assert_eq!(storage.get("config/admin").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn delete_of_absent_key_is_a_noop() -> Result<()> {
        let storage = MemoryStorage::new();
        storage.delete("roles/ghost").await?;
        Ok(())
    }

    #[tokio::test]
    async fn list_returns_sorted_suffixes() -> Result<()> {
        let storage = MemoryStorage::new();
        storage.put("roles/writer", json!({})).await?;
        storage.put("roles/admin", json!({})).await?;
        storage.put("config/admin", json!({})).await?;

        let names = storage.list("roles/").await?;
        assert_eq!(names, vec!["admin".to_string(), "writer".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn reads_counter_tracks_gets() -> Result<()> {
        let storage = MemoryStorage::new();
        assert_eq!(storage.reads(), 0);
        let _ = storage.get("config/admin").await?;
        let _ = storage.get("config/admin").await?;
        assert_eq!(storage.reads(), 2);
        Ok(())
    }
}
