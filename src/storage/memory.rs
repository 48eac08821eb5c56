//! In-memory storage engine for tests and embedding hosts.

use super::{children_of, Storage, StorageEntry};
use crate::errors::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-local storage backed by a sorted map
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    inner: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<StorageEntry>> {
        let map = self.inner.read().await;
        Ok(map.get(key).map(|value| StorageEntry { key: key.to_string(), value: value.clone() }))
    }

    async fn put(&self, entry: StorageEntry) -> Result<()> {
        self.inner.write().await.insert(entry.key, entry.value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.write().await.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let map = self.inner.read().await;
        Ok(children_of(prefix, map.keys().map(String::as_str)))
    }
}
