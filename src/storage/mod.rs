//! # Storage and Persistence
//!
//! The engine persists exactly two kinds of record: the upstream connection
//! (`config`) and role templates (`roles/<name>`). The host owns durability and
//! encryption; this module only defines the contract the engine needs from it
//! and two engines implementing that contract.
//!
//! Implementations are expected to be atomic per key. Nothing here relies on
//! ordering across keys.

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::InMemoryStorage;

use crate::errors::{EngineError, Result};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

/// A single persisted key/value pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntry {
    pub key: String,
    pub value: Vec<u8>,
}

impl StorageEntry {
    /// Encode `value` as JSON under `key`
    pub fn json<T: Serialize>(key: impl Into<String>, value: &T) -> Result<Self> {
        let key = key.into();
        let value = serde_json::to_vec(value).map_err(|e| {
            EngineError::serialization(e, format!("encoding storage entry '{}'", key))
        })?;
        Ok(Self { key, value })
    }

    /// Decode the JSON payload
    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.value).map_err(|e| {
            EngineError::serialization(e, format!("decoding storage entry '{}'", self.key))
        })
    }
}

/// Storage collaborator supplied by the host
#[async_trait]
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Fetch an entry; `Ok(None)` when the key is absent
    async fn get(&self, key: &str) -> Result<Option<StorageEntry>>;

    /// Create or overwrite an entry
    async fn put(&self, entry: StorageEntry) -> Result<()>;

    /// Remove an entry; deleting an absent key is not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// Direct children of `prefix`, prefix stripped, sorted.
    /// Nested groups are returned once with a trailing `/`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Reduce full keys to the direct children of `prefix`
pub(crate) fn children_of<'a, I>(prefix: &str, keys: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut children: Vec<String> = keys
        .into_iter()
        .filter_map(|key| key.strip_prefix(prefix))
        .filter(|rest| !rest.is_empty())
        .map(|rest| match rest.find('/') {
            Some(idx) => rest[..=idx].to_string(),
            None => rest.to_string(),
        })
        .collect();

    children.sort();
    children.dedup();
    children
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Record {
        host: String,
    }

    #[test]
    fn test_entry_json_round_trip() {
        let entry = StorageEntry::json("config", &Record { host: "h".into() }).unwrap();
        assert_eq!(entry.key, "config");

        let back: Record = entry.decode_json().unwrap();
        assert_eq!(back, Record { host: "h".into() });
    }

    #[test]
    fn test_decode_garbage_is_serialization_error() {
        let entry = StorageEntry { key: "config".into(), value: b"not json".to_vec() };
        let err = entry.decode_json::<Record>().unwrap_err();
        assert!(matches!(err, EngineError::Serialization { .. }));
        assert!(err.to_string().contains("config"));
    }

    #[test]
    fn test_children_of() {
        let keys = ["config", "roles/a", "roles/b", "roles/nested/c", "roles/nested/d", "roles/"];
        let children = children_of("roles/", keys.iter().copied());
        assert_eq!(children, vec!["a", "b", "nested/"]);

        assert_eq!(children_of("", keys.iter().copied()), vec!["config", "roles/"]);
    }
}
