//! File-backed storage engine used by the operator CLI.
//!
//! Each key maps to one file below the root directory (`roles/test` becomes
//! `<root>/roles/test`). Writes go to a hidden temp file that is renamed into
//! place, so a reader sees either the old or the new record.

use super::{Storage, StorageEntry};
use crate::errors::{EngineError, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Open (and create if needed) a storage directory
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            EngineError::storage_with_source(
                format!("creating storage directory {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.starts_with('/') || key.ends_with('/') {
        return Err(EngineError::storage(format!("invalid storage key '{}'", key)));
    }
    let bad_segment =
        key.split('/').any(|s| s.is_empty() || s == "." || s == ".." || s.starts_with('.'));
    if bad_segment || key.contains('\\') {
        return Err(EngineError::storage(format!("invalid storage key '{}'", key)));
    }
    Ok(())
}

#[async_trait]
impl Storage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<StorageEntry>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(value) => Ok(Some(StorageEntry { key: key.to_string(), value })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(EngineError::storage_with_source(format!("reading '{}'", key), e)),
        }
    }

    async fn put(&self, entry: StorageEntry) -> Result<()> {
        let path = self.path_for(&entry.key)?;
        let parent = path.parent().unwrap_or(&self.root).to_path_buf();

        tokio::fs::create_dir_all(&parent).await.map_err(|e| {
            EngineError::storage_with_source(format!("creating directory for '{}'", entry.key), e)
        })?;

        let tmp = parent.join(format!(".tmp-{}", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, &entry.value).await.map_err(|e| {
            EngineError::storage_with_source(format!("writing '{}'", entry.key), e)
        })?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(EngineError::storage_with_source(format!("committing '{}'", entry.key), e));
        }

        debug!(key = %entry.key, bytes = entry.value.len(), "Stored entry");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(EngineError::storage_with_source(format!("deleting '{}'", key), e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let (dir_part, name_prefix) = match prefix.rfind('/') {
            Some(idx) => (&prefix[..idx], &prefix[idx + 1..]),
            None => ("", prefix),
        };
        let dir = if dir_part.is_empty() {
            self.root.clone()
        } else {
            validate_key(dir_part)?;
            self.root.join(dir_part)
        };

        let mut reader = match tokio::fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(EngineError::storage_with_source(format!("listing '{}'", prefix), e))
            }
        };

        let mut children = Vec::new();
        loop {
            let next = reader.next_entry().await.map_err(|e| {
                EngineError::storage_with_source(format!("listing '{}'", prefix), e)
            })?;
            let Some(dir_entry) = next else { break };

            let name = dir_entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let Some(rest) = name.strip_prefix(name_prefix) else { continue };

            let is_dir = dir_entry
                .file_type()
                .await
                .map_err(|e| EngineError::storage_with_source(format!("listing '{}'", prefix), e))?
                .is_dir();
            children.push(if is_dir { format!("{}/", rest) } else { rest.to_string() });
        }

        children.retain(|c| !c.is_empty() && c != "/");
        children.sort();
        Ok(children)
    }
}
