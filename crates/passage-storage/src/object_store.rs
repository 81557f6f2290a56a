//! JSON document store.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::{validate_segment, StorageError, StorageResult};

/// Stores opaque JSON documents addressed by container + name.
///
/// The core serializes and deserializes payloads itself; implementations
/// move strings.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Writes a document, replacing any existing one with the same name.
    async fn put(&self, container: &str, name: &str, json: &str) -> StorageResult<()>;

    /// Reads a document.
    async fn get(&self, container: &str, name: &str) -> StorageResult<String>;

    /// Lists document names in a container, optionally filtered by prefix.
    /// Names come back sorted so paged exports replay in order.
    async fn list(&self, container: &str, prefix: Option<&str>) -> StorageResult<Vec<String>>;

    /// Whether a document exists.
    async fn exists(&self, container: &str, name: &str) -> StorageResult<bool>;

    /// Creates the container if it does not already exist.
    async fn ensure_container(&self, container: &str) -> StorageResult<()>;
}

/// Filesystem-backed store: one directory per container, one file per
/// document.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn container_path(&self, container: &str) -> StorageResult<PathBuf> {
        validate_segment(container)?;
        Ok(self.root.join(container))
    }

    fn document_path(&self, container: &str, name: &str) -> StorageResult<PathBuf> {
        validate_segment(name)?;
        Ok(self.container_path(container)?.join(name))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, container: &str, name: &str, json: &str) -> StorageResult<()> {
        let path = self.document_path(container, name)?;
        self.ensure_container(container).await?;
        tokio::fs::write(&path, json).await?;
        tracing::debug!(container, name, bytes = json.len(), "document written");
        Ok(())
    }

    async fn get(&self, container: &str, name: &str) -> StorageResult<String> {
        let path = self.document_path(container, name)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                container: container.to_string(),
                name: name.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, container: &str, prefix: Option<&str>) -> StorageResult<Vec<String>> {
        let dir = self.container_path(container)?;
        let mut names = Vec::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if prefix.map_or(true, |p| name.starts_with(p)) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    async fn exists(&self, container: &str, name: &str) -> StorageResult<bool> {
        let path = self.document_path(container, name)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    async fn ensure_container(&self, container: &str) -> StorageResult<()> {
        let dir = self.container_path(container)?;
        tokio::fs::create_dir_all(&dir).await?;
        Ok(())
    }
}
