//! Blob store backed by a local directory.
//!
//! Used for development and tests. Keys map to files below the root; a key
//! may contain `/` separators but never `..`, absolute prefixes or backslashes.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::store::BlobStore;

/// Directory-backed blob store.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root).await?;
        let root = fs::canonicalize(root).await?;
        info!(root = %root.display(), "Opened local blob store");
        Ok(Self { root })
    }

    /// Store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key to a path under the root.
    pub fn key_path(&self, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty() || key.contains('\\') || key.contains('\0') {
            return Err(StorageError::invalid_key(key));
        }
        let relative = Path::new(key);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::invalid_key(key));
        }
        Ok(self.root.join(relative))
    }

    async fn ensure_parent(path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

fn not_found_or(key: &str, e: std::io::Error) -> StorageError {
    if e.kind() == std::io::ErrorKind::NotFound {
        StorageError::not_found(key)
    } else {
        StorageError::download_failed(format!("{}: {}", key, e))
    }
}

/// Sibling temp path used for write-then-rename.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".{}.partial", Uuid::new_v4().simple()));
    path.with_file_name(name)
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    async fn download_to(&self, key: &str, path: &Path) -> StorageResult<u64> {
        let source = self.key_path(key)?;
        debug!(key = key, path = %path.display(), "Copying object");
        let bytes = fs::copy(&source, path)
            .await
            .map_err(|e| not_found_or(key, e))?;
        Ok(bytes)
    }

    async fn download_bytes(&self, key: &str) -> StorageResult<Vec<u8>> {
        let source = self.key_path(key)?;
        fs::read(&source).await.map_err(|e| not_found_or(key, e))
    }

    async fn upload_file(&self, path: &Path, key: &str, _content_type: &str) -> StorageResult<()> {
        let target = self.key_path(key)?;
        Self::ensure_parent(&target).await?;

        let staging = staging_path(&target);
        fs::copy(path, &staging)
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", key, e)))?;
        fs::rename(&staging, &target)
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", key, e)))?;

        info!(path = %path.display(), key = key, "Stored file");
        Ok(())
    }

    async fn upload_bytes(
        &self,
        data: Vec<u8>,
        key: &str,
        _content_type: &str,
    ) -> StorageResult<()> {
        let target = self.key_path(key)?;
        Self::ensure_parent(&target).await?;

        let staging = staging_path(&target);
        fs::write(&staging, data)
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", key, e)))?;
        fs::rename(&staging, &target)
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", key, e)))?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_path(key)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn check_connectivity(&self) -> StorageResult<()> {
        let meta = fs::metadata(&self.root).await?;
        if !meta.is_dir() {
            return Err(StorageError::config_error(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }
        Ok(())
    }
}
