//! Blob storage for reel inputs, rendered videos and status records.
//!
//! This crate provides:
//! - The [`BlobStore`] trait used by the render pipeline
//! - An S3-compatible backend
//! - A local directory backend for development and tests

pub mod error;
pub mod local;
pub mod s3;
pub mod store;

use std::path::PathBuf;
use std::sync::Arc;

pub use error::{StorageError, StorageResult};
pub use local::LocalBlobStore;
pub use s3::{S3Client, S3Config, DEFAULT_BUCKET};
pub use store::{content_type_for, BlobStore};

/// Which backend to connect to.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    S3(S3Config),
    Local { root: PathBuf },
}

impl StorageConfig {
    /// Read `STORAGE_BACKEND` (`s3` by default, or `local`) and the backend's
    /// own variables.
    pub fn from_env() -> StorageResult<Self> {
        let backend = std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "s3".to_string());
        match backend.to_ascii_lowercase().as_str() {
            "s3" => Ok(Self::S3(S3Config::from_env()?)),
            "local" => Ok(Self::Local {
                root: std::env::var("STORAGE_LOCAL_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("./storage")),
            }),
            other => Err(StorageError::config_error(format!(
                "Unknown STORAGE_BACKEND: {}",
                other
            ))),
        }
    }
}

/// Build the configured blob store.
pub async fn connect(config: StorageConfig) -> StorageResult<Arc<dyn BlobStore>> {
    match config {
        StorageConfig::S3(config) => Ok(Arc::new(S3Client::new(config))),
        StorageConfig::Local { root } => Ok(Arc::new(LocalBlobStore::open(root).await?)),
    }
}

/// Build the blob store described by the environment.
pub async fn connect_from_env() -> StorageResult<Arc<dyn BlobStore>> {
    connect(StorageConfig::from_env()?).await
}
