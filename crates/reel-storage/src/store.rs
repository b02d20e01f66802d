//! The blob store abstraction shared by every backend.

use std::path::Path;

use async_trait::async_trait;

use crate::error::StorageResult;

/// A named-object store holding job inputs, rendered videos and status records.
///
/// Object names are opaque strings. Implementations must be safe to share
/// between concurrently running jobs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Short backend identifier for logs.
    fn backend_name(&self) -> &'static str;

    /// Download `key` into the file at `path`, returning the byte count.
    async fn download_to(&self, key: &str, path: &Path) -> StorageResult<u64>;

    /// Download `key` into memory.
    async fn download_bytes(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Upload the file at `path` under `key`, replacing any existing object.
    async fn upload_file(&self, path: &Path, key: &str, content_type: &str) -> StorageResult<()>;

    /// Upload `data` under `key`, replacing any existing object.
    async fn upload_bytes(&self, data: Vec<u8>, key: &str, content_type: &str)
        -> StorageResult<()>;

    /// Check if an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Verify the backend is reachable.
    async fn check_connectivity(&self) -> StorageResult<()>;
}

/// MIME type for an object name, from its extension.
pub fn content_type_for(key: &str) -> &'static str {
    let ext = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" => "video/mp4",
        "m4v" => "video/x-m4v",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "json" => "application/json",
        "srt" => "application/x-subrip",
        "mp3" => "audio/mpeg",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        _ => "application/octet-stream",
    }
}
