//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("A job for {0} is already running")]
    DuplicateJob(String),

    #[error("Asset unavailable: {name}: {reason}")]
    AssetUnavailable { name: String, reason: String },

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Job task failed: {0}")]
    TaskFailed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] reel_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] reel_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        Self::InvalidPayload(msg.into())
    }

    pub fn asset_unavailable(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AssetUnavailable {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }

    /// Rejected before any work began; the caller can fix the request.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            WorkerError::InvalidPayload(_) | WorkerError::DuplicateJob(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_classification() {
        assert!(WorkerError::invalid_payload("no scenes").is_rejection());
        assert!(WorkerError::DuplicateJob("a.mp4".into()).is_rejection());
        assert!(!WorkerError::asset_unavailable("img.jpg", "404").is_rejection());
        assert!(!WorkerError::upload_failed("denied").is_rejection());
    }

    #[test]
    fn test_asset_unavailable_names_asset() {
        let err = WorkerError::asset_unavailable("voice 1.mp3", "Object not found");
        assert!(err.to_string().contains("voice 1.mp3"));
    }
}
