//! Publishing and reading status records.

use std::sync::Arc;
use std::time::Duration;

use reel_models::{status_key, StatusRecord};
use reel_storage::BlobStore;
use tracing::info;

use crate::error::{WorkerError, WorkerResult};
use crate::retry::RetryPolicy;

/// Writes and reads `<outputName>.json` status records in the blob store.
///
/// Writes are retried with backoff; a record that still cannot be written
/// after the last retry is reported as `UploadFailed`.
#[derive(Clone)]
pub struct StatusStore {
    store: Arc<dyn BlobStore>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl StatusStore {
    pub fn new(store: Arc<dyn BlobStore>, timeout: Duration) -> Self {
        Self {
            store,
            timeout,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Write the terminal record for `output_name`, replacing any earlier one.
    pub async fn publish(&self, output_name: &str, record: &StatusRecord) -> WorkerResult<String> {
        let key = status_key(output_name);
        let body = serde_json::to_vec_pretty(record)?;

        self.retry
            .run("publish_status", || {
                let body = body.clone();
                let key = key.as_str();
                async move {
                    tokio::time::timeout(
                        self.timeout,
                        self.store.upload_bytes(body, key, "application/json"),
                    )
                    .await
                    .map_err(|_| {
                        WorkerError::upload_failed(format!("{}: status upload timed out", key))
                    })?
                    .map_err(|e| WorkerError::upload_failed(format!("{}: {}", key, e)))
                }
            })
            .await
            .map_err(|(e, attempts)| match e {
                WorkerError::UploadFailed(msg) => {
                    WorkerError::upload_failed(format!("{} (after {} attempts)", msg, attempts))
                }
                other => other,
            })?;

        info!(key = %key, status = %record.status, "Published status record");
        Ok(key)
    }

    /// Read the record for `output_name`, if one was written.
    pub async fn fetch(&self, output_name: &str) -> WorkerResult<Option<StatusRecord>> {
        let key = status_key(output_name);
        match self.store.download_bytes(&key).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
