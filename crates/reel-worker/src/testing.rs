//! In-memory blob store used by the worker's tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reel_storage::{BlobStore, StorageError, StorageResult};

#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    downloads: Mutex<HashMap<String, usize>>,
    delay: Option<Duration>,
    fail_uploads: bool,
    failing_byte_uploads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing_uploads(mut self) -> Self {
        self.fail_uploads = true;
        self
    }

    /// Fail the next `times` byte uploads (status records).
    pub fn failing_byte_uploads(self, times: usize) -> Self {
        self.failing_byte_uploads.store(times, Ordering::SeqCst);
        self
    }

    pub fn insert(&self, key: &str, data: impl Into<Vec<u8>>) {
        self.objects.lock().unwrap().insert(key.to_string(), data.into());
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn download_count(&self, key: &str) -> usize {
        self.downloads.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    fn fetch(&self, key: &str) -> StorageResult<Vec<u8>> {
        *self
            .downloads
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default() += 1;
        self.get(key).ok_or_else(|| StorageError::not_found(key))
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn download_to(&self, key: &str, path: &Path) -> StorageResult<u64> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let data = self.fetch(key)?;
        tokio::fs::write(path, &data).await?;
        Ok(data.len() as u64)
    }

    async fn download_bytes(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.fetch(key)
    }

    async fn upload_file(&self, path: &Path, key: &str, _content_type: &str) -> StorageResult<()> {
        if self.fail_uploads {
            return Err(StorageError::upload_failed("uploads disabled"));
        }
        let data = tokio::fs::read(path).await?;
        self.insert(key, data);
        Ok(())
    }

    async fn upload_bytes(
        &self,
        data: Vec<u8>,
        key: &str,
        _content_type: &str,
    ) -> StorageResult<()> {
        let remaining = self.failing_byte_uploads.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_byte_uploads
                .store(remaining.saturating_sub(1), Ordering::SeqCst);
            return Err(StorageError::upload_failed("byte uploads unavailable"));
        }
        self.insert(key, data);
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key).is_some())
    }

    async fn check_connectivity(&self) -> StorageResult<()> {
        Ok(())
    }
}
