//! S3-compatible object storage client.

use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::store::BlobStore;

/// Default container holding inputs and outputs.
pub const DEFAULT_BUCKET: &str = "videos";

/// Configuration for the S3 client.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// S3 API endpoint URL
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region ("auto" for most S3-compatible providers)
    pub region: String,
}

impl S3Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("STORAGE_ENDPOINT_URL")
                .map_err(|_| StorageError::config_error("STORAGE_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("STORAGE_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("STORAGE_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("STORAGE_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("STORAGE_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("STORAGE_BUCKET")
                .unwrap_or_else(|_| DEFAULT_BUCKET.to_string()),
            region: std::env::var("STORAGE_REGION").unwrap_or_else(|_| "auto".to_string()),
        })
    }
}

/// Blob store backed by an S3-compatible bucket.
#[derive(Clone)]
pub struct S3Client {
    client: Client,
    bucket: String,
}

impl S3Client {
    /// Create a new client from configuration.
    pub fn new(config: S3Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "reel-storage",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(S3Config::from_env()?))
    }

    /// Bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn get_body(&self, key: &str) -> StorageResult<ByteStream> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let message = e.to_string();
                if message.contains("NoSuchKey") || message.contains("NotFound") {
                    StorageError::not_found(key)
                } else {
                    StorageError::download_failed(format!("{}: {}", key, message))
                }
            })?;
        Ok(response.body)
    }
}

#[async_trait]
impl BlobStore for S3Client {
    fn backend_name(&self) -> &'static str {
        "s3"
    }

    async fn download_to(&self, key: &str, path: &Path) -> StorageResult<u64> {
        debug!(key = key, path = %path.display(), "Downloading object");

        let body = self.get_body(key).await?;
        let mut reader = body.into_async_read();
        let mut file = tokio::fs::File::create(path).await.map_err(|e| {
            StorageError::download_failed(format!("Failed to create {}: {}", path.display(), e))
        })?;

        let written = tokio::io::copy(&mut reader, &mut file)
            .await
            .map_err(|e| StorageError::download_failed(format!("{}: {}", key, e)))?;
        file.flush().await?;

        info!(key = key, bytes = written, "Downloaded object");
        Ok(written)
    }

    async fn download_bytes(&self, key: &str) -> StorageResult<Vec<u8>> {
        debug!(key = key, "Downloading object bytes");

        let bytes = self
            .get_body(key)
            .await?
            .collect()
            .await
            .map_err(|e| StorageError::download_failed(e.to_string()))?
            .into_bytes()
            .to_vec();

        Ok(bytes)
    }

    async fn upload_file(&self, path: &Path, key: &str, content_type: &str) -> StorageResult<()> {
        debug!(path = %path.display(), key = key, "Uploading file");

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", key, e)))?;

        info!(path = %path.display(), key = key, "Uploaded file");
        Ok(())
    }

    async fn upload_bytes(
        &self,
        data: Vec<u8>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        debug!("Uploading {} bytes to {}", data.len(), key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", key, e)))?;

        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.to_string().contains("NotFound") || e.to_string().contains("NoSuchKey") {
                    Ok(false)
                } else {
                    Err(StorageError::AwsSdk(e.to_string()))
                }
            }
        }
    }

    async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::AwsSdk(format!("Storage connectivity check failed: {}", e)))?;
        Ok(())
    }
}
