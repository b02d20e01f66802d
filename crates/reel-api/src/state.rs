//! Application state.

use std::sync::Arc;

use reel_storage::BlobStore;
use reel_worker::{JobOrchestrator, WorkerConfig};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub storage: Arc<dyn BlobStore>,
    pub orchestrator: JobOrchestrator,
}

impl AppState {
    /// Create new application state from the environment.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let storage = reel_storage::connect_from_env().await?;
        Ok(Self::with_parts(config, WorkerConfig::from_env(), storage))
    }

    /// Assemble state from explicit parts.
    pub fn with_parts(
        config: ApiConfig,
        worker: WorkerConfig,
        storage: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            orchestrator: JobOrchestrator::new(worker, storage.clone()),
            config,
            storage,
        }
    }
}
