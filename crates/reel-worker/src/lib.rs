//! Render job orchestration.
//!
//! This crate provides:
//! - Concurrent asset resolution into per-run workspaces
//! - Stage plan execution with bounded clip parallelism
//! - The job orchestrator (synchronous and background runs)
//! - Status record publishing with retries
//! - Structured job logging

pub mod assets;
pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod render;
pub mod retry;
pub mod status;

#[cfg(test)]
mod testing;

pub use assets::{asset_requests, AssetRequest, AssetResolver, ResolvedAssets};
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use orchestrator::{JobHandle, JobOrchestrator, RenderSummary};
pub use render::StageExecutor;
pub use retry::RetryPolicy;
pub use status::StatusStore;
