//! Axum HTTP API for render jobs.
//!
//! This crate provides:
//! - Synchronous and background render endpoints
//! - Status lookup by output name
//! - Health and readiness probes
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
