//! Shared data models for the reel composition service.
//!
//! This crate provides Serde-serializable types for:
//! - Render requests and their validation
//! - Jobs, scenes and job state
//! - Canonical output formats
//! - Encoding and audio-mix configuration
//! - Terminal status records

pub mod encoding;
pub mod format;
pub mod job;
pub mod options;
pub mod request;
pub mod status;

// Re-export common types
pub use encoding::EncodingConfig;
pub use format::{CanonicalFormat, Resolution};
pub use job::{Job, JobId, JobState, Scene};
pub use options::{FormatFallback, MixDuration};
pub use request::{sanitize_output_name, RenderRequest, SceneRef, ALLOWED_OUTPUT_EXTENSIONS};
pub use status::{status_key, StatusRecord};
