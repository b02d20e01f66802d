//! FFmpeg CLI wrapper and composition planning for reel rendering.
//!
//! This crate provides:
//! - Argument-vector process execution with timeouts
//! - FFmpeg command building and ffprobe measurement
//! - Canonical output format classification
//! - Subtitle reflow
//! - Per-run workspaces with confined path resolution
//! - The stage plan that turns scenes into a finished video

pub mod command;
pub mod error;
pub mod format;
pub mod plan;
pub mod probe;
pub mod subtitles;
pub mod workspace;

pub use command::{check_ffmpeg, check_ffprobe, CapturedOutput, FfmpegCommand, ProcessRunner};
pub use error::{MediaError, MediaResult};
pub use format::classify;
pub use plan::{plan_composition, PlanInput, PlannedScene, Stage, StageKind, StagePlan};
pub use probe::{DimensionSource, ImageDimensions, MediaProber};
pub use subtitles::{sanitize_srt, sanitize_subtitle_file, wrap_cue_text};
pub use workspace::{sanitize_name, AssetKind, Workspace};
