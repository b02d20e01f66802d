//! FFprobe measurements.
//!
//! Narration duration is required to build the timeline, so failing to read
//! it is fatal. Image dimensions only choose the output format; when they
//! cannot be read the prober reports a defaulted vertical result and says so
//! in the return value.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::command::ProcessRunner;
use crate::error::{MediaError, MediaResult};

/// Width reported when image dimensions cannot be measured.
pub const FALLBACK_WIDTH: u32 = 1080;
/// Height reported when image dimensions cannot be measured.
pub const FALLBACK_HEIGHT: u32 = 1920;

/// Where a dimension result came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DimensionSource {
    /// Read from the image stream
    Measured,
    /// Probe failed; fallback values were used
    Defaulted { reason: String },
}

/// Image size in pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
    pub source: DimensionSource,
}

impl ImageDimensions {
    pub fn measured(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            source: DimensionSource::Measured,
        }
    }

    pub fn fallback(reason: impl Into<String>) -> Self {
        Self {
            width: FALLBACK_WIDTH,
            height: FALLBACK_HEIGHT,
            source: DimensionSource::Defaulted {
                reason: reason.into(),
            },
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self.source, DimensionSource::Defaulted { .. })
    }
}

/// FFprobe JSON output format (streams only).
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    width: Option<u32>,
    height: Option<u32>,
}

/// Measures media files with `ffprobe`.
#[derive(Debug, Clone)]
pub struct MediaProber {
    runner: ProcessRunner,
    timeout: Duration,
}

impl MediaProber {
    /// Create a prober whose every call is bounded by `timeout`.
    pub fn new(runner: ProcessRunner, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    /// Container duration in seconds. Fails unless the value is a positive number.
    pub async fn audio_duration(&self, path: impl AsRef<Path>) -> MediaResult<f64> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }

        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "default=noprint_wrappers=1:nokey=1".to_string(),
            path.to_string_lossy().to_string(),
        ];

        let output = self
            .runner
            .run("ffprobe", &args, self.timeout)
            .await
            .map_err(|e| MediaError::probe_failed(path, e.to_string()))?;

        let duration = parse_duration(&output.stdout)
            .map_err(|message| MediaError::probe_failed(path, message))?;
        debug!(path = %path.display(), duration = duration, "Probed duration");
        Ok(duration)
    }

    /// Width and height of the first video stream, or the fallback.
    pub async fn image_dimensions(&self, path: impl AsRef<Path>) -> ImageDimensions {
        let path = path.as_ref();

        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-select_streams".to_string(),
            "v:0".to_string(),
            "-show_entries".to_string(),
            "stream=width,height".to_string(),
            "-of".to_string(),
            "json".to_string(),
            path.to_string_lossy().to_string(),
        ];

        let result = match self.runner.run("ffprobe", &args, self.timeout).await {
            Ok(output) => parse_dimensions(&output.stdout),
            Err(e) => Err(e.to_string()),
        };

        match result {
            Ok((width, height)) => {
                debug!(path = %path.display(), width, height, "Probed image dimensions");
                ImageDimensions::measured(width, height)
            }
            Err(reason) => {
                warn!(
                    path = %path.display(),
                    reason = %reason,
                    "Image probe failed, using {}x{} fallback",
                    FALLBACK_WIDTH,
                    FALLBACK_HEIGHT
                );
                ImageDimensions::fallback(reason)
            }
        }
    }
}

/// Parse the bare duration value printed by ffprobe.
pub fn parse_duration(stdout: &str) -> Result<f64, String> {
    let raw = stdout.trim();
    let duration: f64 = raw
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .parse()
        .map_err(|_| format!("unparsable duration output {:?}", raw))?;

    if !duration.is_finite() || duration <= 0.0 {
        return Err(format!("duration must be positive, got {}", duration));
    }
    Ok(duration)
}

fn parse_dimensions(stdout: &str) -> Result<(u32, u32), String> {
    let probe: FfprobeOutput =
        serde_json::from_str(stdout).map_err(|e| format!("invalid ffprobe output: {}", e))?;

    let stream = probe
        .streams
        .first()
        .ok_or_else(|| "no video stream found".to_string())?;

    match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => Ok((w, h)),
        _ => Err("stream has no usable width/height".to_string()),
    }
}
