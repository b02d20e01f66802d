//! Error types for media operations.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Maximum number of stderr bytes kept in errors.
pub const STDERR_TAIL_BYTES: usize = 4096;

/// Errors that can occur during media processing.
///
/// A tool that never started is reported as either `ToolNotFound` (the binary
/// is not on PATH, checked before spawning) or `SpawnFailed` (the OS refused
/// to start it). Both count as spawn errors, see [`MediaError::is_spawn_error`].
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Failed to start {0}: not found in PATH")]
    ToolNotFound(String),

    #[error("Failed to start {tool}: {source}")]
    SpawnFailed {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {}: {stderr}", exit_label(.code))]
    SubprocessFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{tool} timed out after {timeout_ms} ms")]
    Timeout { tool: String, timeout_ms: u64 },

    #[error("Probe failed for {path}: {message}")]
    ProbeFailed { path: PathBuf, message: String },

    #[error("Path traversal rejected: {0}")]
    PathTraversal(String),

    #[error("Invalid subtitle file: {0}")]
    InvalidSubtitle(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create a subprocess failure error, keeping only the tail of stderr.
    pub fn subprocess_failed(tool: impl Into<String>, code: Option<i32>, stderr: &str) -> Self {
        Self::SubprocessFailed {
            tool: tool.into(),
            code,
            stderr: stderr_tail(stderr),
        }
    }

    /// Create a timeout error.
    pub fn timeout(tool: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            tool: tool.into(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// Create a probe failure error.
    pub fn probe_failed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ProbeFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the tool could not be started at all.
    pub fn is_spawn_error(&self) -> bool {
        matches!(self, Self::ToolNotFound(_) | Self::SpawnFailed { .. })
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "signal".to_string(),
    }
}

/// Last `STDERR_TAIL_BYTES` of a tool's diagnostic output, trimmed.
pub fn stderr_tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.len() <= STDERR_TAIL_BYTES {
        return trimmed.to_string();
    }

    let mut start = trimmed.len() - STDERR_TAIL_BYTES;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &trimmed[start..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stderr_tail_truncates() {
        let long = "x".repeat(STDERR_TAIL_BYTES * 2);
        let tail = stderr_tail(&long);
        assert!(tail.starts_with("..."));
        assert_eq!(tail.len(), STDERR_TAIL_BYTES + 3);

        assert_eq!(stderr_tail("  short \n"), "short");
    }

    #[test]
    fn test_error_messages() {
        let err = MediaError::subprocess_failed("ffmpeg", Some(1), "bad input");
        assert_eq!(err.to_string(), "ffmpeg exited with code 1: bad input");

        let err = MediaError::timeout("ffprobe", Duration::from_millis(1500));
        assert_eq!(err.to_string(), "ffprobe timed out after 1500 ms");
    }
}
