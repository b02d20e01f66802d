//! External tool execution and FFmpeg command building.
//!
//! Tools are always started from an argument vector. Nothing is ever passed
//! through a shell, so asset names and subtitle text stay opaque data.
//!
//! Failures fall into three groups: the tool could not be started
//! ([`MediaError::is_spawn_error`], covering a binary missing from PATH),
//! it exited non-zero (`SubprocessFailed`), or it was killed on timeout.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use metrics::histogram;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{stderr_tail, MediaError, MediaResult};

/// Output captured from a finished tool invocation.
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

/// Runs external tools with a per-call timeout.
///
/// The runner holds no mutable state; concurrent calls are independent.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self
    }

    /// Run `tool` with `args` and wait at most `timeout` for it to exit.
    ///
    /// The process is killed when the timeout elapses. A non-zero exit status
    /// becomes `SubprocessFailed` carrying the tail of stderr.
    pub async fn run(
        &self,
        tool: &str,
        args: &[String],
        timeout: Duration,
    ) -> MediaResult<CapturedOutput> {
        let program = which::which(tool).map_err(|_| MediaError::ToolNotFound(tool.to_string()))?;
        debug!(tool = tool, "Running: {} {}", tool, args.join(" "));

        let started = Instant::now();
        let mut child = Command::new(&program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| MediaError::SpawnFailed {
                tool: tool.to_string(),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("stderr not captured"))?;
        let stdout_task = spawn_reader(stdout);
        let stderr_task = spawn_reader(stderr);

        let status = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                warn!(
                    tool = tool,
                    timeout_ms = timeout.as_millis() as u64,
                    "Tool timed out, killing process"
                );
                if let Err(e) = child.kill().await {
                    warn!(tool = tool, error = %e, "Failed to kill timed out process");
                }
                stdout_task.abort();
                stderr_task.abort();
                return Err(MediaError::timeout(tool, timeout));
            }
        };

        let stdout = collect(stdout_task).await;
        let stderr = collect(stderr_task).await;
        let elapsed = started.elapsed();
        histogram!("reel_tool_duration_seconds", "tool" => tool.to_string())
            .record(elapsed.as_secs_f64());

        if !status.success() {
            warn!(
                tool = tool,
                code = ?status.code(),
                stderr = %stderr_tail(&stderr),
                "Tool exited with failure"
            );
            return Err(MediaError::subprocess_failed(tool, status.code(), &stderr));
        }

        Ok(CapturedOutput {
            stdout,
            stderr,
            elapsed,
        })
    }

    /// Run an FFmpeg command.
    pub async fn run_ffmpeg(
        &self,
        cmd: &FfmpegCommand,
        timeout: Duration,
    ) -> MediaResult<CapturedOutput> {
        self.run("ffmpeg", &cmd.build_args(), timeout).await
    }
}

fn spawn_reader<R>(mut reader: R) -> JoinHandle<std::io::Result<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    })
}

async fn collect(handle: JoinHandle<std::io::Result<Vec<u8>>>) -> String {
    match handle.await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        _ => String::new(),
    }
}

/// One `-i` input with the options that precede it.
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegInput {
    /// Input options (before -i)
    pub args: Vec<String>,
    /// Input file path
    pub path: PathBuf,
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegCommand {
    /// Inputs in `-i` order
    inputs: Vec<FfmpegInput>,
    /// Output file path
    output: PathBuf,
    /// Output arguments (after all inputs)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command writing to `output`.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add an input without options.
    pub fn input(self, path: impl AsRef<Path>) -> Self {
        self.input_with(Vec::<String>::new(), path)
    }

    /// Add an input preceded by input options.
    pub fn input_with<I, S>(mut self, args: I, path: impl AsRef<Path>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.push(FfmpegInput {
            args: args.into_iter().map(Into::into).collect(),
            path: path.as_ref().to_path_buf(),
        });
        self
    }

    /// Add an output argument.
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Map a stream or filter label into the output.
    pub fn map(self, stream: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(stream)
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Copy all streams without re-encoding.
    pub fn codec_copy(self) -> Self {
        self.output_arg("-c").output_arg("copy")
    }

    /// Limit output duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format!("{:.3}", seconds))
    }

    /// Move the index to the front of MP4/MOV output.
    pub fn faststart(self) -> Self {
        self.output_arg("-movflags").output_arg("+faststart")
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Output file path.
    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Inputs in `-i` order.
    pub fn inputs(&self) -> &[FfmpegInput] {
        &self.inputs
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        // Overwrite flag
        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-hide_banner".to_string());
        args.push("-nostdin".to_string());

        // Log level
        args.push("-v".to_string());
        args.push(self.log_level.clone());

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.path.to_string_lossy().to_string());
        }

        // Output args
        args.extend(self.output_args.iter().cloned());

        // Output file
        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::ToolNotFound("ffmpeg".to_string()))
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::ToolNotFound("ffprobe".to_string()))
}
