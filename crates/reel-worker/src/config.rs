//! Worker configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use reel_media::StageKind;
use reel_models::{EncodingConfig, FormatFallback, MixDuration};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Base directory for per-run workspaces
    pub work_dir: PathBuf,
    /// Maximum concurrent asset downloads per job
    pub max_download_parallel: usize,
    /// Maximum concurrent clip encodes per job
    pub max_render_parallel: usize,
    /// Timeout for each asset download
    pub download_timeout: Duration,
    /// Timeout for each ffprobe call
    pub probe_timeout: Duration,
    /// Timeout for each per-scene clip encode
    pub clip_timeout: Duration,
    /// Timeout for the concat stage
    pub concat_timeout: Duration,
    /// Timeout for the music mix stage
    pub mix_timeout: Duration,
    /// Timeout for the subtitle burn-in stage
    pub subtitle_timeout: Duration,
    /// Timeout for the artifact and status uploads
    pub upload_timeout: Duration,
    /// Retries for a status record write
    pub status_retries: u32,
    /// Delay before the first status write retry; doubles per retry
    pub status_retry_delay: Duration,
    /// Mix policy when a request does not choose one
    pub default_mix_duration: MixDuration,
    /// What to do when the first image cannot be probed
    pub format_fallback: FormatFallback,
    /// Codec parameters shared by every encode
    pub encoding: EncodingConfig,
}

fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/reel"),
            max_download_parallel: 8,
            max_render_parallel: available_parallelism(),
            download_timeout: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(30),
            clip_timeout: Duration::from_secs(300),
            concat_timeout: Duration::from_secs(120),
            mix_timeout: Duration::from_secs(600),
            subtitle_timeout: Duration::from_secs(600),
            upload_timeout: Duration::from_secs(300),
            status_retries: 3,
            status_retry_delay: Duration::from_millis(200),
            default_mix_duration: MixDuration::First,
            format_fallback: FormatFallback::Warn,
            encoding: EncodingConfig::default(),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_secs(key: &str, default: Duration) -> Duration {
    Duration::from_secs(env_or(key, default.as_secs()))
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let mut encoding = defaults.encoding.clone();
        encoding.crf = env_or("REEL_VIDEO_CRF", encoding.crf);
        encoding.preset = env_or("REEL_VIDEO_PRESET", encoding.preset);

        Self {
            work_dir: std::env::var("REEL_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            max_download_parallel: env_or(
                "REEL_MAX_DOWNLOAD_PARALLEL",
                defaults.max_download_parallel,
            )
            .max(1),
            max_render_parallel: env_or("REEL_MAX_RENDER_PARALLEL", defaults.max_render_parallel)
                .max(1),
            download_timeout: env_secs("REEL_DOWNLOAD_TIMEOUT_SECS", defaults.download_timeout),
            probe_timeout: env_secs("REEL_PROBE_TIMEOUT_SECS", defaults.probe_timeout),
            clip_timeout: env_secs("REEL_CLIP_TIMEOUT_SECS", defaults.clip_timeout),
            concat_timeout: env_secs("REEL_CONCAT_TIMEOUT_SECS", defaults.concat_timeout),
            mix_timeout: env_secs("REEL_MIX_TIMEOUT_SECS", defaults.mix_timeout),
            subtitle_timeout: env_secs("REEL_SUBTITLE_TIMEOUT_SECS", defaults.subtitle_timeout),
            upload_timeout: env_secs("REEL_UPLOAD_TIMEOUT_SECS", defaults.upload_timeout),
            status_retries: env_or("REEL_STATUS_RETRIES", defaults.status_retries),
            status_retry_delay: Duration::from_millis(env_or(
                "REEL_STATUS_RETRY_DELAY_MS",
                defaults.status_retry_delay.as_millis() as u64,
            )),
            default_mix_duration: env_or("REEL_MIX_DURATION", defaults.default_mix_duration),
            format_fallback: env_or("REEL_FORMAT_FALLBACK", defaults.format_fallback),
            encoding,
        }
    }

    /// Timeout applied to one run of a stage.
    pub fn stage_timeout(&self, kind: StageKind) -> Duration {
        match kind {
            StageKind::SceneClip { .. } => self.clip_timeout,
            StageKind::Concat => self.concat_timeout,
            StageKind::AudioMix => self.mix_timeout,
            StageKind::SubtitleBurn => self.subtitle_timeout,
        }
    }
}
