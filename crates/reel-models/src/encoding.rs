//! Encoding configuration shared by every per-scene clip.
//!
//! Concatenation copies streams, so every clip of a job must be encoded with
//! exactly the same parameters. All clip stages read them from one
//! `EncodingConfig`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "fast";
/// Default CRF (Constant Rate Factor)
pub const DEFAULT_CRF: u8 = 20;
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "192k";
/// Default pixel format
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";
/// Default output frame rate
pub const DEFAULT_FRAME_RATE: u32 = 30;
/// Default audio sample rate
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
/// Default audio channel count
pub const DEFAULT_AUDIO_CHANNELS: u8 = 2;

/// Video encoding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset (e.g., "fast", "medium", "slow")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor (quality, 0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Pixel format
    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,

    /// Output frame rate
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,

    /// Audio codec
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Audio sample rate
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Audio channels
    #[serde(default = "default_audio_channels")]
    pub audio_channels: u8,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_crf() -> u8 {
    DEFAULT_CRF
}
fn default_pixel_format() -> String {
    DEFAULT_PIXEL_FORMAT.to_string()
}
fn default_frame_rate() -> u32 {
    DEFAULT_FRAME_RATE
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}
fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}
fn default_audio_channels() -> u8 {
    DEFAULT_AUDIO_CHANNELS
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: default_video_codec(),
            preset: default_preset(),
            crf: DEFAULT_CRF,
            pixel_format: default_pixel_format(),
            frame_rate: DEFAULT_FRAME_RATE,
            audio_codec: default_audio_codec(),
            audio_bitrate: default_audio_bitrate(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            audio_channels: DEFAULT_AUDIO_CHANNELS,
        }
    }
}

impl EncodingConfig {
    /// Create a new encoding configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new config with updated CRF.
    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf;
        self
    }

    /// Returns a new config with updated preset.
    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    /// Output arguments for the video stream.
    pub fn video_args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-pix_fmt".to_string(),
            self.pixel_format.clone(),
            "-r".to_string(),
            self.frame_rate.to_string(),
        ]
    }

    /// Output arguments for the audio stream.
    pub fn audio_args(&self) -> Vec<String> {
        vec![
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
            "-ar".to_string(),
            self.sample_rate.to_string(),
            "-ac".to_string(),
            self.audio_channels.to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let config = EncodingConfig::default();
        let video = config.video_args();
        assert_eq!(&video[..2], &["-c:v".to_string(), "libx264".to_string()]);
        assert!(video.contains(&"yuv420p".to_string()));

        let audio = config.audio_args();
        assert!(audio.contains(&"aac".to_string()));
        assert!(audio.contains(&"44100".to_string()));
    }

    #[test]
    fn test_partial_deserialize_fills_defaults() {
        let config: EncodingConfig = serde_json::from_str(r#"{"crf": 23}"#).unwrap();
        assert_eq!(config.crf, 23);
        assert_eq!(config.codec, DEFAULT_VIDEO_CODEC);
        assert_eq!(config.frame_rate, DEFAULT_FRAME_RATE);
    }
}
