//! Render request payload and its synchronous validation.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{FormatFallback, MixDuration};

/// Output container extensions a job may render to.
pub const ALLOWED_OUTPUT_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv", "m4v"];

/// Maximum length of an output name.
pub const MAX_OUTPUT_NAME_LEN: usize = 128;

/// One scene of a render request: an image held for the length of its narration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SceneRef {
    /// Logical name of the image asset
    #[serde(default, alias = "imagem")]
    pub image: String,
    /// Logical name of the narration audio asset
    #[serde(default, alias = "narracao")]
    pub narration: String,
}

impl SceneRef {
    pub fn new(image: impl Into<String>, narration: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            narration: narration.into(),
        }
    }
}

/// Request to assemble a video.
///
/// Accepts both the English keys and the legacy keys
/// (`cenas`, `imagem`, `narracao`, `musica`, `legenda`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    /// Scenes in playback order
    #[serde(default, alias = "cenas")]
    pub scenes: Vec<SceneRef>,

    /// Background music asset
    #[serde(default, alias = "musica", skip_serializing_if = "Option::is_none")]
    pub music: Option<String>,

    /// Subtitle (SRT) asset
    #[serde(default, alias = "legenda", skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,

    /// Name of the rendered file in the blob store
    #[serde(default)]
    pub output_file: String,

    /// Mixed audio duration policy (worker default when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mix_duration: Option<MixDuration>,

    /// Policy for an unreadable first image (worker default when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_fallback: Option<FormatFallback>,
}

impl RenderRequest {
    /// Music asset name, ignoring blank values.
    pub fn music(&self) -> Option<&str> {
        non_blank(self.music.as_deref())
    }

    /// Subtitle asset name, ignoring blank values.
    pub fn subtitle(&self) -> Option<&str> {
        non_blank(self.subtitle.as_deref())
    }

    /// Validate the request.
    pub fn validate(&self) -> Result<(), String> {
        if self.scenes.is_empty() {
            return Err("At least one scene is required".to_string());
        }

        for (idx, scene) in self.scenes.iter().enumerate() {
            if scene.image.trim().is_empty() {
                return Err(format!("Scene {} is missing an image", idx));
            }
            if scene.narration.trim().is_empty() {
                return Err(format!("Scene {} is missing a narration", idx));
            }
        }

        sanitize_output_name(&self.output_file)?;

        Ok(())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Check an output name before it is used as a filesystem or storage key.
///
/// Returns the trimmed name. Names are rejected rather than rewritten, since
/// callers poll for the status record under the name they supplied.
pub fn sanitize_output_name(raw: &str) -> Result<String, String> {
    let name = raw.trim();

    if name.is_empty() {
        return Err("outputFile is required".to_string());
    }

    if name.len() > MAX_OUTPUT_NAME_LEN {
        return Err(format!(
            "outputFile exceeds {} characters",
            MAX_OUTPUT_NAME_LEN
        ));
    }

    if name.contains('/') || name.contains('\\') {
        return Err("outputFile must not contain path separators".to_string());
    }

    if name.starts_with('.') || name.contains("..") {
        return Err("outputFile must not contain relative path segments".to_string());
    }

    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(format!("outputFile contains disallowed character {:?}", c));
    }

    let extension = name
        .rsplit_once('.')
        .map(|(stem, ext)| (stem, ext.to_ascii_lowercase()))
        .filter(|(stem, _)| !stem.is_empty())
        .map(|(_, ext)| ext)
        .ok_or_else(|| "outputFile must have an extension".to_string())?;

    if !ALLOWED_OUTPUT_EXTENSIONS.contains(&extension.as_str()) {
        return Err(format!(
            "outputFile extension '{}' is not allowed (expected one of {})",
            extension,
            ALLOWED_OUTPUT_EXTENSIONS.join(", ")
        ));
    }

    Ok(name.to_string())
}
