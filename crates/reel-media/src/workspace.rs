//! Job-scoped workspace directories.
//!
//! Every file a job touches lives under one directory that is created per
//! run and removed when the job ends. Externally supplied names are
//! sanitized before they become paths, and every resolved path is checked to
//! stay inside the workspace root.

use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{MediaError, MediaResult};

/// Maximum length of a sanitized file name.
pub const MAX_NAME_LEN: usize = 96;

/// Kind of asset a workspace file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Image,
    Audio,
    Subtitle,
}

impl AssetKind {
    /// Extension appended when a logical name carries none the tools recognise.
    pub fn default_extension(&self) -> &'static str {
        match self {
            AssetKind::Image => "jpg",
            AssetKind::Audio => "mp3",
            AssetKind::Subtitle => "srt",
        }
    }

    fn known_extensions(&self) -> &'static [&'static str] {
        match self {
            AssetKind::Image => &["jpg", "jpeg", "png", "webp", "bmp", "gif", "tif", "tiff"],
            AssetKind::Audio => &["mp3", "wav", "m4a", "aac", "ogg", "opus", "flac"],
            AssetKind::Subtitle => &["srt"],
        }
    }

    /// Suffix to append to `name` so the file has a recognised extension.
    pub fn suffix_for(&self, name: &str) -> Option<&'static str> {
        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if self.known_extensions().contains(&ext.as_str()) {
            None
        } else {
            Some(self.default_extension())
        }
    }
}

/// Directory holding downloaded assets.
const ASSETS_DIR: &str = "assets";
/// Directory holding render intermediates.
const RENDER_DIR: &str = "render";
/// Directory holding the finished artifact.
const OUTPUT_DIR: &str = "output";

/// An isolated per-run directory.
///
/// Assets, render intermediates and the finished artifact live in separate
/// subdirectories, so neither a logical asset name nor a requested output
/// name can ever shadow an intermediate file.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    assets: PathBuf,
    render: PathBuf,
    output: PathBuf,
    destroyed: bool,
}

impl Workspace {
    /// Create a fresh directory under `base_dir`.
    ///
    /// The directory name combines a sanitized `label` with a random UUID, so
    /// two runs for the same job never share a workspace.
    pub async fn allocate(base_dir: impl AsRef<Path>, label: &str) -> MediaResult<Self> {
        let base_dir = base_dir.as_ref();
        fs::create_dir_all(base_dir).await?;
        let base_dir = fs::canonicalize(base_dir).await?;

        let dir_name = format!("{}-{}", sanitize_name(label), Uuid::new_v4());
        let root = base_dir.join(dir_name);
        // create_dir (not create_dir_all) fails if the directory already exists
        fs::create_dir(&root).await?;

        let workspace = Self {
            assets: root.join(ASSETS_DIR),
            render: root.join(RENDER_DIR),
            output: root.join(OUTPUT_DIR),
            root,
            destroyed: false,
        };
        fs::create_dir(&workspace.assets).await?;
        fs::create_dir(&workspace.render).await?;
        fs::create_dir(&workspace.output).await?;

        info!(workspace = %workspace.root.display(), "Allocated workspace");
        Ok(workspace)
    }

    /// Workspace root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory downloaded assets are resolved into.
    pub fn assets_dir(&self) -> &Path {
        &self.assets
    }

    /// Directory for intermediate render artifacts.
    pub fn render_dir(&self) -> &Path {
        &self.render
    }

    /// Directory the finished artifact is written to.
    pub fn output_dir(&self) -> &Path {
        &self.output
    }

    /// Map an opaque name to a path strictly inside the workspace.
    ///
    /// `suffix` is appended as an extension when given.
    pub fn resolve(&self, logical_name: &str, suffix: Option<&str>) -> MediaResult<PathBuf> {
        let mut file_name = safe_file_name(logical_name);
        if let Some(suffix) = suffix {
            let suffix = sanitize_name(suffix.trim_start_matches('.'));
            file_name.push('.');
            file_name.push_str(&suffix);
        }

        let candidate = self.assets.join(&file_name);
        ensure_within(&self.assets, &candidate)?;
        Ok(candidate)
    }

    /// Resolve a path for an asset of a given kind, adding the kind's default
    /// extension when the name lacks a recognised one.
    pub fn resolve_asset(&self, logical_name: &str, kind: AssetKind) -> MediaResult<PathBuf> {
        self.resolve(logical_name, kind.suffix_for(logical_name))
    }

    /// Path for a render intermediate such as the sanitized subtitle file.
    pub fn artifact(&self, name: &str) -> MediaResult<PathBuf> {
        let candidate = self.render.join(safe_file_name(name));
        ensure_within(&self.render, &candidate)?;
        Ok(candidate)
    }

    /// Path the finished artifact named `name` is rendered to.
    pub fn output(&self, name: &str) -> MediaResult<PathBuf> {
        let candidate = self.output.join(safe_file_name(name));
        ensure_within(&self.output, &candidate)?;
        Ok(candidate)
    }

    /// Remove the workspace and everything in it.
    ///
    /// Safe to call more than once. Failures are logged, never returned.
    pub async fn destroy(&mut self) {
        if self.destroyed {
            debug!(workspace = %self.root.display(), "Workspace already destroyed");
            return;
        }

        match fs::remove_dir_all(&self.root).await {
            Ok(()) => info!(workspace = %self.root.display(), "Removed workspace"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                workspace = %self.root.display(),
                error = %e,
                "Failed to remove workspace"
            ),
        }
        self.destroyed = true;
    }

    /// Whether `destroy` has run.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.destroyed {
            return;
        }
        // reached only when the owning task unwound before calling destroy
        if let Err(e) = std::fs::remove_dir_all(&self.root) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    workspace = %self.root.display(),
                    error = %e,
                    "Failed to remove workspace on drop"
                );
            }
        }
    }
}

/// Replace disallowed characters, strip leading dots and cap the length.
pub fn sanitize_name(raw: &str) -> String {
    let mut cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.len() > MAX_NAME_LEN {
        // keep a short extension when cutting long names
        cleaned = match cleaned.rsplit_once('.') {
            Some((stem, ext)) if !ext.is_empty() && ext.len() <= 8 => {
                let keep = MAX_NAME_LEN - ext.len() - 1;
                format!("{}.{}", &stem[..keep.min(stem.len())], ext)
            }
            _ => cleaned[..MAX_NAME_LEN].to_string(),
        };
    }

    if cleaned.is_empty() {
        "asset".to_string()
    } else {
        cleaned
    }
}

/// Sanitized file name that stays unique per logical name.
///
/// If sanitizing changed the name, a short digest of the original is
/// appended so distinct names cannot collapse onto the same file.
fn safe_file_name(logical_name: &str) -> String {
    let cleaned = sanitize_name(logical_name);
    if cleaned == logical_name {
        return cleaned;
    }

    let digest = Sha256::digest(logical_name.as_bytes());
    let tag: String = digest.iter().take(4).map(|b| format!("{:02x}", b)).collect();

    match cleaned.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}-{}.{}", stem, tag, ext),
        _ => format!("{}-{}", cleaned, tag),
    }
}

fn ensure_within(root: &Path, candidate: &Path) -> MediaResult<()> {
    let relative = candidate
        .strip_prefix(root)
        .map_err(|_| MediaError::PathTraversal(candidate.display().to_string()))?;

    let mut components = relative.components();
    let single_normal = matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none();

    if !single_normal {
        return Err(MediaError::PathTraversal(candidate.display().to_string()));
    }
    Ok(())
}
