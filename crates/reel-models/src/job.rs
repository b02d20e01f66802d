//! Job definitions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::request::sanitize_output_name;
use crate::{FormatFallback, MixDuration, RenderRequest};

/// Identifier of a job, derived from its output name.
///
/// Two submissions with the same output name share a `JobId`; each run still
/// gets its own `run_id` so their workspaces never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Derive a job ID from a (validated) output name.
    pub fn from_output_name(output_name: &str) -> Self {
        let stem = output_name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .filter(|stem| !stem.is_empty())
            .unwrap_or(output_name);
        Self(stem.to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Accepted, not yet started
    #[default]
    Pending,
    /// Pipeline is running
    Running,
    /// Output uploaded
    Completed,
    /// Pipeline failed
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scene of an accepted job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Scene {
    /// Logical name of the image asset
    pub image: String,
    /// Logical name of the narration asset
    pub narration: String,
    /// Narration length in seconds, set once probing succeeds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

/// A job accepted for rendering.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Job ID (derived from the output name)
    pub id: JobId,

    /// Unique per submission; names the workspace
    pub run_id: Uuid,

    /// Scenes in playback order
    pub scenes: Vec<Scene>,

    /// Background music asset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music: Option<String>,

    /// Subtitle asset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,

    /// Validated output name
    pub output_name: String,

    /// Mixed audio duration policy
    pub mix_duration: MixDuration,

    /// Policy for an unreadable first image
    pub format_fallback: FormatFallback,

    /// Job state
    #[serde(default)]
    pub state: JobState,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Started at timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// Completed at timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Job {
    /// Validate a request and turn it into a pending job.
    ///
    /// `mix_duration` and `format_fallback` are used when the request does not
    /// set them.
    pub fn from_request(
        request: &RenderRequest,
        mix_duration: MixDuration,
        format_fallback: FormatFallback,
    ) -> Result<Self, String> {
        request.validate()?;
        let output_name = sanitize_output_name(&request.output_file)?;
        let now = Utc::now();

        Ok(Self {
            id: JobId::from_output_name(&output_name),
            run_id: Uuid::new_v4(),
            scenes: request
                .scenes
                .iter()
                .map(|s| Scene {
                    image: s.image.clone(),
                    narration: s.narration.clone(),
                    duration: None,
                })
                .collect(),
            music: request.music().map(str::to_string),
            subtitle: request.subtitle().map(str::to_string),
            output_name,
            mix_duration: request.mix_duration.unwrap_or(mix_duration),
            format_fallback: request.format_fallback.unwrap_or(format_fallback),
            state: JobState::Pending,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            error_message: None,
        })
    }

    /// Every logical asset name the job references, without duplicates.
    pub fn asset_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let mut push = |name: &str| {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        };

        for scene in &self.scenes {
            push(&scene.image);
            push(&scene.narration);
        }
        if let Some(music) = &self.music {
            push(music);
        }
        if let Some(subtitle) = &self.subtitle {
            push(subtitle);
        }

        names
    }

    /// Sum of the measured scene durations.
    pub fn total_duration(&self) -> f64 {
        self.scenes.iter().filter_map(|s| s.duration).sum()
    }

    /// Start processing the job.
    pub fn start(mut self) -> Self {
        self.state = JobState::Running;
        self.started_at = Some(Utc::now());
        self.updated_at = Utc::now();
        self
    }

    /// Mark job as completed.
    pub fn complete(mut self) -> Self {
        self.state = JobState::Completed;
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
        self
    }

    /// Mark job as failed.
    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.state = JobState::Failed;
        self.error_message = Some(error.into());
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
        self
    }
}
