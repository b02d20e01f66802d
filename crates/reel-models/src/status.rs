//! Terminal status records.
//!
//! Exactly one record is published per job, under a key derived from the
//! output name so pollers can find it without an index.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{JobState, Resolution};

/// Storage key of the status record for `output_name`.
pub fn status_key(output_name: &str) -> String {
    format!("{}.json", output_name)
}

/// Durable terminal outcome of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    /// `completed` or `failed`
    pub status: JobState,

    /// Job the record belongs to
    pub job_id: String,

    /// Rendered output name (completed only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_name: Option<String>,

    /// Rendered resolution (completed only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,

    /// Sum of scene narration durations (completed only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,

    /// Non-fatal issues encountered while rendering
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    /// Error description (failed only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// When the record was produced
    pub timestamp: DateTime<Utc>,
}

impl StatusRecord {
    /// Record for a job whose output was uploaded.
    pub fn completed(
        job_id: impl Into<String>,
        output_name: impl Into<String>,
        resolution: Resolution,
        duration_secs: f64,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            status: JobState::Completed,
            job_id: job_id.into(),
            output_name: Some(output_name.into()),
            resolution: Some(resolution),
            duration_secs: Some(duration_secs),
            warnings,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Record for a job that failed at any step.
    pub fn failed(job_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: JobState::Failed,
            job_id: job_id.into(),
            output_name: None,
            resolution: None,
            duration_secs: None,
            warnings: Vec::new(),
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == JobState::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CanonicalFormat;

    #[test]
    fn test_status_key() {
        assert_eq!(status_key("story.mp4"), "story.mp4.json");
    }

    #[test]
    fn test_completed_record_shape() {
        let record = StatusRecord::completed(
            "story",
            "story.mp4",
            CanonicalFormat::Vertical.into(),
            7.5,
            Vec::new(),
        );
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["status"], "completed");
        assert_eq!(value["outputName"], "story.mp4");
        assert_eq!(value["resolution"]["height"], 1920);
        assert!(value.get("error").is_none());
        assert!(value.get("warnings").is_none());
        assert!(value.get("timestamp").is_some());
    }

    #[test]
    fn test_failed_record_shape() {
        let record = StatusRecord::failed("story", "asset unavailable: a.jpg");
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["status"], "failed");
        assert_eq!(value["error"], "asset unavailable: a.jpg");
        assert!(value.get("outputName").is_none());

        let back: StatusRecord = serde_json::from_value(value).unwrap();
        assert!(!back.is_completed());
    }
}
