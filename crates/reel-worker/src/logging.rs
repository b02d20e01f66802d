//! Structured job logging utilities.
//!
//! Provides consistent, structured logging for render jobs with tracing spans
//! and contextual information.

use reel_models::JobId;
use tracing::{error, info, warn, Span};
use uuid::Uuid;

/// Job logger for structured logging with consistent formatting.
///
/// Every event carries the job id (derived from the output name), the run id
/// (unique per execution) and the operation.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    run_id: String,
    operation: String,
}

impl JobLogger {
    /// Create a new job logger for one run of a job.
    pub fn new(job_id: &JobId, run_id: Uuid, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            run_id: run_id.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Log the start of a job operation.
    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            run_id = %self.run_id,
            operation = %self.operation,
            "Job started: {}", message
        );
    }

    /// Log a progress update during job execution.
    pub fn log_progress(&self, stage: &str, message: &str) {
        info!(
            job_id = %self.job_id,
            run_id = %self.run_id,
            operation = %self.operation,
            stage = stage,
            "Job progress: {}", message
        );
    }

    /// Log a warning during job execution.
    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            run_id = %self.run_id,
            operation = %self.operation,
            "Job warning: {}", message
        );
    }

    /// Log an error during job execution.
    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            run_id = %self.run_id,
            operation = %self.operation,
            "Job error: {}", message
        );
    }

    /// Log the completion of a job operation.
    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            run_id = %self.run_id,
            operation = %self.operation,
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Create a tracing span for this job run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            run_id = %self.run_id,
            operation = %self.operation
        )
    }
}
