//! Stage plan execution.

use std::sync::Arc;
use std::time::Instant;

use futures::future::try_join_all;
use metrics::histogram;
use reel_media::{ProcessRunner, Stage, StagePlan};
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;

/// Runs the stages of a plan through ffmpeg.
///
/// Clip stages are independent and share a semaphore sized to the render
/// parallelism; the remaining stages run one after another once every clip
/// exists.
#[derive(Clone)]
pub struct StageExecutor {
    runner: ProcessRunner,
    config: Arc<WorkerConfig>,
    render_slots: Arc<Semaphore>,
}

impl StageExecutor {
    pub fn new(runner: ProcessRunner, config: Arc<WorkerConfig>) -> Self {
        let render_slots = Arc::new(Semaphore::new(config.max_render_parallel.max(1)));
        Self {
            runner,
            config,
            render_slots,
        }
    }

    /// Execute every stage of `plan`.
    pub async fn execute(&self, plan: &StagePlan, logger: &JobLogger) -> WorkerResult<()> {
        let clips = plan.clip_stages();
        logger.log_progress("clips", &format!("Rendering {} scene clips", clips.len()));

        try_join_all(clips.iter().map(|stage| async move {
            let _permit = self
                .render_slots
                .acquire()
                .await
                .map_err(|_| WorkerError::TaskFailed("render semaphore closed".to_string()))?;
            self.run_stage(stage, logger).await
        }))
        .await?;

        for stage in plan.sequential_stages() {
            logger.log_progress(stage.kind.label(), &format!("Running {} stage", stage.kind));
            self.run_stage(stage, logger).await?;
        }

        Ok(())
    }

    async fn run_stage(&self, stage: &Stage, logger: &JobLogger) -> WorkerResult<()> {
        if let Some(manifest) = &stage.manifest {
            tokio::fs::write(&manifest.path, &manifest.contents).await?;
        }

        let timeout = self.config.stage_timeout(stage.kind);
        let started = Instant::now();
        debug!(
            job_id = logger.job_id(),
            stage = %stage.kind,
            output = %stage.output.display(),
            "Starting stage"
        );

        self.runner.run_ffmpeg(&stage.command, timeout).await?;

        let elapsed = started.elapsed();
        histogram!("reel_stage_duration_seconds", "stage" => stage.kind.label())
            .record(elapsed.as_secs_f64());
        info!(
            job_id = logger.job_id(),
            stage = %stage.kind,
            elapsed_ms = elapsed.as_millis() as u64,
            "Stage finished"
        );
        Ok(())
    }
}
