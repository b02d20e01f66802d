//! Job orchestration: the end-to-end render pipeline.
//!
//! A job is validated and claimed synchronously, then runs through asset
//! resolution, probing, planning, stage execution and upload. Exactly one
//! status record is written per job (retried until the store gives up), and
//! the workspace is removed whatever the outcome.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use metrics::{counter, histogram};
use reel_media::{
    classify, plan_composition, sanitize_subtitle_file, DimensionSource, MediaError, MediaProber,
    PlanInput, PlannedScene, ProcessRunner, Workspace,
};
use reel_models::{
    status_key, CanonicalFormat, FormatFallback, Job, JobId, RenderRequest, Resolution,
    StatusRecord,
};
use reel_storage::{content_type_for, BlobStore};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, Instrument};

use crate::assets::{asset_requests, AssetResolver};
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::render::StageExecutor;
use crate::retry::RetryPolicy;
use crate::status::StatusStore;

/// File name the reflowed subtitles are written to inside the workspace.
const SANITIZED_SUBTITLES: &str = "subtitles.sanitized.srt";

/// Outcome of a successful render.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderSummary {
    pub job_id: JobId,
    pub output_name: String,
    pub format: CanonicalFormat,
    pub resolution: Resolution,
    /// Sum of the narration durations
    pub duration_secs: f64,
    pub scene_count: usize,
    pub warnings: Vec<String>,
    pub status_key: String,
}

/// An accepted job running in the background.
#[derive(Debug)]
pub struct JobHandle {
    pub job_id: JobId,
    pub output_name: String,
    pub status_key: String,
    task: JoinHandle<StatusRecord>,
}

impl JobHandle {
    /// Wait for the job to reach its terminal status.
    pub async fn wait(self) -> WorkerResult<StatusRecord> {
        self.task
            .await
            .map_err(|e| WorkerError::TaskFailed(e.to_string()))
    }
}

/// Releases an output name when the job holding it ends.
struct InFlightGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
    output_name: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.output_name);
    }
}

/// Drives render jobs from request to status record.
///
/// Cheap to clone; clones share configuration, storage and the set of
/// in-flight output names.
#[derive(Clone)]
pub struct JobOrchestrator {
    config: Arc<WorkerConfig>,
    store: Arc<dyn BlobStore>,
    resolver: AssetResolver,
    prober: MediaProber,
    executor: StageExecutor,
    status: StatusStore,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl JobOrchestrator {
    pub fn new(config: WorkerConfig, store: Arc<dyn BlobStore>) -> Self {
        let config = Arc::new(config);
        let runner = ProcessRunner::new();

        Self {
            resolver: AssetResolver::new(
                store.clone(),
                config.max_download_parallel,
                config.download_timeout,
            ),
            prober: MediaProber::new(runner.clone(), config.probe_timeout),
            executor: StageExecutor::new(runner, config.clone()),
            status: StatusStore::new(store.clone(), config.upload_timeout).with_retry(
                RetryPolicy::new(config.status_retries, config.status_retry_delay),
            ),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            config,
            store,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Status records for this orchestrator's store.
    pub fn status_store(&self) -> &StatusStore {
        &self.status
    }

    /// Whether a job writing `output_name` is currently running.
    pub fn is_running(&self, output_name: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(output_name)
    }

    /// Number of jobs currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Validate `request` and start it in the background.
    ///
    /// Returns once the job is accepted; the pipeline runs on its own task
    /// and reports only through the status record.
    pub fn submit(&self, request: &RenderRequest) -> WorkerResult<JobHandle> {
        let (job, guard) = self.accept(request)?;
        let job_id = job.id.clone();
        let output_name = job.output_name.clone();
        let logger = JobLogger::new(&job.id, job.run_id, "render");

        let this = self.clone();
        let task = tokio::spawn(
            async move {
                let _guard = guard;
                let (record, _) = this.execute(job).await;
                record
            }
            .instrument(logger.create_span()),
        );

        Ok(JobHandle {
            status_key: status_key(&output_name),
            job_id,
            output_name,
            task,
        })
    }

    /// Validate `request` and run it to completion.
    pub async fn run(&self, request: &RenderRequest) -> WorkerResult<RenderSummary> {
        let (job, _guard) = self.accept(request)?;
        let logger = JobLogger::new(&job.id, job.run_id, "render");
        let (_, result) = self.execute(job).instrument(logger.create_span()).await;
        result
    }

    fn accept(&self, request: &RenderRequest) -> WorkerResult<(Job, InFlightGuard)> {
        let job = Job::from_request(
            request,
            self.config.default_mix_duration,
            self.config.format_fallback,
        )
        .map_err(WorkerError::InvalidPayload)?;

        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(job.output_name.clone()) {
            counter!("reel_jobs_rejected_total", "reason" => "duplicate").increment(1);
            return Err(WorkerError::DuplicateJob(job.output_name));
        }
        drop(set);

        counter!("reel_jobs_accepted_total").increment(1);
        let guard = InFlightGuard {
            in_flight: self.in_flight.clone(),
            output_name: job.output_name.clone(),
        };
        Ok((job, guard))
    }

    /// Run the pipeline, write the status record and tear down the workspace.
    async fn execute(&self, job: Job) -> (StatusRecord, WorkerResult<RenderSummary>) {
        let logger = JobLogger::new(&job.id, job.run_id, "render");
        let mut job = job.start();
        let started = Instant::now();
        logger.log_start(&format!(
            "{} scenes -> {}",
            job.scenes.len(),
            job.output_name
        ));

        let result = match Workspace::allocate(&self.config.work_dir, job.id.as_str()).await {
            Ok(mut workspace) => {
                let result = self.pipeline(&mut job, &workspace, &logger).await;
                workspace.destroy().await;
                result
            }
            Err(e) => Err(e.into()),
        };

        let (record, result) = self.settle(&job, result, &logger).await;

        histogram!("reel_job_duration_seconds").record(started.elapsed().as_secs_f64());
        let job = match &result {
            Ok(summary) => {
                counter!("reel_jobs_completed_total").increment(1);
                logger.log_completion(&format!(
                    "{} at {} ({:.2}s)",
                    summary.output_name, summary.format, summary.duration_secs
                ));
                job.complete()
            }
            Err(e) => {
                counter!("reel_jobs_failed_total").increment(1);
                logger.log_error(&e.to_string());
                job.fail(e.to_string())
            }
        };
        debug!(
            job_id = %job.id,
            state = %job.state,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Job reached terminal state"
        );

        (record, result)
    }

    /// Turn the pipeline outcome into the job's status record and publish it.
    ///
    /// A render whose record cannot be written even after retries is reported
    /// as failed to the caller, and the returned record says so even though
    /// it was never stored. The rendered artifact stays uploaded.
    async fn settle(
        &self,
        job: &Job,
        result: WorkerResult<RenderSummary>,
        logger: &JobLogger,
    ) -> (StatusRecord, WorkerResult<RenderSummary>) {
        let record = match &result {
            Ok(summary) => StatusRecord::completed(
                job.id.as_str(),
                summary.output_name.clone(),
                summary.resolution,
                summary.duration_secs,
                summary.warnings.clone(),
            ),
            Err(e) => StatusRecord::failed(job.id.as_str(), e.to_string()),
        };

        if let Err(e) = self.status.publish(&job.output_name, &record).await {
            logger.log_error(&format!("Failed to publish status record: {}", e));
            if result.is_ok() {
                return (StatusRecord::failed(job.id.as_str(), e.to_string()), Err(e));
            }
        }

        (record, result)
    }

    async fn pipeline(
        &self,
        job: &mut Job,
        workspace: &Workspace,
        logger: &JobLogger,
    ) -> WorkerResult<RenderSummary> {
        let mut warnings = Vec::new();

        let requests = asset_requests(job);
        logger.log_progress("assets", &format!("Resolving {} assets", requests.len()));
        let assets = self.resolver.resolve(workspace, &requests).await?;

        let subtitles = match &job.subtitle {
            Some(name) => {
                let sanitized = workspace.artifact(SANITIZED_SUBTITLES)?;
                let cues = sanitize_subtitle_file(assets.path(name)?, &sanitized).await?;
                logger.log_progress("subtitles", &format!("Reflowed {} cues", cues));
                Some(sanitized)
            }
            None => None,
        };

        logger.log_progress("probe", "Measuring narration durations");
        let mut scenes = Vec::with_capacity(job.scenes.len());
        for scene in job.scenes.iter_mut() {
            let narration = assets.path(&scene.narration)?;
            let duration = self.prober.audio_duration(narration).await?;
            scene.duration = Some(duration);
            scenes.push(PlannedScene {
                image: assets.path(&scene.image)?.to_path_buf(),
                narration: narration.to_path_buf(),
                duration,
            });
        }

        let first_image = &scenes[0].image;
        let dimensions = self.prober.image_dimensions(first_image).await;
        if let DimensionSource::Defaulted { reason } = &dimensions.source {
            match job.format_fallback {
                FormatFallback::Abort => {
                    return Err(MediaError::probe_failed(first_image, reason.clone()).into());
                }
                FormatFallback::Warn => {
                    let warning = format!(
                        "Could not read dimensions of {}; rendered at default {}x{}",
                        job.scenes[0].image, dimensions.width, dimensions.height
                    );
                    logger.log_warning(&warning);
                    warnings.push(warning);
                }
            }
        }
        let format = classify(dimensions.width, dimensions.height);

        let rendered = workspace.output(&job.output_name)?;
        let plan = plan_composition(&PlanInput {
            scenes: &scenes,
            format,
            music: match &job.music {
                Some(name) => Some(assets.path(name)?),
                None => None,
            },
            subtitles: subtitles.as_deref(),
            mix_duration: job.mix_duration,
            encoding: &self.config.encoding,
            work_dir: workspace.render_dir(),
            output: &rendered,
        })?;
        logger.log_progress(
            "plan",
            &format!("{} stages at {}", plan.len(), format),
        );

        self.executor.execute(&plan, logger).await?;
        self.upload(plan.final_output().to_path_buf(), &job.output_name, logger)
            .await?;

        Ok(RenderSummary {
            job_id: job.id.clone(),
            output_name: job.output_name.clone(),
            format,
            resolution: format.into(),
            duration_secs: job.total_duration(),
            scene_count: job.scenes.len(),
            warnings,
            status_key: status_key(&job.output_name),
        })
    }

    async fn upload(
        &self,
        artifact: PathBuf,
        output_name: &str,
        logger: &JobLogger,
    ) -> WorkerResult<()> {
        logger.log_progress("upload", &format!("Uploading {}", output_name));
        let started = Instant::now();

        tokio::time::timeout(
            self.config.upload_timeout,
            self.store
                .upload_file(&artifact, output_name, content_type_for(output_name)),
        )
        .await
        .map_err(|_| {
            WorkerError::upload_failed(format!(
                "{}: timed out after {} ms",
                output_name,
                self.config.upload_timeout.as_millis()
            ))
        })?
        .map_err(|e| WorkerError::upload_failed(format!("{}: {}", output_name, e)))?;

        histogram!("reel_upload_duration_seconds").record(started.elapsed().as_secs_f64());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;

    use crate::testing::MemoryStore;
    use reel_models::{JobState, MixDuration, SceneRef};
    use tempfile::TempDir;

    fn request(scenes: Vec<SceneRef>, output: &str) -> RenderRequest {
        RenderRequest {
            scenes,
            music: None,
            subtitle: None,
            output_file: output.to_string(),
            mix_duration: None,
            format_fallback: None,
        }
    }

    fn orchestrator(work_dir: &Path, store: Arc<MemoryStore>) -> JobOrchestrator {
        let config = WorkerConfig {
            work_dir: work_dir.to_path_buf(),
            ..WorkerConfig::default()
        };
        JobOrchestrator::new(config, store)
    }

    fn flaky_status_orchestrator(work_dir: &Path, store: Arc<MemoryStore>) -> JobOrchestrator {
        let config = WorkerConfig {
            work_dir: work_dir.to_path_buf(),
            status_retries: 2,
            status_retry_delay: Duration::from_millis(1),
            ..WorkerConfig::default()
        };
        JobOrchestrator::new(config, store)
    }

    fn accepted_job(output: &str) -> Job {
        Job::from_request(
            &request(vec![SceneRef::new("a.jpg", "v.mp3")], output),
            MixDuration::First,
            FormatFallback::Warn,
        )
        .unwrap()
    }

    fn summary_for(job: &Job) -> RenderSummary {
        RenderSummary {
            job_id: job.id.clone(),
            output_name: job.output_name.clone(),
            format: CanonicalFormat::Vertical,
            resolution: CanonicalFormat::Vertical.into(),
            duration_secs: 3.0,
            scene_count: 1,
            warnings: Vec::new(),
            status_key: status_key(&job.output_name),
        }
    }

    fn workspace_count(work_dir: &Path) -> usize {
        std::fs::read_dir(work_dir).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn test_invalid_payload_rejected_before_work() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let orchestrator = orchestrator(dir.path(), store.clone());

        let cases = vec![
            request(Vec::new(), "out.mp4"),
            request(vec![SceneRef::new("a.jpg", "")], "out.mp4"),
            request(vec![SceneRef::new("a.jpg", "v.mp3")], "../out.mp4"),
            request(vec![SceneRef::new("a.jpg", "v.mp3")], "out.exe"),
        ];
        for case in cases {
            let err = orchestrator.submit(&case).unwrap_err();
            assert!(matches!(err, WorkerError::InvalidPayload(_)), "{err}");
        }

        assert!(store.get("out.mp4.json").is_none());
        assert_eq!(workspace_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_failed_job_writes_status_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.insert("a.jpg", b"img".to_vec());
        let orchestrator = orchestrator(dir.path(), store.clone());

        let handle = orchestrator
            .submit(&request(vec![SceneRef::new("a.jpg", "missing.mp3")], "out.mp4"))
            .unwrap();
        assert_eq!(handle.job_id.as_str(), "out");
        assert_eq!(handle.status_key, "out.mp4.json");

        let record = handle.wait().await.unwrap();
        assert_eq!(record.status, JobState::Failed);
        assert!(record.error.as_deref().unwrap().contains("missing.mp3"));

        let stored: StatusRecord =
            serde_json::from_slice(&store.get("out.mp4.json").unwrap()).unwrap();
        assert_eq!(stored.status, JobState::Failed);
        assert!(store.get("out.mp4").is_none());
        assert_eq!(workspace_count(dir.path()), 0);
        assert_eq!(orchestrator.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_output_rejected_while_running() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new().with_delay(Duration::from_millis(300)));
        let orchestrator = orchestrator(dir.path(), store.clone());
        let req = request(vec![SceneRef::new("a.jpg", "v.mp3")], "dup.mp4");

        let first = orchestrator.submit(&req).unwrap();
        let second = orchestrator.submit(&req).unwrap_err();
        assert!(matches!(second, WorkerError::DuplicateJob(ref name) if name == "dup.mp4"));
        assert!(second.is_rejection());

        first.wait().await.unwrap();
        assert_eq!(orchestrator.in_flight(), 0);

        // the name is free again once the first job has finished
        let third = orchestrator.submit(&req).unwrap();
        third.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_sync_run_reports_failure_and_status() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let orchestrator = orchestrator(dir.path(), store.clone());

        let err = orchestrator
            .run(&request(vec![SceneRef::new("nope.jpg", "nope.mp3")], "sync.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::AssetUnavailable { .. }));
        assert!(!err.is_rejection());
        assert!(store.get("sync.mp4.json").is_some());
        assert_eq!(workspace_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_artifact_upload_failure_fails_job() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new().failing_uploads());
        let orchestrator = orchestrator(dir.path(), store.clone());
        let job = accepted_job("out.mp4");
        let logger = JobLogger::new(&job.id, job.run_id, "render");

        let artifact = dir.path().join("rendered.mp4");
        tokio::fs::write(&artifact, b"video").await.unwrap();
        let err = orchestrator
            .upload(artifact, &job.output_name, &logger)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::UploadFailed(ref msg) if msg.contains("out.mp4")));
        assert!(store.get("out.mp4").is_none());

        let (record, result) = orchestrator.settle(&job, Err(err), &logger).await;
        assert!(matches!(result, Err(WorkerError::UploadFailed(_))));
        assert_eq!(record.status, JobState::Failed);

        let stored: StatusRecord =
            serde_json::from_slice(&store.get("out.mp4.json").unwrap()).unwrap();
        assert_eq!(stored.status, JobState::Failed);
        assert!(stored.error.as_deref().unwrap().contains("Upload failed"));
    }

    #[tokio::test]
    async fn test_unwritable_status_fails_successful_render() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new().failing_byte_uploads(usize::MAX));
        let orchestrator = flaky_status_orchestrator(dir.path(), store.clone());
        let job = accepted_job("done.mp4");
        let logger = JobLogger::new(&job.id, job.run_id, "render");

        let (record, result) = orchestrator
            .settle(&job, Ok(summary_for(&job)), &logger)
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, WorkerError::UploadFailed(_)));
        assert!(err.to_string().contains("after 3 attempts"), "{err}");
        assert_eq!(record.status, JobState::Failed);
        assert!(store.get("done.mp4.json").is_none());
    }

    #[tokio::test]
    async fn test_status_write_retried_after_transient_failure() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new().failing_byte_uploads(1));
        let orchestrator = flaky_status_orchestrator(dir.path(), store.clone());
        let job = accepted_job("done.mp4");
        let logger = JobLogger::new(&job.id, job.run_id, "render");

        let (record, result) = orchestrator
            .settle(&job, Ok(summary_for(&job)), &logger)
            .await;

        assert_eq!(result.unwrap().output_name, "done.mp4");
        assert!(record.is_completed());
        let stored: StatusRecord =
            serde_json::from_slice(&store.get("done.mp4.json").unwrap()).unwrap();
        assert!(stored.is_completed());
    }

    async fn ffmpeg(args: &[&str]) {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        ProcessRunner::new()
            .run("ffmpeg", &args, Duration::from_secs(60))
            .await
            .unwrap();
    }

    async fn fixture_image(dir: &Path, name: &str, size: &str) -> Vec<u8> {
        let path = dir.join(name);
        let source = format!("color=c=blue:s={}", size);
        ffmpeg(&["-y", "-f", "lavfi", "-i", &source, "-frames:v", "1", path.to_str().unwrap()]).await;
        tokio::fs::read(&path).await.unwrap()
    }

    async fn fixture_tone(dir: &Path, name: &str, seconds: f64) -> Vec<u8> {
        let path = dir.join(name);
        let source = format!("sine=frequency=440:sample_rate=44100:duration={}", seconds);
        ffmpeg(&["-y", "-f", "lavfi", "-i", &source, path.to_str().unwrap()]).await;
        tokio::fs::read(&path).await.unwrap()
    }

    async fn rendered_duration(store: &MemoryStore, key: &str, dir: &Path) -> f64 {
        let path = dir.join("rendered.mp4");
        tokio::fs::write(&path, store.get(key).unwrap()).await.unwrap();
        MediaProber::new(ProcessRunner::new(), Duration::from_secs(30))
            .audio_duration(&path)
            .await
            .unwrap()
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_two_scenes_render_to_summed_duration() {
        let fixtures = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.insert("wide.jpg", fixture_image(fixtures.path(), "wide.jpg", "1920x1080").await);
        store.insert("tall.jpg", fixture_image(fixtures.path(), "tall.jpg", "1080x1920").await);
        store.insert("one.wav", fixture_tone(fixtures.path(), "one.wav", 3.0).await);
        store.insert("two.wav", fixture_tone(fixtures.path(), "two.wav", 4.5).await);

        let orchestrator = orchestrator(work.path(), store.clone());
        let summary = orchestrator
            .run(&request(
                vec![
                    SceneRef::new("wide.jpg", "one.wav"),
                    SceneRef::new("tall.jpg", "two.wav"),
                ],
                "story.mp4",
            ))
            .await
            .unwrap();

        assert_eq!(summary.format, CanonicalFormat::Horizontal);
        assert_eq!(summary.scene_count, 2);
        assert!(summary.warnings.is_empty());
        assert!((summary.duration_secs - 7.5).abs() < 0.1);

        let duration = rendered_duration(&store, "story.mp4", fixtures.path()).await;
        assert!((duration - 7.5).abs() < 0.2, "duration was {duration}");
        assert_eq!(workspace_count(work.path()), 0);
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_music_loops_under_longer_narration() {
        let fixtures = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.insert("frame.jpg", fixture_image(fixtures.path(), "frame.jpg", "1080x1920").await);
        store.insert("voice.wav", fixture_tone(fixtures.path(), "voice.wav", 10.0).await);
        store.insert("music.wav", fixture_tone(fixtures.path(), "music.wav", 2.0).await);

        let orchestrator = orchestrator(work.path(), store.clone());
        let mut req = request(vec![SceneRef::new("frame.jpg", "voice.wav")], "music.mp4");
        req.music = Some("music.wav".to_string());
        req.mix_duration = Some(MixDuration::First);
        orchestrator.run(&req).await.unwrap();

        let duration = rendered_duration(&store, "music.mp4", fixtures.path()).await;
        assert!((duration - 10.0).abs() < 0.2, "duration was {duration}");
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_output_named_like_intermediates_renders() {
        let fixtures = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.insert("frame.jpg", fixture_image(fixtures.path(), "frame.jpg", "1080x1920").await);
        store.insert("voice.wav", fixture_tone(fixtures.path(), "voice.wav", 3.0).await);
        store.insert("music.wav", fixture_tone(fixtures.path(), "music.wav", 1.0).await);
        let orchestrator = orchestrator(work.path(), store.clone());

        for (name, music) in [("clip_000.mp4", None), ("concat.mp4", Some("music.wav"))] {
            let mut req = request(vec![SceneRef::new("frame.jpg", "voice.wav")], name);
            req.music = music.map(str::to_string);
            orchestrator.run(&req).await.unwrap();

            let duration = rendered_duration(&store, name, fixtures.path()).await;
            assert!((duration - 3.0).abs() < 0.2, "{name} duration was {duration}");
        }
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_failed_artifact_upload_cleans_up() {
        let fixtures = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new().failing_uploads());
        store.insert("frame.jpg", fixture_image(fixtures.path(), "frame.jpg", "1080x1920").await);
        store.insert("voice.wav", fixture_tone(fixtures.path(), "voice.wav", 1.0).await);
        let orchestrator = orchestrator(work.path(), store.clone());

        let err = orchestrator
            .run(&request(vec![SceneRef::new("frame.jpg", "voice.wav")], "lost.mp4"))
            .await
            .unwrap_err();

        assert!(matches!(err, WorkerError::UploadFailed(_)));
        assert!(store.get("lost.mp4").is_none());
        let record: StatusRecord =
            serde_json::from_slice(&store.get("lost.mp4.json").unwrap()).unwrap();
        assert_eq!(record.status, JobState::Failed);
        assert_eq!(workspace_count(work.path()), 0);
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg built with libass"]
    async fn test_subtitles_burned_in() {
        let fixtures = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.insert("frame.jpg", fixture_image(fixtures.path(), "frame.jpg", "1080x1080").await);
        store.insert("voice.wav", fixture_tone(fixtures.path(), "voice.wav", 2.0).await);
        store.insert(
            "captions.srt",
            "1\r\n00:00:00,000 --> 00:00:01,500\r\nA caption long enough that it has to wrap onto a second line for sure\r\n",
        );

        let orchestrator = orchestrator(work.path(), store.clone());
        let mut req = request(vec![SceneRef::new("frame.jpg", "voice.wav")], "subs.mp4");
        req.subtitle = Some("captions.srt".to_string());
        let summary = orchestrator.run(&req).await.unwrap();

        assert_eq!(summary.format, CanonicalFormat::Square);
        let record: StatusRecord =
            serde_json::from_slice(&store.get("subs.mp4.json").unwrap()).unwrap();
        assert!(record.is_completed());
    }

    #[tokio::test]
    async fn test_unprobeable_narration_fails_job() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.insert("a.jpg", b"not an image".to_vec());
        store.insert("v.mp3", b"not audio".to_vec());
        let orchestrator = orchestrator(dir.path(), store.clone());

        let err = orchestrator
            .run(&request(vec![SceneRef::new("a.jpg", "v.mp3")], "abort.mp4"))
            .await
            .unwrap_err();

        assert!(matches!(err, WorkerError::Media(MediaError::ProbeFailed { .. })));
        let record: StatusRecord =
            serde_json::from_slice(&store.get("abort.mp4.json").unwrap()).unwrap();
        assert_eq!(record.status, JobState::Failed);
    }
}
