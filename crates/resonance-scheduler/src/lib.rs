//! The Scheduler (spec §4.5): one control loop, bounded per-stage worker
//! pools, FIFO-advisory dispatch, cooperative cancellation.

mod clocks;

pub use clocks::SensorClocks;

use chrono::Duration as ChronoDuration;
use resonance_artifacts::ArtifactStore;
use resonance_core::config::ResonanceConfig;
use resonance_core::model::{PipelineJobKind, PipelineJobStatus, Stage, Submission};
use resonance_core::ports::{AlertSink, AsrEngine, Downloader, EmbeddingModel, KeywordIndex, VectorStore};
use resonance_sensors::{AlertDispatchSensor, AudioFileSensor, CleanupSensor, HealthSensor, UrlSensor};
use resonance_store::traits::{ArtifactRefs, JobStore};
use resonance_workers::{ChunkerWorker, DownloaderWorker, EmbedderWorker, TranscriberWorker};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// The four in-progress stages the Scheduler dispatches workers for, in
/// pipeline order.
const DISPATCHABLE_STAGES: [Stage; 4] = [Stage::Downloading, Stage::Transcribing, Stage::Chunking, Stage::Embedding];

struct StagePermits {
    download: Arc<Semaphore>,
    transcribe: Arc<Semaphore>,
    chunk: Arc<Semaphore>,
    embed: Arc<Semaphore>,
    global: Arc<Semaphore>,
}

impl StagePermits {
    fn for_stage(&self, stage: Stage) -> Option<&Arc<Semaphore>> {
        match stage {
            Stage::Downloading => Some(&self.download),
            Stage::Transcribing => Some(&self.transcribe),
            Stage::Chunking => Some(&self.chunk),
            Stage::Embedding => Some(&self.embed),
            _ => None,
        }
    }

    fn status(&self) -> WorkerPoolStatus {
        WorkerPoolStatus {
            download_available: self.download.available_permits(),
            transcribe_available: self.transcribe.available_permits(),
            chunk_available: self.chunk.available_permits(),
            embed_available: self.embed.available_permits(),
            global_available: self.global.available_permits(),
        }
    }
}

/// Snapshot of free permits per stage pool, for `GET /status` and the
/// `dashboard` CLI subcommand. A pool at zero available permits is saturated.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct WorkerPoolStatus {
    pub download_available: usize,
    pub transcribe_available: usize,
    pub chunk_available: usize,
    pub embed_available: usize,
    pub global_available: usize,
}

/// Cheaply cloned handle onto the same semaphores `Scheduler::run` dispatches
/// against. `run(&mut self)` is spawned once and owns the `Scheduler` for the
/// program's lifetime, so a caller that also wants to report pool status
/// (the HTTP control plane) takes this handle before spawning rather than
/// sharing the `Scheduler` itself.
#[derive(Clone)]
pub struct PoolStatusHandle(Arc<StagePermits>);

impl PoolStatusHandle {
    pub fn status(&self) -> WorkerPoolStatus {
        self.0.status()
    }

    /// Builds a handle backed by its own semaphores, independent of a full
    /// `Scheduler` — for callers (like `resonance-server`'s tests) that only
    /// need something to report pool status against.
    #[cfg(feature = "test-util")]
    pub fn for_test(download: usize, transcribe: usize, chunk: usize, embed: usize, global: usize) -> Self {
        Self(Arc::new(StagePermits {
            download: Arc::new(Semaphore::new(download)),
            transcribe: Arc::new(Semaphore::new(transcribe)),
            chunk: Arc::new(Semaphore::new(chunk)),
            embed: Arc::new(Semaphore::new(embed)),
            global: Arc::new(Semaphore::new(global)),
        }))
    }
}

pub struct Scheduler {
    worker_id: String,
    store: Arc<dyn JobStore>,
    artifacts: Arc<ArtifactStore>,
    downloader: Arc<DownloaderWorker<dyn Downloader>>,
    transcriber: Arc<TranscriberWorker<dyn AsrEngine>>,
    chunker: Arc<ChunkerWorker>,
    embedder: Arc<EmbedderWorker<dyn EmbeddingModel, dyn VectorStore, dyn KeywordIndex>>,
    url_sensor: UrlSensor,
    audio_file_sensor: AudioFileSensor,
    health_sensor: HealthSensor,
    cleanup_sensor: CleanupSensor,
    alert_dispatch_sensor: Arc<AlertDispatchSensor<dyn AlertSink>>,
    config: Arc<ResonanceConfig>,
    permits: Arc<StagePermits>,
    clocks: SensorClocks,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        worker_id: impl Into<String>,
        store: Arc<dyn JobStore>,
        artifacts: Arc<ArtifactStore>,
        downloader: Arc<DownloaderWorker<dyn Downloader>>,
        transcriber: Arc<TranscriberWorker<dyn AsrEngine>>,
        chunker: Arc<ChunkerWorker>,
        embedder: Arc<EmbedderWorker<dyn EmbeddingModel, dyn VectorStore, dyn KeywordIndex>>,
        alert_sink: Arc<dyn AlertSink>,
        ingress_dir: impl Into<std::path::PathBuf>,
        config: Arc<ResonanceConfig>,
    ) -> Self {
        let c = &config.concurrency;
        let permits = Arc::new(StagePermits {
            download: Arc::new(Semaphore::new(c.download)),
            transcribe: Arc::new(Semaphore::new(c.transcribe)),
            chunk: Arc::new(Semaphore::new(c.chunk)),
            embed: Arc::new(Semaphore::new(c.embed)),
            global: Arc::new(Semaphore::new(c.global_ceiling)),
        });

        Self {
            worker_id: worker_id.into(),
            url_sensor: UrlSensor::new(store.clone()),
            audio_file_sensor: AudioFileSensor::new(store.clone(), ingress_dir),
            health_sensor: HealthSensor::new(store.clone(), config.alerts.clone()),
            cleanup_sensor: CleanupSensor::new(store.clone(), config.alerts.storage_cap_bytes),
            alert_dispatch_sensor: Arc::new(AlertDispatchSensor::new(store.clone(), alert_sink)),
            store,
            artifacts,
            downloader,
            transcriber,
            chunker,
            embedder,
            permits,
            clocks: SensorClocks::new(),
            config,
        }
    }

    /// Current free-permit counts per stage pool, for status reporting.
    pub fn pool_status(&self) -> WorkerPoolStatus {
        self.permits.status()
    }

    /// A cloneable handle onto this scheduler's semaphores, to be taken
    /// before `run()` is spawned so another task can keep reporting pool
    /// status after the `Scheduler` itself is moved.
    pub fn pool_status_handle(&self) -> PoolStatusHandle {
        PoolStatusHandle(self.permits.clone())
    }

    /// Runs forever, ticking at `config.tick_interval_ms`.
    pub async fn run(&mut self) {
        let mut interval = tokio::time::interval(std::time::Duration::from_millis(self.config.tick_interval_ms));
        loop {
            interval.tick().await;
            self.tick().await;
        }
    }

    /// One control-loop iteration (spec §4.5's five numbered steps).
    pub async fn tick(&mut self) {
        self.run_due_sensors().await;

        for stage in DISPATCHABLE_STAGES {
            self.dispatch_stage(stage).await;
        }

        match drain_pipeline_jobs(self.store.as_ref(), &self.artifacts, self.config.alerts.storage_cap_bytes, &self.worker_id, 10).await {
            Ok(n) if n > 0 => tracing::debug!(drained = n, "drained pipeline jobs"),
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "drain_pipeline_jobs failed"),
        }

        match self.store.sweep_expired_claims().await {
            Ok(n) if n > 0 => tracing::info!(reclaimed = n, "swept expired claims"),
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "sweep_expired_claims failed"),
        }

        match self.store.sweep_cancelled_submissions().await {
            Ok(n) if n > 0 => tracing::info!(cancelled = n, "swept cancelled submissions"),
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "sweep_cancelled_submissions failed"),
        }
    }

    async fn run_due_sensors(&mut self) {
        let s = &self.config.sensors;

        if self.clocks.url.due(s.url_sensor_secs) {
            match self.url_sensor.poll(100).await {
                Ok(n) => tracing::debug!(enqueued = n, "url-sensor"),
                Err(e) => tracing::error!(error = %e, "url-sensor failed"),
            }
        }

        if self.clocks.audio_file.due(s.audio_file_sensor_secs) {
            match self
                .audio_file_sensor
                .poll(ChronoDuration::hours(self.config.dedup_window_hours), self.config.backpressure_high_water_mark)
                .await
            {
                Ok(n) => tracing::debug!(registered = n, "audio-file-sensor"),
                Err(e) => tracing::error!(error = %e, "audio-file-sensor failed"),
            }
        }

        if self.clocks.health.due(s.health_sensor_secs) {
            match self.health_sensor.poll().await {
                Ok(alerts) if !alerts.is_empty() => tracing::warn!(?alerts, "health-sensor raised alerts"),
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "health-sensor failed"),
            }
        }

        if self.clocks.cleanup.due(s.cleanup_sensor_secs) {
            let bytes = self.artifacts.total_size().unwrap_or(0);
            match self.cleanup_sensor.poll(bytes).await {
                Ok(Some(job_id)) => tracing::info!(job_id, "cleanup-sensor enqueued cleanup job"),
                Ok(None) => {}
                Err(e) => tracing::error!(error = %e, "cleanup-sensor failed"),
            }
        }

        if self.clocks.alert_dispatch.due(s.alert_dispatch_sensor_secs) {
            match self.alert_dispatch_sensor.poll().await {
                Ok(n) if n > 0 => tracing::info!(dispatched = n, "alert-dispatch-sensor"),
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "alert-dispatch-sensor failed"),
            }
        }
    }

    async fn dispatch_stage(&self, stage: Stage) {
        let Some(stage_sem) = self.permits.for_stage(stage) else { return };

        let Ok(stage_permit) = stage_sem.clone().try_acquire_owned() else { return };
        let Ok(global_permit) = self.permits.global.clone().try_acquire_owned() else { return };

        let lease = ChronoDuration::seconds(self.config.claim_lease_secs as i64);
        let claimed = match self.store.claim_submission(&self.worker_id, stage, lease).await {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, ?stage, "claim_submission failed");
                return;
            }
        };

        let Some(submission) = claimed else {
            // No work for this stage; permits drop here, freeing capacity.
            return;
        };

        let store = self.store.clone();
        let downloader = self.downloader.clone();
        let transcriber = self.transcriber.clone();
        let chunker = self.chunker.clone();
        let embedder = self.embedder.clone();
        let retry = self.config.retry.clone();

        tokio::spawn(async move {
            let _stage_permit = stage_permit;
            let _global_permit = global_permit;
            run_claimed_submission(store, downloader, transcriber, chunker, embedder, retry, stage, submission).await;
        });
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_claimed_submission(
    store: Arc<dyn JobStore>,
    downloader: Arc<DownloaderWorker<dyn Downloader>>,
    transcriber: Arc<TranscriberWorker<dyn AsrEngine>>,
    chunker: Arc<ChunkerWorker>,
    embedder: Arc<EmbedderWorker<dyn EmbeddingModel, dyn VectorStore, dyn KeywordIndex>>,
    retry: resonance_core::config::RetryConfig,
    stage: Stage,
    submission: Submission,
) {
    let result: resonance_core::Result<ArtifactRefs> = match stage {
        Stage::Downloading => downloader.run(&submission).await,
        Stage::Transcribing => transcriber.run(&submission).await,
        Stage::Chunking => chunker.run(&submission).await,
        Stage::Embedding => embedder.run(&submission).await,
        _ => return,
    };

    // A submission cancelled while this stage was running still commits its
    // completed work; `sweep_cancelled_submissions` transitions it to
    // `cancelled` on the Scheduler's next tick rather than here, since a
    // claimed submission's `cancel_requested` was read at claim time and is
    // always false (claims exclude cancel-requested submissions).
    match result {
        Ok(artifacts) => {
            let Some(next_stage) = stage.next_done() else { return };
            if let Err(e) = store.complete(submission.id, next_stage, artifacts).await {
                tracing::error!(error = %e, submission_id = submission.id, ?stage, "complete failed");
            }
        }
        Err(e) => {
            let retriable = e.retriable();
            let delay = retry.as_backoff_policy().delay_for(submission.attempts);
            let backoff = ChronoDuration::from_std(delay).unwrap_or(ChronoDuration::seconds(retry.max_backoff_secs as i64));
            if let Err(store_err) = store.fail(submission.id, &e.to_string(), retriable, retry.max_attempts, backoff).await {
                tracing::error!(error = %store_err, submission_id = submission.id, ?stage, "fail() failed");
            }
        }
    }
}

/// Claims and executes queued Pipeline Jobs. `ProcessSubmission` jobs are
/// bookkeeping only (the submission's own stage transition already carries
/// the work); `Cleanup` jobs delete the oldest archivable submissions'
/// artifacts until total bytes drop back under `storage_cap_bytes`.
pub async fn drain_pipeline_jobs(store: &dyn JobStore, artifacts: &ArtifactStore, storage_cap_bytes: u64, worker_id: &str, limit: usize) -> resonance_core::Result<usize> {
    let mut drained = 0usize;
    for _ in 0..limit {
        match store.claim_pipeline_job(worker_id).await? {
            Some(job) => {
                let result = match &job.kind {
                    PipelineJobKind::Cleanup { .. } => run_cleanup_job(store, artifacts, storage_cap_bytes).await,
                    PipelineJobKind::ProcessSubmission { .. } | PipelineJobKind::HealthCheck { .. } | PipelineJobKind::AlertDispatch { .. } => Ok(()),
                };
                match result {
                    Ok(()) => store.complete_pipeline_job(job.id, PipelineJobStatus::Done, None).await?,
                    Err(e) => store.complete_pipeline_job(job.id, PipelineJobStatus::Error, Some(&e.to_string())).await?,
                }
                drained += 1;
            }
            None => break,
        }
    }
    Ok(drained)
}

/// Archives the oldest `indexed` submissions, deleting their on-disk
/// artifacts, until `artifacts.total_size()` is back under the cap or no
/// archivable submissions remain.
async fn run_cleanup_job(store: &dyn JobStore, artifacts: &ArtifactStore, storage_cap_bytes: u64) -> resonance_core::Result<()> {
    loop {
        if artifacts.total_size()? <= storage_cap_bytes {
            return Ok(());
        }
        let candidates = store.list_archivable_submissions(16).await?;
        if candidates.is_empty() {
            return Ok(());
        }
        for id in candidates {
            artifacts.delete(id)?;
            store.mark_archived(id).await?;
        }
    }
}
