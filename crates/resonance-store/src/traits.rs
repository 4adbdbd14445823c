//! The Job Store boundary (spec §4.1): an async trait over atomic
//! claim/complete/fail transitions, applied to submissions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use resonance_core::model::{
    AlertSeverity, FeedbackEvent, FeedbackRating, PipelineJob, PipelineJobKind, PipelineJobStatus,
    Progress, QueryEvent, SourceKind, Stage, Submission, SystemAlert,
};
use resonance_core::Result;

/// Artifact references written by a worker on `complete`.
#[derive(Debug, Clone, Default)]
pub struct ArtifactRefs {
    pub audio_path: Option<String>,
    pub transcript_path: Option<String>,
    pub chunks_path: Option<String>,
    pub indexed_chunk_count: Option<i64>,
}

/// Aggregate counts used by `/status` and the health sensor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreStats {
    pub by_stage: Vec<(Stage, i64)>,
    pub total_submissions: i64,
    pub pending_count: i64,
    pub failed_count: i64,
    pub lease_expirations_last_hour: i64,
    pub feedback_count: i64,
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Assigns an id, stage=queued, status=pending. Returns
    /// `ResonanceError::DuplicateSource` if an identical (user, source) pair
    /// is in a non-terminal stage within `dedup_window`.
    /// Returns `ResonanceError::Backpressure` if the current pending count
    /// is already at or above `backpressure_high_water_mark` (spec §4.5).
    async fn insert_submission(
        &self,
        source_kind: SourceKind,
        source: &str,
        user_id: &str,
        language_hint: Option<&str>,
        dedup_window: chrono::Duration,
        backpressure_high_water_mark: i64,
    ) -> Result<i64>;

    /// Atomically selects one submission whose stage is `stage`'s
    /// prerequisite-done state (or `queued` for the first stage) and has no
    /// active claim; marks it running with `claim_owner`/`claim_deadline`.
    async fn claim_submission(
        &self,
        worker_id: &str,
        stage: Stage,
        lease: chrono::Duration,
    ) -> Result<Option<Submission>>;

    /// Advances `stage` and clears the claim. Fails if the caller no longer
    /// holds the active claim.
    async fn complete(&self, submission_id: i64, next_stage: Stage, artifacts: ArtifactRefs) -> Result<()>;

    /// Returns to the prerequisite's done status with incremented attempts
    /// and a backoff `scheduled_at` if `retriable` and under the attempt
    /// cap; otherwise transitions to `failed`.
    async fn fail(&self, submission_id: i64, error: &str, retriable: bool, max_attempts: i32, backoff: chrono::Duration) -> Result<()>;

    async fn get_submission(&self, submission_id: i64) -> Result<Submission>;

    async fn get_progress(&self, submission_id: i64) -> Result<Progress>;

    async fn list_pending(&self, stage: Stage, limit: i64) -> Result<Vec<Submission>>;

    /// Transitions submissions whose `claim_deadline` has passed back to
    /// their prerequisite done status. Returns the count reclaimed.
    async fn sweep_expired_claims(&self) -> Result<u64>;

    /// Sets the cancel flag. A claimed submission runs its current stage to
    /// completion; `sweep_cancelled_submissions` picks it up afterwards.
    async fn request_cancel(&self, submission_id: i64) -> Result<()>;

    /// Transitions to the terminal `cancelled` stage.
    async fn mark_cancelled(&self, submission_id: i64) -> Result<()>;

    /// Transitions every submission with `cancel_requested` set that is not
    /// currently claimed and not already terminal to `cancelled` (spec §4.5
    /// Cancellation, §8 "cancelled between stages"). Returns the count
    /// transitioned.
    async fn sweep_cancelled_submissions(&self) -> Result<u64>;

    /// Write an intra-stage progress counter without requiring a full
    /// `complete` transition (spec §4.1 get-progress note).
    async fn set_indexed_chunk_count(&self, submission_id: i64, count: i64) -> Result<()>;

    async fn stats(&self) -> Result<StoreStats>;

    async fn record_query_event(&self, event: &QueryEvent) -> Result<i64>;

    async fn record_feedback_event(&self, query_event_id: i64, rating: FeedbackRating, comment: Option<&str>) -> Result<i64>;

    async fn feedback_count(&self) -> Result<i64>;

    async fn enqueue_pipeline_job(&self, kind: PipelineJobKind, priority: i32, scheduled_at: DateTime<Utc>) -> Result<i64>;

    /// True if a pending/running job of this exact kind already exists —
    /// used by sensors to stay idempotent (spec §4.4).
    async fn pipeline_job_exists(&self, kind: &PipelineJobKind) -> Result<bool>;

    async fn claim_pipeline_job(&self, worker_id: &str) -> Result<Option<PipelineJob>>;

    async fn complete_pipeline_job(&self, job_id: i64, status: PipelineJobStatus, error: Option<&str>) -> Result<()>;

    async fn record_alert(&self, severity: AlertSeverity, kind: &str, message: &str) -> Result<i64>;

    async fn undispatched_alerts(&self, min_severity: AlertSeverity) -> Result<Vec<SystemAlert>>;

    async fn mark_alert_dispatched(&self, alert_id: i64) -> Result<()>;

    async fn set_user_verbose(&self, user_id: &str, verbose: bool) -> Result<()>;

    async fn is_user_verbose(&self, user_id: &str) -> Result<bool>;

    /// Ids of the oldest non-archived `indexed` submissions, oldest first —
    /// candidates for the cleanup job to delete artifacts for (spec §3's
    /// Submission lifecycle: "never destroyed ... but may be marked
    /// archived").
    async fn list_archivable_submissions(&self, limit: i64) -> Result<Vec<i64>>;

    /// Marks a submission archived. The submission row itself is retained
    /// for audit; only its artifacts are removed, by the caller.
    async fn mark_archived(&self, submission_id: i64) -> Result<()>;
}
