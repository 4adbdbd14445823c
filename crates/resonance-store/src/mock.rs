//! In-memory `JobStore` fixture. Exposed to other crates behind the
//! `test-util` feature so the Sensors, Scheduler and Retrieval crates can
//! test against the same contract the SQLite backend implements.

use crate::traits::{ArtifactRefs, JobStore, StoreStats};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use resonance_core::error::{Result, ResonanceError};
use resonance_core::model::{
    AlertSeverity, FeedbackRating, PipelineJob, PipelineJobKind, PipelineJobStatus, Progress,
    QueryEvent, SourceKind, Stage, Status, Submission, SystemAlert,
};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct MockJobStore {
    inner: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    submissions: Vec<Submission>,
    next_id: i64,
    query_events: Vec<QueryEvent>,
    next_query_event_id: i64,
    feedback_count: i64,
    pipeline_jobs: Vec<PipelineJob>,
    next_job_id: i64,
    alerts: Vec<SystemAlert>,
    next_alert_id: i64,
    user_verbose: HashMap<String, bool>,
    lease_expirations: Vec<DateTime<Utc>>,
}

impl MockJobStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MockState {
                next_id: 1,
                next_query_event_id: 1,
                next_job_id: 1,
                next_alert_id: 1,
                ..Default::default()
            }),
        }
    }
}

#[async_trait]
impl JobStore for MockJobStore {
    async fn insert_submission(
        &self,
        source_kind: SourceKind,
        source: &str,
        user_id: &str,
        language_hint: Option<&str>,
        dedup_window: chrono::Duration,
        backpressure_high_water_mark: i64,
    ) -> Result<i64> {
        let mut state = self.inner.lock().unwrap();
        let pending_count = state.submissions.iter().filter(|s| s.status == Status::Pending).count() as i64;
        if pending_count >= backpressure_high_water_mark {
            return Err(ResonanceError::Backpressure);
        }
        let cutoff = Utc::now() - dedup_window;
        if state
            .submissions
            .iter()
            .any(|s| s.user_id == user_id && s.source == source && s.created_at >= cutoff && !s.stage.is_terminal())
        {
            return Err(ResonanceError::DuplicateSource);
        }
        let id = state.next_id;
        state.next_id += 1;
        state.submissions.push(Submission {
            id,
            source_kind,
            source: source.to_string(),
            user_id: user_id.to_string(),
            language_hint: language_hint.map(String::from),
            created_at: Utc::now(),
            stage: Stage::Queued,
            status: Status::Pending,
            error: None,
            audio_path: None,
            transcript_path: None,
            chunks_path: None,
            indexed_chunk_count: 0,
            attempts: 0,
            priority: 0,
            claim_owner: None,
            claim_deadline: None,
            next_attempt_at: None,
            cancel_requested: false,
            archived: false,
        });
        Ok(id)
    }

    async fn claim_submission(&self, worker_id: &str, stage: Stage, lease: chrono::Duration) -> Result<Option<Submission>> {
        let prereq = stage.prerequisite().ok_or_else(|| ResonanceError::InputInvalid("no prerequisite".into()))?;
        let required_status = if prereq == Stage::Queued { Status::Pending } else { Status::Done };
        let mut state = self.inner.lock().unwrap();
        let now = Utc::now();
        if let Some(s) = state
            .submissions
            .iter_mut()
            .find(|s| s.stage == prereq && s.status == required_status && !s.cancel_requested && s.next_attempt_at.map(|t| t <= now).unwrap_or(true))
        {
            s.stage = stage;
            s.status = Status::Running;
            s.claim_owner = Some(worker_id.to_string());
            s.claim_deadline = Some(now + lease);
            return Ok(Some(s.clone()));
        }
        Ok(None)
    }

    async fn complete(&self, submission_id: i64, next_stage: Stage, artifacts: ArtifactRefs) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        let s = state
            .submissions
            .iter_mut()
            .find(|s| s.id == submission_id && s.claim_owner.is_some())
            .ok_or_else(|| ResonanceError::NotFound(format!("submission {submission_id}")))?;
        s.stage = next_stage;
        s.status = Status::Done;
        s.claim_owner = None;
        s.claim_deadline = None;
        s.next_attempt_at = None;
        s.attempts = 0;
        if let Some(p) = artifacts.audio_path {
            s.audio_path = Some(p);
        }
        if let Some(p) = artifacts.transcript_path {
            s.transcript_path = Some(p);
        }
        if let Some(p) = artifacts.chunks_path {
            s.chunks_path = Some(p);
        }
        if let Some(c) = artifacts.indexed_chunk_count {
            s.indexed_chunk_count = c;
        }
        Ok(())
    }

    async fn fail(&self, submission_id: i64, error: &str, retriable: bool, max_attempts: i32, backoff: chrono::Duration) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        let s = state
            .submissions
            .iter_mut()
            .find(|s| s.id == submission_id)
            .ok_or_else(|| ResonanceError::NotFound(format!("submission {submission_id}")))?;
        if !retriable || s.attempts >= max_attempts {
            s.stage = Stage::Failed;
            s.status = Status::Error;
            s.error = Some(error.to_string());
            s.claim_owner = None;
            s.claim_deadline = None;
            return Ok(());
        }
        let revert_stage = s.stage.prerequisite().ok_or_else(|| ResonanceError::Other(anyhow::anyhow!("cannot retry")))?;
        s.stage = revert_stage;
        s.status = if revert_stage == Stage::Queued { Status::Pending } else { Status::Done };
        s.error = Some(error.to_string());
        s.attempts += 1;
        s.claim_owner = None;
        s.claim_deadline = None;
        s.next_attempt_at = Some(Utc::now() + backoff);
        Ok(())
    }

    async fn get_submission(&self, submission_id: i64) -> Result<Submission> {
        let state = self.inner.lock().unwrap();
        state
            .submissions
            .iter()
            .find(|s| s.id == submission_id)
            .cloned()
            .ok_or_else(|| ResonanceError::NotFound(format!("submission {submission_id}")))
    }

    async fn get_progress(&self, submission_id: i64) -> Result<Progress> {
        let submission = self.get_submission(submission_id).await?;
        let percent = match submission.stage.ordinal() {
            Some(ord) => (ord as f32 / (Stage::ORDER.len() - 1) as f32) * 100.0,
            None => 100.0,
        };
        Ok(Progress { stage: submission.stage, status: submission.status, percent })
    }

    async fn list_pending(&self, stage: Stage, limit: i64) -> Result<Vec<Submission>> {
        let state = self.inner.lock().unwrap();
        Ok(state
            .submissions
            .iter()
            .filter(|s| s.stage == stage && s.status == Status::Pending)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn sweep_expired_claims(&self) -> Result<u64> {
        let mut state = self.inner.lock().unwrap();
        let now = Utc::now();
        let mut n = 0u64;
        for s in state.submissions.iter_mut() {
            if s.status == Status::Running {
                if let Some(deadline) = s.claim_deadline {
                    if deadline < now {
                        if let Some(prereq) = s.stage.prerequisite() {
                            s.stage = prereq;
                            s.status = if prereq == Stage::Queued { Status::Pending } else { Status::Done };
                            s.claim_owner = None;
                            s.claim_deadline = None;
                            n += 1;
                        }
                    }
                }
            }
        }
        for _ in 0..n {
            state.lease_expirations.push(now);
        }
        Ok(n)
    }

    async fn request_cancel(&self, submission_id: i64) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        if let Some(s) = state.submissions.iter_mut().find(|s| s.id == submission_id) {
            s.cancel_requested = true;
        }
        Ok(())
    }

    async fn mark_cancelled(&self, submission_id: i64) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        if let Some(s) = state.submissions.iter_mut().find(|s| s.id == submission_id) {
            if !s.stage.is_terminal() {
                s.stage = Stage::Cancelled;
                s.status = Status::Error;
                s.claim_owner = None;
                s.claim_deadline = None;
            }
        }
        Ok(())
    }

    async fn sweep_cancelled_submissions(&self) -> Result<u64> {
        let mut state = self.inner.lock().unwrap();
        let mut n = 0u64;
        for s in state.submissions.iter_mut() {
            if s.cancel_requested && s.status != Status::Running && !s.stage.is_terminal() {
                s.stage = Stage::Cancelled;
                s.status = Status::Error;
                s.claim_owner = None;
                s.claim_deadline = None;
                n += 1;
            }
        }
        Ok(n)
    }

    async fn set_indexed_chunk_count(&self, submission_id: i64, count: i64) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        if let Some(s) = state.submissions.iter_mut().find(|s| s.id == submission_id) {
            s.indexed_chunk_count = count;
        }
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let state = self.inner.lock().unwrap();
        let mut by_stage: Vec<(Stage, i64)> = Vec::new();
        for s in &state.submissions {
            if let Some(entry) = by_stage.iter_mut().find(|(st, _)| *st == s.stage) {
                entry.1 += 1;
            } else {
                by_stage.push((s.stage, 1));
            }
        }
        let cutoff = Utc::now() - chrono::Duration::hours(1);
        let lease_expirations_last_hour = state.lease_expirations.iter().filter(|t| **t >= cutoff).count() as i64;
        Ok(StoreStats {
            total_submissions: state.submissions.len() as i64,
            pending_count: state.submissions.iter().filter(|s| s.status == Status::Pending).count() as i64,
            failed_count: state.submissions.iter().filter(|s| s.stage == Stage::Failed).count() as i64,
            lease_expirations_last_hour,
            feedback_count: state.feedback_count,
            by_stage,
        })
    }

    async fn record_query_event(&self, event: &QueryEvent) -> Result<i64> {
        let mut state = self.inner.lock().unwrap();
        let id = state.next_query_event_id;
        state.next_query_event_id += 1;
        let mut stored = event.clone();
        stored.id = id;
        state.query_events.push(stored);
        Ok(id)
    }

    async fn record_feedback_event(&self, _query_event_id: i64, _rating: FeedbackRating, _comment: Option<&str>) -> Result<i64> {
        let mut state = self.inner.lock().unwrap();
        state.feedback_count += 1;
        Ok(state.feedback_count)
    }

    async fn feedback_count(&self) -> Result<i64> {
        Ok(self.inner.lock().unwrap().feedback_count)
    }

    async fn enqueue_pipeline_job(&self, kind: PipelineJobKind, priority: i32, scheduled_at: DateTime<Utc>) -> Result<i64> {
        let mut state = self.inner.lock().unwrap();
        let id = state.next_job_id;
        state.next_job_id += 1;
        state.pipeline_jobs.push(PipelineJob {
            id,
            kind,
            priority,
            scheduled_at,
            status: PipelineJobStatus::Pending,
            attempt_count: 0,
            last_error: None,
        });
        Ok(id)
    }

    async fn pipeline_job_exists(&self, kind: &PipelineJobKind) -> Result<bool> {
        let state = self.inner.lock().unwrap();
        Ok(state
            .pipeline_jobs
            .iter()
            .any(|j| j.kind.same_family(kind) && matches!(j.status, PipelineJobStatus::Pending | PipelineJobStatus::Running)))
    }

    async fn claim_pipeline_job(&self, _worker_id: &str) -> Result<Option<PipelineJob>> {
        let mut state = self.inner.lock().unwrap();
        let now = Utc::now();
        if let Some(j) = state
            .pipeline_jobs
            .iter_mut()
            .filter(|j| j.status == PipelineJobStatus::Pending && j.scheduled_at <= now)
            .min_by_key(|j| (j.priority, j.scheduled_at))
        {
            j.status = PipelineJobStatus::Running;
            return Ok(Some(j.clone()));
        }
        Ok(None)
    }

    async fn complete_pipeline_job(&self, job_id: i64, status: PipelineJobStatus, error: Option<&str>) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        if let Some(j) = state.pipeline_jobs.iter_mut().find(|j| j.id == job_id) {
            j.status = status;
            j.last_error = error.map(String::from);
            if status == PipelineJobStatus::Error {
                j.attempt_count += 1;
            }
        }
        Ok(())
    }

    async fn record_alert(&self, severity: AlertSeverity, kind: &str, message: &str) -> Result<i64> {
        let mut state = self.inner.lock().unwrap();
        let id = state.next_alert_id;
        state.next_alert_id += 1;
        state.alerts.push(SystemAlert {
            id,
            severity,
            kind: kind.to_string(),
            message: message.to_string(),
            created_at: Utc::now(),
            acknowledged_at: None,
            dispatched_at: None,
        });
        Ok(id)
    }

    async fn undispatched_alerts(&self, min_severity: AlertSeverity) -> Result<Vec<SystemAlert>> {
        let state = self.inner.lock().unwrap();
        Ok(state
            .alerts
            .iter()
            .filter(|a| a.dispatched_at.is_none() && a.severity >= min_severity)
            .cloned()
            .collect())
    }

    async fn mark_alert_dispatched(&self, alert_id: i64) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        if let Some(a) = state.alerts.iter_mut().find(|a| a.id == alert_id) {
            a.dispatched_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn set_user_verbose(&self, user_id: &str, verbose: bool) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        state.user_verbose.insert(user_id.to_string(), verbose);
        Ok(())
    }

    async fn is_user_verbose(&self, user_id: &str) -> Result<bool> {
        let state = self.inner.lock().unwrap();
        Ok(*state.user_verbose.get(user_id).unwrap_or(&false))
    }

    async fn list_archivable_submissions(&self, limit: i64) -> Result<Vec<i64>> {
        let state = self.inner.lock().unwrap();
        let mut candidates: Vec<&Submission> = state.submissions.iter().filter(|s| s.stage == Stage::Indexed && !s.archived).collect();
        candidates.sort_by_key(|s| s.created_at);
        Ok(candidates.into_iter().take(limit as usize).map(|s| s.id).collect())
    }

    async fn mark_archived(&self, submission_id: i64) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        if let Some(s) = state.submissions.iter_mut().find(|s| s.id == submission_id) {
            s.archived = true;
        }
        Ok(())
    }
}
