//! SQLite-backed Job Store. WAL mode for concurrency, raw `sqlx::query` +
//! `Row::get` rather than the `query_as!` macros, so column access stays
//! explicit at every call site.

use crate::traits::{ArtifactRefs, JobStore, StoreStats};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use resonance_core::error::{Result as CoreResult, ResonanceError};
use resonance_core::model::{
    AlertSeverity, FeedbackRating, PipelineJob, PipelineJobKind, PipelineJobStatus,
    Progress, QueryEvent, SourceKind, Stage, Status, Submission, SystemAlert,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{migrate::MigrateDatabase, Row};
use std::str::FromStr;

pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    pub async fn open(path: &str) -> anyhow::Result<Self> {
        let db_url = if path.starts_with("sqlite://") {
            path.to_string()
        } else {
            format!("sqlite://{}", path)
        };

        if !sqlx::Sqlite::database_exists(&db_url).await.unwrap_or(false) {
            sqlx::Sqlite::create_database(&db_url).await?;
        }

        let options = SqliteConnectOptions::from_str(&db_url)?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn parse_dt(s: &str) -> CoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ResonanceError::Other(anyhow::anyhow!("bad timestamp {s}: {e}")))
}

fn row_to_submission(row: &sqlx::sqlite::SqliteRow) -> CoreResult<Submission> {
    let stage_str: String = row.try_get("stage").map_err(anyhow::Error::from)?;
    let status_str: String = row.try_get("status").map_err(anyhow::Error::from)?;
    let source_kind_str: String = row.try_get("source_kind").map_err(anyhow::Error::from)?;
    let created_at: String = row.try_get("created_at").map_err(anyhow::Error::from)?;
    let claim_deadline: Option<String> = row.try_get("claim_deadline").map_err(anyhow::Error::from)?;
    let next_attempt_at: Option<String> = row.try_get("next_attempt_at").map_err(anyhow::Error::from)?;

    Ok(Submission {
        id: row.try_get("id").map_err(anyhow::Error::from)?,
        source_kind: parse_source_kind(&source_kind_str)?,
        source: row.try_get("source").map_err(anyhow::Error::from)?,
        user_id: row.try_get("user_id").map_err(anyhow::Error::from)?,
        language_hint: row.try_get("language_hint").map_err(anyhow::Error::from)?,
        created_at: parse_dt(&created_at)?,
        stage: parse_stage(&stage_str)?,
        status: parse_status(&status_str)?,
        error: row.try_get("error").map_err(anyhow::Error::from)?,
        audio_path: row.try_get("audio_path").map_err(anyhow::Error::from)?,
        transcript_path: row.try_get("transcript_path").map_err(anyhow::Error::from)?,
        chunks_path: row.try_get("chunks_path").map_err(anyhow::Error::from)?,
        indexed_chunk_count: row.try_get("indexed_chunk_count").map_err(anyhow::Error::from)?,
        attempts: row.try_get("attempts").map_err(anyhow::Error::from)?,
        priority: row.try_get("priority").map_err(anyhow::Error::from)?,
        claim_owner: row.try_get("claim_owner").map_err(anyhow::Error::from)?,
        claim_deadline: claim_deadline.map(|s| parse_dt(&s)).transpose()?,
        next_attempt_at: next_attempt_at.map(|s| parse_dt(&s)).transpose()?,
        cancel_requested: row.try_get::<i64, _>("cancel_requested").map_err(anyhow::Error::from)? != 0,
        archived: row.try_get::<i64, _>("archived").map_err(anyhow::Error::from)? != 0,
    })
}

fn stage_str(stage: Stage) -> String {
    stage.to_string()
}

fn parse_stage(s: &str) -> CoreResult<Stage> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|_| ResonanceError::Other(anyhow::anyhow!("bad stage {s}")))
}

fn status_str(status: Status) -> String {
    status.to_string()
}

fn parse_status(s: &str) -> CoreResult<Status> {
    match s {
        "pending" => Ok(Status::Pending),
        "running" => Ok(Status::Running),
        "done" => Ok(Status::Done),
        "error" => Ok(Status::Error),
        other => Err(ResonanceError::Other(anyhow::anyhow!("bad status {other}"))),
    }
}

fn source_kind_str(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::RemoteUrl => "remote_url",
        SourceKind::LocalFile => "local_file",
    }
}

fn parse_source_kind(s: &str) -> CoreResult<SourceKind> {
    match s {
        "remote_url" => Ok(SourceKind::RemoteUrl),
        "local_file" => Ok(SourceKind::LocalFile),
        other => Err(ResonanceError::Other(anyhow::anyhow!("bad source_kind {other}"))),
    }
}

fn into_core<T>(r: Result<T, sqlx::Error>) -> CoreResult<T> {
    r.map_err(|e| ResonanceError::Other(anyhow::Error::from(e)))
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn insert_submission(
        &self,
        source_kind: SourceKind,
        source: &str,
        user_id: &str,
        language_hint: Option<&str>,
        dedup_window: chrono::Duration,
        backpressure_high_water_mark: i64,
    ) -> CoreResult<i64> {
        let now = Utc::now();
        let cutoff = now - dedup_window;

        let pending_count: i64 = into_core(
            sqlx::query_scalar("SELECT COUNT(*) FROM submissions WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await,
        )?;
        if pending_count >= backpressure_high_water_mark {
            return Err(ResonanceError::Backpressure);
        }

        let existing = into_core(
            sqlx::query(
                "SELECT id FROM submissions
                 WHERE user_id = ? AND source = ? AND created_at >= ?
                 AND stage NOT IN ('failed', 'cancelled', 'indexed')
                 LIMIT 1",
            )
            .bind(user_id)
            .bind(source)
            .bind(cutoff.to_rfc3339())
            .fetch_optional(&self.pool)
            .await,
        )?;

        if existing.is_some() {
            return Err(ResonanceError::DuplicateSource);
        }

        let row = into_core(
            sqlx::query(
                "INSERT INTO submissions
                 (source_kind, source, user_id, language_hint, created_at, stage, status,
                  indexed_chunk_count, attempts, priority, cancel_requested, archived)
                 VALUES (?, ?, ?, ?, ?, ?, ?, 0, 0, 0, 0, 0)
                 RETURNING id",
            )
            .bind(source_kind_str(source_kind))
            .bind(source)
            .bind(user_id)
            .bind(language_hint)
            .bind(now.to_rfc3339())
            .bind(stage_str(Stage::Queued))
            .bind(status_str(Status::Pending))
            .fetch_one(&self.pool)
            .await,
        )?;

        Ok(row.try_get("id").map_err(anyhow::Error::from)?)
    }

    async fn claim_submission(
        &self,
        worker_id: &str,
        stage: Stage,
        lease: chrono::Duration,
    ) -> CoreResult<Option<Submission>> {
        let prereq = stage
            .prerequisite()
            .ok_or_else(|| ResonanceError::InputInvalid(format!("{stage} has no claimable prerequisite")))?;
        let required_status = if prereq == Stage::Queued { Status::Pending } else { Status::Done };
        let now = Utc::now();
        let deadline = now + lease;

        let mut tx = into_core(self.pool.begin().await)?;

        let row = into_core(
            sqlx::query(
                "UPDATE submissions
                 SET stage = ?, status = 'running', claim_owner = ?, claim_deadline = ?
                 WHERE id = (
                     SELECT id FROM submissions
                     WHERE stage = ? AND status = ?
                     AND (next_attempt_at IS NULL OR next_attempt_at <= ?)
                     AND cancel_requested = 0
                     ORDER BY priority ASC, created_at ASC
                     LIMIT 1
                 )
                 RETURNING *",
            )
            .bind(stage_str(stage))
            .bind(worker_id)
            .bind(deadline.to_rfc3339())
            .bind(stage_str(prereq))
            .bind(status_str(required_status))
            .bind(now.to_rfc3339())
            .fetch_optional(&mut *tx)
            .await,
        )?;

        into_core(tx.commit().await)?;

        match row {
            Some(r) => Ok(Some(row_to_submission(&r)?)),
            None => Ok(None),
        }
    }

    async fn complete(&self, submission_id: i64, next_stage: Stage, artifacts: ArtifactRefs) -> CoreResult<()> {
        let result = into_core(
            sqlx::query(
                "UPDATE submissions
                 SET stage = ?, status = 'done', claim_owner = NULL, claim_deadline = NULL,
                     next_attempt_at = NULL, attempts = 0,
                     audio_path = COALESCE(?, audio_path),
                     transcript_path = COALESCE(?, transcript_path),
                     chunks_path = COALESCE(?, chunks_path),
                     indexed_chunk_count = COALESCE(?, indexed_chunk_count)
                 WHERE id = ? AND claim_owner IS NOT NULL",
            )
            .bind(stage_str(next_stage))
            .bind(artifacts.audio_path)
            .bind(artifacts.transcript_path)
            .bind(artifacts.chunks_path)
            .bind(artifacts.indexed_chunk_count)
            .bind(submission_id)
            .execute(&self.pool)
            .await,
        )?;

        if result.rows_affected() == 0 {
            return Err(ResonanceError::NotFound(format!(
                "submission {submission_id} has no active claim to complete"
            )));
        }
        Ok(())
    }

    async fn fail(
        &self,
        submission_id: i64,
        error: &str,
        retriable: bool,
        max_attempts: i32,
        backoff: chrono::Duration,
    ) -> CoreResult<()> {
        let submission = self.get_submission(submission_id).await?;

        if !retriable || submission.attempts >= max_attempts {
            into_core(
                sqlx::query(
                    "UPDATE submissions
                     SET stage = 'failed', status = 'error', error = ?,
                         claim_owner = NULL, claim_deadline = NULL, next_attempt_at = NULL
                     WHERE id = ?",
                )
                .bind(error)
                .bind(submission_id)
                .execute(&self.pool)
                .await,
            )?;
            return Ok(());
        }

        let revert_stage = submission
            .stage
            .prerequisite()
            .ok_or_else(|| ResonanceError::Other(anyhow::anyhow!("stage {} cannot be retried", submission.stage)))?;
        let revert_status = if revert_stage == Stage::Queued { Status::Pending } else { Status::Done };
        let next_attempt = Utc::now() + backoff;

        into_core(
            sqlx::query(
                "UPDATE submissions
                 SET stage = ?, status = ?, error = ?, attempts = attempts + 1,
                     claim_owner = NULL, claim_deadline = NULL, next_attempt_at = ?
                 WHERE id = ?",
            )
            .bind(stage_str(revert_stage))
            .bind(status_str(revert_status))
            .bind(error)
            .bind(next_attempt.to_rfc3339())
            .bind(submission_id)
            .execute(&self.pool)
            .await,
        )?;
        Ok(())
    }

    async fn get_submission(&self, submission_id: i64) -> CoreResult<Submission> {
        let row = into_core(
            sqlx::query("SELECT * FROM submissions WHERE id = ?")
                .bind(submission_id)
                .fetch_optional(&self.pool)
                .await,
        )?;
        match row {
            Some(r) => row_to_submission(&r),
            None => Err(ResonanceError::NotFound(format!("submission {submission_id}"))),
        }
    }

    async fn get_progress(&self, submission_id: i64) -> CoreResult<Progress> {
        let submission = self.get_submission(submission_id).await?;
        let percent = match submission.stage.ordinal() {
            Some(ord) => (ord as f32 / (Stage::ORDER.len() - 1) as f32) * 100.0,
            None => 100.0,
        };
        Ok(Progress {
            stage: submission.stage,
            status: submission.status,
            percent,
        })
    }

    async fn list_pending(&self, stage: Stage, limit: i64) -> CoreResult<Vec<Submission>> {
        let rows = into_core(
            sqlx::query(
                "SELECT * FROM submissions WHERE stage = ? AND status = 'pending'
                 ORDER BY priority ASC, created_at ASC LIMIT ?",
            )
            .bind(stage_str(stage))
            .bind(limit)
            .fetch_all(&self.pool)
            .await,
        )?;
        rows.iter().map(row_to_submission).collect()
    }

    async fn sweep_expired_claims(&self) -> CoreResult<u64> {
        let now = Utc::now();
        // Revert to the prerequisite-done state implied by the current
        // in-progress stage, mirroring `fail`'s revert logic but without
        // incrementing attempts (the worker never got to report failure).
        let mut total = 0u64;
        for in_progress in [Stage::Downloading, Stage::Transcribing, Stage::Chunking, Stage::Embedding] {
            let prereq = in_progress.prerequisite().expect("in-progress stages have a prerequisite");
            let revert_status = if prereq == Stage::Queued { Status::Pending } else { Status::Done };
            let reverted = into_core(
                sqlx::query(
                    "UPDATE submissions
                     SET stage = ?, status = ?, claim_owner = NULL, claim_deadline = NULL
                     WHERE stage = ? AND status = 'running' AND claim_deadline < ?
                     RETURNING id",
                )
                .bind(stage_str(prereq))
                .bind(status_str(revert_status))
                .bind(stage_str(in_progress))
                .bind(now.to_rfc3339())
                .fetch_all(&self.pool)
                .await,
            )?;
            for _ in &reverted {
                into_core(
                    sqlx::query("INSERT INTO lease_expirations (occurred_at) VALUES (?)")
                        .bind(now.to_rfc3339())
                        .execute(&self.pool)
                        .await,
                )?;
            }
            total += reverted.len() as u64;
        }
        Ok(total)
    }

    async fn request_cancel(&self, submission_id: i64) -> CoreResult<()> {
        into_core(
            sqlx::query("UPDATE submissions SET cancel_requested = 1 WHERE id = ?")
                .bind(submission_id)
                .execute(&self.pool)
                .await,
        )?;
        Ok(())
    }

    async fn mark_cancelled(&self, submission_id: i64) -> CoreResult<()> {
        into_core(
            sqlx::query(
                "UPDATE submissions
                 SET stage = 'cancelled', status = 'error', claim_owner = NULL, claim_deadline = NULL
                 WHERE id = ? AND stage NOT IN ('failed', 'cancelled', 'indexed')",
            )
            .bind(submission_id)
            .execute(&self.pool)
            .await,
        )?;
        Ok(())
    }

    async fn sweep_cancelled_submissions(&self) -> CoreResult<u64> {
        let result = into_core(
            sqlx::query(
                "UPDATE submissions
                 SET stage = 'cancelled', status = 'error', claim_owner = NULL, claim_deadline = NULL
                 WHERE cancel_requested = 1 AND status != 'running' AND stage NOT IN ('failed', 'cancelled', 'indexed')",
            )
            .execute(&self.pool)
            .await,
        )?;
        Ok(result.rows_affected())
    }

    async fn set_indexed_chunk_count(&self, submission_id: i64, count: i64) -> CoreResult<()> {
        into_core(
            sqlx::query("UPDATE submissions SET indexed_chunk_count = ? WHERE id = ?")
                .bind(count)
                .bind(submission_id)
                .execute(&self.pool)
                .await,
        )?;
        Ok(())
    }

    async fn stats(&self) -> CoreResult<StoreStats> {
        let by_stage_rows = into_core(
            sqlx::query("SELECT stage, COUNT(*) as n FROM submissions GROUP BY stage")
                .fetch_all(&self.pool)
                .await,
        )?;
        let mut by_stage = Vec::new();
        for row in &by_stage_rows {
            let stage_str: String = row.try_get("stage").map_err(anyhow::Error::from)?;
            let n: i64 = row.try_get("n").map_err(anyhow::Error::from)?;
            by_stage.push((parse_stage(&stage_str)?, n));
        }

        let total_submissions: i64 = into_core(
            sqlx::query_scalar("SELECT COUNT(*) FROM submissions").fetch_one(&self.pool).await,
        )?;
        let pending_count: i64 = into_core(
            sqlx::query_scalar("SELECT COUNT(*) FROM submissions WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await,
        )?;
        let failed_count: i64 = into_core(
            sqlx::query_scalar("SELECT COUNT(*) FROM submissions WHERE stage = 'failed'")
                .fetch_one(&self.pool)
                .await,
        )?;
        let feedback_count = self.feedback_count().await?;
        let cutoff = (Utc::now() - chrono::Duration::hours(1)).to_rfc3339();
        let lease_expirations_last_hour: i64 = into_core(
            sqlx::query_scalar("SELECT COUNT(*) FROM lease_expirations WHERE occurred_at >= ?")
                .bind(cutoff)
                .fetch_one(&self.pool)
                .await,
        )?;

        Ok(StoreStats {
            by_stage,
            total_submissions,
            pending_count,
            failed_count,
            lease_expirations_last_hour,
            feedback_count,
        })
    }

    async fn record_query_event(&self, event: &QueryEvent) -> CoreResult<i64> {
        let chunk_ids = serde_json::to_string(&event.retrieved_chunk_ids).map_err(anyhow::Error::from)?;
        let row = into_core(
            sqlx::query(
                "INSERT INTO query_events
                 (user_id, query_text, top_k, variant, rewriting_applied, response_text,
                  response_time_ms, retrieved_chunk_ids, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                 RETURNING id",
            )
            .bind(&event.user_id)
            .bind(&event.query_text)
            .bind(event.top_k)
            .bind(&event.variant)
            .bind(event.rewriting_applied)
            .bind(&event.response_text)
            .bind(event.response_time_ms as i64)
            .bind(chunk_ids)
            .bind(event.created_at.to_rfc3339())
            .fetch_one(&self.pool)
            .await,
        )?;
        Ok(row.try_get("id").map_err(anyhow::Error::from)?)
    }

    async fn record_feedback_event(&self, query_event_id: i64, rating: FeedbackRating, comment: Option<&str>) -> CoreResult<i64> {
        let rating_str = serde_json::to_value(rating).map_err(anyhow::Error::from)?;
        let row = into_core(
            sqlx::query(
                "INSERT INTO feedback_events (query_event_id, rating, comment, created_at)
                 VALUES (?, ?, ?, ?) RETURNING id",
            )
            .bind(query_event_id)
            .bind(rating_str.as_str().unwrap_or("positive"))
            .bind(comment)
            .bind(Utc::now().to_rfc3339())
            .fetch_one(&self.pool)
            .await,
        )?;
        Ok(row.try_get("id").map_err(anyhow::Error::from)?)
    }

    async fn feedback_count(&self) -> CoreResult<i64> {
        Ok(into_core(
            sqlx::query_scalar("SELECT COUNT(*) FROM feedback_events").fetch_one(&self.pool).await,
        )?)
    }

    async fn enqueue_pipeline_job(&self, kind: PipelineJobKind, priority: i32, scheduled_at: DateTime<Utc>) -> CoreResult<i64> {
        let payload = serde_json::to_string(&kind).map_err(anyhow::Error::from)?;
        let row = into_core(
            sqlx::query(
                "INSERT INTO pipeline_jobs (kind, priority, scheduled_at, status, attempt_count)
                 VALUES (?, ?, ?, 'pending', 0) RETURNING id",
            )
            .bind(payload)
            .bind(priority)
            .bind(scheduled_at.to_rfc3339())
            .fetch_one(&self.pool)
            .await,
        )?;
        Ok(row.try_get("id").map_err(anyhow::Error::from)?)
    }

    async fn pipeline_job_exists(&self, kind: &PipelineJobKind) -> CoreResult<bool> {
        // `evaluation_time`-bearing kinds are never byte-identical across
        // polls, so the comparison happens in Rust via `same_family`
        // rather than an exact match on the serialized column.
        let rows: Vec<String> = into_core(
            sqlx::query_scalar("SELECT kind FROM pipeline_jobs WHERE status IN ('pending', 'running')")
                .fetch_all(&self.pool)
                .await,
        )?;
        for payload in rows {
            let existing: PipelineJobKind = serde_json::from_str(&payload).map_err(anyhow::Error::from)?;
            if existing.same_family(kind) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn claim_pipeline_job(&self, _worker_id: &str) -> CoreResult<Option<PipelineJob>> {
        let now = Utc::now();
        let row = into_core(
            sqlx::query(
                "UPDATE pipeline_jobs
                 SET status = 'running'
                 WHERE id = (
                     SELECT id FROM pipeline_jobs
                     WHERE status = 'pending' AND scheduled_at <= ?
                     ORDER BY priority ASC, scheduled_at ASC LIMIT 1
                 )
                 RETURNING *",
            )
            .bind(now.to_rfc3339())
            .fetch_optional(&self.pool)
            .await,
        )?;

        match row {
            Some(r) => {
                let payload: String = r.try_get("kind").map_err(anyhow::Error::from)?;
                let kind: PipelineJobKind = serde_json::from_str(&payload).map_err(anyhow::Error::from)?;
                let scheduled_at: String = r.try_get("scheduled_at").map_err(anyhow::Error::from)?;
                let status_str: String = r.try_get("status").map_err(anyhow::Error::from)?;
                Ok(Some(PipelineJob {
                    id: r.try_get("id").map_err(anyhow::Error::from)?,
                    kind,
                    priority: r.try_get("priority").map_err(anyhow::Error::from)?,
                    scheduled_at: parse_dt(&scheduled_at)?,
                    status: parse_pipeline_status(&status_str)?,
                    attempt_count: r.try_get("attempt_count").map_err(anyhow::Error::from)?,
                    last_error: r.try_get("last_error").map_err(anyhow::Error::from)?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn complete_pipeline_job(&self, job_id: i64, status: PipelineJobStatus, error: Option<&str>) -> CoreResult<()> {
        let status_str = serde_json::to_value(status)
            .map_err(anyhow::Error::from)?
            .as_str()
            .unwrap_or("done")
            .to_string();
        into_core(
            sqlx::query(
                "UPDATE pipeline_jobs SET status = ?, last_error = ?, attempt_count = attempt_count + 1 WHERE id = ?",
            )
            .bind(status_str)
            .bind(error)
            .bind(job_id)
            .execute(&self.pool)
            .await,
        )?;
        Ok(())
    }

    async fn record_alert(&self, severity: AlertSeverity, kind: &str, message: &str) -> CoreResult<i64> {
        let severity_str = serde_json::to_value(severity)
            .map_err(anyhow::Error::from)?
            .as_str()
            .unwrap_or("info")
            .to_string();
        let row = into_core(
            sqlx::query(
                "INSERT INTO system_alerts (severity, kind, message, created_at)
                 VALUES (?, ?, ?, ?) RETURNING id",
            )
            .bind(severity_str)
            .bind(kind)
            .bind(message)
            .bind(Utc::now().to_rfc3339())
            .fetch_one(&self.pool)
            .await,
        )?;
        Ok(row.try_get("id").map_err(anyhow::Error::from)?)
    }

    async fn undispatched_alerts(&self, min_severity: AlertSeverity) -> CoreResult<Vec<SystemAlert>> {
        let rows = into_core(
            sqlx::query("SELECT * FROM system_alerts WHERE dispatched_at IS NULL ORDER BY created_at ASC")
                .fetch_all(&self.pool)
                .await,
        )?;
        let mut out = Vec::new();
        for r in &rows {
            let severity_str: String = r.try_get("severity").map_err(anyhow::Error::from)?;
            let severity = parse_severity(&severity_str)?;
            if severity < min_severity {
                continue;
            }
            let created_at: String = r.try_get("created_at").map_err(anyhow::Error::from)?;
            let acknowledged_at: Option<String> = r.try_get("acknowledged_at").map_err(anyhow::Error::from)?;
            let dispatched_at: Option<String> = r.try_get("dispatched_at").map_err(anyhow::Error::from)?;
            out.push(SystemAlert {
                id: r.try_get("id").map_err(anyhow::Error::from)?,
                severity,
                kind: r.try_get("kind").map_err(anyhow::Error::from)?,
                message: r.try_get("message").map_err(anyhow::Error::from)?,
                created_at: parse_dt(&created_at)?,
                acknowledged_at: acknowledged_at.map(|s| parse_dt(&s)).transpose()?,
                dispatched_at: dispatched_at.map(|s| parse_dt(&s)).transpose()?,
            });
        }
        Ok(out)
    }

    async fn mark_alert_dispatched(&self, alert_id: i64) -> CoreResult<()> {
        into_core(
            sqlx::query("UPDATE system_alerts SET dispatched_at = ? WHERE id = ?")
                .bind(Utc::now().to_rfc3339())
                .bind(alert_id)
                .execute(&self.pool)
                .await,
        )?;
        Ok(())
    }

    async fn set_user_verbose(&self, user_id: &str, verbose: bool) -> CoreResult<()> {
        into_core(
            sqlx::query(
                "INSERT INTO user_prefs (user_id, verbose) VALUES (?, ?)
                 ON CONFLICT (user_id) DO UPDATE SET verbose = excluded.verbose",
            )
            .bind(user_id)
            .bind(verbose)
            .execute(&self.pool)
            .await,
        )?;
        Ok(())
    }

    async fn is_user_verbose(&self, user_id: &str) -> CoreResult<bool> {
        let row: Option<i64> = into_core(
            sqlx::query_scalar("SELECT verbose FROM user_prefs WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await,
        )?;
        Ok(row.unwrap_or(0) != 0)
    }

    async fn list_archivable_submissions(&self, limit: i64) -> CoreResult<Vec<i64>> {
        let ids: Vec<i64> = into_core(
            sqlx::query_scalar(
                "SELECT id FROM submissions WHERE stage = 'indexed' AND archived = 0
                 ORDER BY created_at ASC LIMIT ?",
            )
            .bind(limit)
            .fetch_all(&self.pool)
            .await,
        )?;
        Ok(ids)
    }

    async fn mark_archived(&self, submission_id: i64) -> CoreResult<()> {
        into_core(
            sqlx::query("UPDATE submissions SET archived = 1 WHERE id = ?")
                .bind(submission_id)
                .execute(&self.pool)
                .await,
        )?;
        Ok(())
    }
}

fn parse_pipeline_status(s: &str) -> CoreResult<PipelineJobStatus> {
    match s {
        "pending" => Ok(PipelineJobStatus::Pending),
        "running" => Ok(PipelineJobStatus::Running),
        "done" => Ok(PipelineJobStatus::Done),
        "error" => Ok(PipelineJobStatus::Error),
        other => Err(ResonanceError::Other(anyhow::anyhow!("bad pipeline status {other}"))),
    }
}

fn parse_severity(s: &str) -> CoreResult<AlertSeverity> {
    match s {
        "info" => Ok(AlertSeverity::Info),
        "warning" => Ok(AlertSeverity::Warning),
        "error" => Ok(AlertSeverity::Error),
        "critical" => Ok(AlertSeverity::Critical),
        other => Err(ResonanceError::Other(anyhow::anyhow!("bad severity {other}"))),
    }
}
