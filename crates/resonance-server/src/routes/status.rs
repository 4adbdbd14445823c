//! `GET /status` — counts by stage, storage sizes, worker pool status (spec §6).

use crate::error::{WebError, WebResult};
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use resonance_scheduler::WorkerPoolStatus;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub by_stage: Vec<(String, i64)>,
    pub total_submissions: i64,
    pub pending_count: i64,
    pub failed_count: i64,
    pub lease_expirations_last_hour: i64,
    pub feedback_count: i64,
    pub storage_bytes: u64,
    pub worker_pool: WorkerPoolStatus,
}

pub async fn status(State(state): State<AppState>) -> WebResult<Json<StatusResponse>> {
    let stats = state.store.stats().await.map_err(WebError::Engine)?;
    let storage_bytes = state.artifacts.total_size().map_err(WebError::Engine)?;

    Ok(Json(StatusResponse {
        by_stage: stats.by_stage.into_iter().map(|(stage, count)| (stage.to_string(), count)).collect(),
        total_submissions: stats.total_submissions,
        pending_count: stats.pending_count,
        failed_count: stats.failed_count,
        lease_expirations_last_hour: stats.lease_expirations_last_hour,
        feedback_count: stats.feedback_count,
        storage_bytes,
        worker_pool: state.pool_status.status(),
    }))
}
