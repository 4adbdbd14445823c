//! `POST /process` — submission ingress (spec §6).

use crate::error::{WebError, WebResult};
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use resonance_core::model::SourceKind;
use resonance_core::ResonanceError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub urls: Vec<String>,
    #[serde(default)]
    pub use_fake_asr: bool,
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub submission_ids: Vec<i64>,
}

/// Every url becomes one Submission via `JobStore::insert_submission`. A
/// single `Backpressure` rejection fails the whole batch with 429, mirroring
/// the all-or-nothing semantics of the CLI's `process` subcommand.
pub async fn process(State(state): State<AppState>, Json(request): Json<ProcessRequest>) -> WebResult<(StatusCode, Json<ProcessResponse>)> {
    if request.urls.is_empty() {
        return Err(WebError::BadRequest("urls must not be empty".into()));
    }

    let dedup_window = chrono::Duration::hours(state.config.dedup_window_hours);
    let backpressure_high_water_mark = state.config.backpressure_high_water_mark;

    let mut submission_ids = Vec::with_capacity(request.urls.len());
    for url in &request.urls {
        let source_kind = classify_source(url);
        let id = state
            .store
            .insert_submission(source_kind, url, "http", request.language.as_deref(), dedup_window, backpressure_high_water_mark)
            .await
            .map_err(|e| match e {
                ResonanceError::Backpressure => WebError::Engine(ResonanceError::Backpressure),
                other => WebError::Engine(other),
            })?;
        submission_ids.push(id);
        tracing::info!(submission_id = id, url, "submission accepted");
    }

    Ok((StatusCode::ACCEPTED, Json(ProcessResponse { submission_ids })))
}

/// Local files are submitted as an absolute/relative filesystem path; every
/// other source is treated as a remote URL for the Downloader to fetch.
pub fn classify_source(source: &str) -> SourceKind {
    if source.starts_with("http://") || source.starts_with("https://") {
        SourceKind::RemoteUrl
    } else {
        SourceKind::LocalFile
    }
}
