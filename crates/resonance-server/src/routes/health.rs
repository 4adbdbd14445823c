//! `GET /health` — liveness plus collection size (spec §6).

use crate::error::{WebError, WebResult};
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub collection_size: usize,
}

pub async fn health(State(state): State<AppState>) -> WebResult<Json<HealthResponse>> {
    let collection_size = state.vectors.count().await.map_err(WebError::Engine)?;
    Ok(Json(HealthResponse { ok: true, collection_size }))
}
