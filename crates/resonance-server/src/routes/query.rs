//! `POST /query` — the retrieval engine's HTTP face (spec §6).

use crate::error::{WebError, WebResult};
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use resonance_retrieval::{QueryRequest as EngineQueryRequest, QueryResponse};
use serde::Deserialize;

/// Request body from spec §6; `user_id` is not part of the wire contract,
/// so an anonymous caller is recorded as `"http"` on the Query Event.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    pub top_k: u32,
    pub variant: Option<String>,
    pub system_prompt: Option<String>,
}

pub async fn query(State(state): State<AppState>, Json(request): Json<QueryRequest>) -> WebResult<Json<QueryResponse>> {
    if request.question.trim().is_empty() {
        return Err(WebError::BadRequest("question must not be empty".into()));
    }

    let variant = request
        .variant
        .as_deref()
        .map(parse_variant)
        .transpose()
        .map_err(WebError::BadRequest)?;

    let engine_request = EngineQueryRequest {
        user_id: "http".to_string(),
        question: request.question,
        top_k: request.top_k,
        variant,
        system_prompt: request.system_prompt,
    };

    let response = state.retrieval.query(engine_request).await.map_err(WebError::Engine)?;
    Ok(Json(response))
}

fn parse_variant(raw: &str) -> Result<resonance_core::model::RetrievalVariant, String> {
    use resonance_core::model::RetrievalVariant::*;
    match raw {
        "semantic" => Ok(Semantic),
        "hybrid" => Ok(Hybrid),
        "hybrid_rerank" => Ok(HybridRerank),
        "rewrite_hybrid_rerank" => Ok(RewriteHybridRerank),
        other => Err(format!("unknown retrieval variant: {other}")),
    }
}
