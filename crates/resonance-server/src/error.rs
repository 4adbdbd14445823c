//! Maps `ResonanceError`'s taxonomy (spec §7) onto HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use resonance_core::ResonanceError;
use thiserror::Error;

pub type WebResult<T> = Result<T, WebError>;

#[derive(Debug, Error)]
pub enum WebError {
    #[error(transparent)]
    Engine(#[from] ResonanceError),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, tag, message) = match &self {
            WebError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "input-invalid", msg.clone()),
            WebError::Engine(e) => (status_for(e), e.taxonomy_tag(), e.to_string()),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
            "tag": tag,
        });

        (status, Json(body)).into_response()
    }
}

fn status_for(err: &ResonanceError) -> StatusCode {
    match err {
        ResonanceError::InputInvalid(_) => StatusCode::BAD_REQUEST,
        ResonanceError::NotFound(_) => StatusCode::NOT_FOUND,
        ResonanceError::Backpressure => StatusCode::TOO_MANY_REQUESTS,
        ResonanceError::DuplicateSource => StatusCode::CONFLICT,
        ResonanceError::Cancelled => StatusCode::GONE,
        ResonanceError::TransientNetwork(_) | ResonanceError::TransientResource(_) => StatusCode::SERVICE_UNAVAILABLE,
        ResonanceError::ModelFailure(_) | ResonanceError::CorruptArtifact { .. } | ResonanceError::Other(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
