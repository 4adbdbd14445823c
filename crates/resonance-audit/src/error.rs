//! Local error type for telemetry I/O, convertible into `ResonanceError`.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuditError>;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to create telemetry log at {path}")]
    CreateFailed { path: PathBuf },
}

impl From<AuditError> for resonance_core::ResonanceError {
    fn from(err: AuditError) -> Self {
        match err {
            AuditError::Io(e) => resonance_core::ResonanceError::TransientResource(e.to_string()),
            AuditError::Json(e) => resonance_core::ResonanceError::InputInvalid(e.to_string()),
            AuditError::CreateFailed { path } => resonance_core::ResonanceError::TransientResource(format!("cannot create log file: {}", path.display())),
        }
    }
}
