//! Error taxonomy shared across every crate in the workspace (spec §7).
//!
//! Each variant names a taxonomy tag rather than a concrete failure site;
//! workers and the retrieval path map their local errors onto this enum so
//! the Scheduler and the HTTP/CLI surfaces can apply one retry/exit-code
//! policy.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResonanceError>;

#[derive(Debug, Error)]
pub enum ResonanceError {
    #[error("invalid input: {0}")]
    InputInvalid(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transient network error: {0}")]
    TransientNetwork(String),

    #[error("transient resource error: {0}")]
    TransientResource(String),

    #[error("model failure: {0}")]
    ModelFailure(String),

    #[error("backpressure: queue saturated")]
    Backpressure,

    #[error("corrupt artifact produced by stage {stage}: {detail}")]
    CorruptArtifact { stage: String, detail: String },

    #[error("cancelled")]
    Cancelled,

    #[error("duplicate source within dedup window")]
    DuplicateSource,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ResonanceError {
    /// Short tag surfaced to chat-bot/HTTP/CLI callers (spec §7).
    pub fn taxonomy_tag(&self) -> &'static str {
        match self {
            ResonanceError::InputInvalid(_) => "input-invalid",
            ResonanceError::NotFound(_) => "not-found",
            ResonanceError::TransientNetwork(_) => "transient-network",
            ResonanceError::TransientResource(_) => "transient-resource",
            ResonanceError::ModelFailure(_) => "model-failure",
            ResonanceError::Backpressure => "backpressure",
            ResonanceError::CorruptArtifact { .. } => "corrupt-artifact",
            ResonanceError::Cancelled => "cancelled",
            ResonanceError::DuplicateSource => "duplicate-source",
            ResonanceError::Other(_) => "internal",
        }
    }

    /// Whether a stage worker should retry the submission with backoff
    /// (spec §7's retry policy: base 2s, max 5 min, max attempts 3).
    pub fn retriable(&self) -> bool {
        matches!(
            self,
            ResonanceError::TransientNetwork(_) | ResonanceError::TransientResource(_)
        ) || matches!(self, ResonanceError::ModelFailure(_))
    }

    /// CLI exit code mapping: 0 success, 1 user error, 2 system error.
    pub fn exit_code(&self) -> i32 {
        match self {
            ResonanceError::InputInvalid(_)
            | ResonanceError::NotFound(_)
            | ResonanceError::Backpressure
            | ResonanceError::DuplicateSource
            | ResonanceError::Cancelled => 1,
            _ => 2,
        }
    }
}

/// Exponential backoff schedule for retriable failures (spec §7).
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base: std::time::Duration,
    pub max: std::time::Duration,
    pub max_attempts: i32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: std::time::Duration::from_secs(2),
            max: std::time::Duration::from_secs(300),
            max_attempts: 3,
        }
    }
}

impl BackoffPolicy {
    /// Delay before the `attempt`-th retry (0-indexed), doubling each time
    /// and capped at `max`.
    pub fn delay_for(&self, attempt: i32) -> std::time::Duration {
        let factor = 1u64.checked_shl(attempt.max(0) as u32).unwrap_or(u64::MAX);
        let millis = self.base.as_millis() as u64;
        let scaled = millis.saturating_mul(factor);
        std::time::Duration::from_millis(scaled).min(self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retriable() {
        assert!(ResonanceError::TransientNetwork("timeout".into()).retriable());
        assert!(ResonanceError::TransientResource("oom".into()).retriable());
        assert!(!ResonanceError::InputInvalid("bad url".into()).retriable());
        assert!(!ResonanceError::Cancelled.retriable());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for(0), std::time::Duration::from_secs(2));
        assert_eq!(policy.delay_for(1), std::time::Duration::from_secs(4));
        assert_eq!(policy.delay_for(2), std::time::Duration::from_secs(8));
        // Large attempt counts must saturate at `max`, not panic or overflow.
        assert_eq!(policy.delay_for(40), policy.max);
    }

    #[test]
    fn exit_codes_split_user_vs_system_errors() {
        assert_eq!(ResonanceError::NotFound("x".into()).exit_code(), 1);
        assert_eq!(ResonanceError::ModelFailure("x".into()).exit_code(), 2);
    }
}
