//! Final job summary: one detached JSON document per completed submission,
//! suitable for archival alongside the audio/transcript/chunks artifacts.

use chrono::{DateTime, Utc};
use resonance_core::model::{Stage, Submission};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobSummary {
    pub schema: String,
    pub submission_id: i64,
    pub final_stage: Stage,
    pub indexed_chunk_count: i64,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl JobSummary {
    /// True when the submission reached `Stage::Indexed` rather than failing.
    pub fn succeeded(&self) -> bool {
        self.final_stage == Stage::Indexed
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

pub struct JobSummaryBuilder {
    submission_id: i64,
    final_stage: Stage,
    indexed_chunk_count: i64,
    attempts: i32,
    created_at: DateTime<Utc>,
    error: Option<String>,
    metadata: HashMap<String, serde_json::Value>,
}

impl JobSummaryBuilder {
    pub fn from_submission(submission: &Submission) -> Self {
        Self {
            submission_id: submission.id,
            final_stage: submission.stage,
            indexed_chunk_count: submission.indexed_chunk_count,
            attempts: submission.attempts,
            created_at: submission.created_at,
            error: submission.error.clone(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata<S: Into<String>>(mut self, key: S, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn build(self) -> JobSummary {
        JobSummary {
            schema: "resonance.job-summary.v1".to_string(),
            submission_id: self.submission_id,
            final_stage: self.final_stage,
            indexed_chunk_count: self.indexed_chunk_count,
            attempts: self.attempts,
            created_at: self.created_at,
            finished_at: Utc::now(),
            error: self.error,
            metadata: if self.metadata.is_empty() { None } else { Some(self.metadata) },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resonance_core::model::{SourceKind, Status};
    use serde_json::json;
    use tempfile::NamedTempFile;

    fn sample_submission(stage: Stage) -> Submission {
        Submission {
            id: 1,
            source_kind: SourceKind::RemoteUrl,
            source: "https://example.com/audio.mp3".into(),
            user_id: "u1".into(),
            language_hint: None,
            created_at: Utc::now(),
            stage,
            status: Status::Done,
            error: None,
            audio_path: None,
            transcript_path: None,
            chunks_path: None,
            indexed_chunk_count: 12,
            attempts: 1,
            priority: 0,
        }
    }

    #[test]
    fn succeeded_reflects_indexed_stage() {
        let summary = JobSummaryBuilder::from_submission(&sample_submission(Stage::Indexed)).build();
        assert!(summary.succeeded());

        let failed_summary = JobSummaryBuilder::from_submission(&sample_submission(Stage::Failed)).build();
        assert!(!failed_summary.succeeded());
    }

    #[test]
    fn builder_carries_metadata_and_roundtrips() {
        let temp = NamedTempFile::new().unwrap();
        let summary = JobSummaryBuilder::from_submission(&sample_submission(Stage::Indexed))
            .with_metadata("variant", json!("hybrid"))
            .build();
        summary.save(temp.path()).unwrap();

        let loaded = JobSummary::load(temp.path()).unwrap();
        assert_eq!(loaded.submission_id, 1);
        assert_eq!(loaded.indexed_chunk_count, 12);
        assert_eq!(loaded.metadata.unwrap().get("variant").unwrap(), &json!("hybrid"));
    }

    #[test]
    fn empty_metadata_is_omitted() {
        let summary = JobSummaryBuilder::from_submission(&sample_submission(Stage::Indexed)).build();
        assert!(summary.metadata.is_none());
        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("metadata"));
    }
}
