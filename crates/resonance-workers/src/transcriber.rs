//! Transcriber stage worker (spec §4.3). Targets the capability set
//! `{transcribe(path, language?) -> segments}`, never a specific ASR API.

use resonance_artifacts::{ArtifactKind, ArtifactStore};
use resonance_core::error::{Result, ResonanceError};
use resonance_core::model::Submission;
use resonance_core::ports::AsrEngine;
use resonance_store::traits::ArtifactRefs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub struct TranscriberWorker<A: ?Sized> {
    asr: Arc<A>,
    artifacts: Arc<ArtifactStore>,
    timeout: Duration,
}

impl<A: AsrEngine + ?Sized> TranscriberWorker<A> {
    pub fn new(asr: Arc<A>, artifacts: Arc<ArtifactStore>) -> Self {
        Self::with_timeout(asr, artifacts, 60)
    }

    pub fn with_timeout(asr: Arc<A>, artifacts: Arc<ArtifactStore>, timeout_secs: u64) -> Self {
        Self { asr, artifacts, timeout: Duration::from_secs(timeout_secs) }
    }

    pub async fn run(&self, submission: &Submission) -> Result<ArtifactRefs> {
        let audio_path = submission.audio_path.as_ref().ok_or_else(|| ResonanceError::CorruptArtifact {
            stage: "downloading".into(),
            detail: "submission has no audio_path".into(),
        })?;

        let mut transcript = tokio::time::timeout(self.timeout, self.asr.transcribe(Path::new(audio_path), submission.language_hint.as_deref()))
            .await
            .map_err(|_| ResonanceError::TransientNetwork(format!("ASR call exceeded {}s timeout", self.timeout.as_secs())))??;

        // Drop empty segments (spec §4.3).
        transcript.segments.retain(|s| !s.text.trim().is_empty());

        let path = self.artifacts.put_json(ArtifactKind::Transcript, submission.id, &transcript)?;

        tracing::info!(
            submission_id = submission.id,
            segment_count = transcript.segments.len(),
            "wrote transcript"
        );

        Ok(ArtifactRefs {
            transcript_path: Some(path),
            ..Default::default()
        })
    }
}
