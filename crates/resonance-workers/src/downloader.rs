//! Downloader stage worker (spec §4.3). Stateless: given a claimed
//! submission, fetches its audio and populates artifact attributes.

use resonance_artifacts::ArtifactStore;
use resonance_core::error::{Result, ResonanceError};
use resonance_core::model::{SourceKind, Submission};
use resonance_core::ports::Downloader;
use resonance_store::traits::ArtifactRefs;
use std::sync::Arc;

pub struct DownloaderWorker<D: ?Sized> {
    downloader: Arc<D>,
    artifacts: Arc<ArtifactStore>,
}

impl<D: Downloader + ?Sized> DownloaderWorker<D> {
    pub fn new(downloader: Arc<D>, artifacts: Arc<ArtifactStore>) -> Self {
        Self { downloader, artifacts }
    }

    pub async fn run(&self, submission: &Submission) -> Result<ArtifactRefs> {
        let fetched = match submission.source_kind {
            SourceKind::RemoteUrl => self.downloader.fetch_remote(&submission.source).await?,
            SourceKind::LocalFile => self.downloader.read_local(&submission.source).await?,
        };

        if fetched.bytes.is_empty() {
            return Err(ResonanceError::CorruptArtifact {
                stage: "downloading".into(),
                detail: "downloaded audio is empty".into(),
            });
        }

        let path = self.artifacts.put_audio(submission.id, &fetched.filename, &fetched.bytes)?;

        tracing::info!(
            submission_id = submission.id,
            byte_size = fetched.bytes.len(),
            duration_seconds = fetched.duration_seconds,
            "downloaded audio artifact"
        );

        Ok(ArtifactRefs {
            audio_path: Some(path),
            ..Default::default()
        })
    }
}
