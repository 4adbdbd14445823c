//! Default `AsrEngine` (spec §4.3): a deterministic placeholder transcript.
//! Building a real speech-to-text model is an explicit non-goal; this keeps
//! the pipeline runnable without one, and is what `use_fake_asr` on
//! `POST /process` names explicitly (spec §6).

use async_trait::async_trait;
use resonance_core::error::Result;
use resonance_core::model::{Transcript, TranscriptSegment};
use resonance_core::ports::AsrEngine;
use std::path::Path;

pub struct StubAsrEngine;

impl StubAsrEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StubAsrEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AsrEngine for StubAsrEngine {
    async fn transcribe(&self, audio_path: &Path, language_hint: Option<&str>) -> Result<Transcript> {
        let byte_size = tokio::fs::metadata(audio_path).await.map(|m| m.len()).unwrap_or(0);
        let text = format!("[stub transcript for {} bytes of audio]", byte_size);

        Ok(Transcript {
            language: language_hint.unwrap_or("en").to_string(),
            duration: 0.0,
            segments: vec![TranscriptSegment { start: 0.0, end: 0.0, text: text.clone() }],
            full_text: text,
        })
    }
}
