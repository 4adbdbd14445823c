//! Chunker stage worker (spec §4.3). Pure CPU work, offloaded via
//! [`crate::executor::offload_compute`] so it never blocks the reactor.

use crate::executor::offload_compute;
use resonance_artifacts::{ArtifactKind, ArtifactStore};
use resonance_core::config::ChunkingConfig;
use resonance_core::error::Result;
use resonance_core::model::{Chunk, Submission, Transcript};
use resonance_store::traits::ArtifactRefs;
use std::sync::Arc;

pub struct ChunkerWorker {
    config: ChunkingConfig,
    artifacts: Arc<ArtifactStore>,
}

impl ChunkerWorker {
    pub fn new(config: ChunkingConfig, artifacts: Arc<ArtifactStore>) -> Self {
        Self { config, artifacts }
    }

    pub async fn run(&self, submission: &Submission) -> Result<ArtifactRefs> {
        let transcript: Transcript = self.artifacts.get_json(ArtifactKind::Transcript, submission.id)?;
        let config = self.config;
        let submission_id = submission.id;

        let chunks = offload_compute(move || Ok(chunk_transcript(submission_id, &transcript, &config))).await?;

        let path = self.artifacts.put_json(ArtifactKind::Chunks, submission.id, &chunks)?;

        tracing::info!(submission_id = submission.id, chunk_count = chunks.len(), "wrote chunks");

        Ok(ArtifactRefs {
            chunks_path: Some(path),
            ..Default::default()
        })
    }
}

/// Collapses runs of whitespace to single spaces and trims the ends.
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Slides an overlapping window over `normalize_whitespace(transcript.full_text)`.
///
/// Step between window starts is `window_size - 2*overlap`: the worked
/// example (size=10, overlap=2) over "the quick brown fox" produces chunks
/// starting at 0, 6 and 12, i.e. step 6.
pub fn chunk_transcript(submission_id: i64, transcript: &Transcript, config: &ChunkingConfig) -> Vec<Chunk> {
    let text = normalize_whitespace(&transcript.full_text);
    if text.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let window = config.window_size.max(1);
    let step = window.saturating_sub(2 * config.overlap).max(1);

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut ordinal = 0u32;
    loop {
        let end = (start + window).min(len);
        let slice: String = chars[start..end].iter().collect();
        let (seg_start, seg_end) = segment_range_for(&chars, start, end, &transcript.segments, &text);
        chunks.push(Chunk {
            id: Chunk::make_id(submission_id, ordinal),
            submission_id,
            ordinal,
            char_count: slice.chars().count(),
            text: slice,
            segment_range: (seg_start, seg_end),
        });
        ordinal += 1;
        if end >= len {
            break;
        }
        start += step;
    }
    chunks
}

/// Maps a `[start, end)` character range in the normalized transcript back
/// onto the transcript segment indices it overlaps, by walking cumulative
/// offsets of each segment's (whitespace-normalized) text.
fn segment_range_for(
    _chars: &[char],
    start: usize,
    end: usize,
    segments: &[resonance_core::model::TranscriptSegment],
    _full_text: &str,
) -> (u32, u32) {
    if segments.is_empty() {
        return (0, 0);
    }
    let mut offset = 0usize;
    let mut first = None;
    let mut last = 0u32;
    for (i, seg) in segments.iter().enumerate() {
        let seg_len = normalize_whitespace(&seg.text).chars().count() + 1; // +1 joining space
        let seg_start = offset;
        let seg_end = offset + seg_len;
        if seg_start < end && seg_end > start {
            if first.is_none() {
                first = Some(i as u32);
            }
            last = i as u32;
        }
        offset = seg_end;
    }
    (first.unwrap_or(0), last)
}
