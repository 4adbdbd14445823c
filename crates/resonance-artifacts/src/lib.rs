//! The Artifact Store (spec §4.2): a plain-filesystem layout rooted at a
//! configurable data directory —
//!
//! ```text
//! audio/<submission-id>/<sanitized-title>.<ext>
//! transcripts/<submission-id>.json
//! chunks/<submission-id>.json
//! ```
//!
//! Writes go through a temp-file-then-rename so readers never observe a
//! partially written file: artifacts can be raced by a concurrent reader
//! in a way a single write-once summary document never is.

use resonance_core::error::{Result, ResonanceError};
use std::path::{Path, PathBuf};

mod sanitize;
pub use sanitize::sanitize_filename;

/// Which path family an artifact belongs to (spec §4.2's three families).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Audio,
    Transcript,
    Chunks,
}

impl ArtifactKind {
    fn dir_name(self) -> &'static str {
        match self {
            ArtifactKind::Audio => "audio",
            ArtifactKind::Transcript => "transcripts",
            ArtifactKind::Chunks => "chunks",
        }
    }
}

pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn dir_for(&self, kind: ArtifactKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    /// Path for a transcript/chunks JSON file, `<dir>/<submission-id>.json`.
    fn flat_path(&self, kind: ArtifactKind, submission_id: i64) -> PathBuf {
        self.dir_for(kind).join(format!("{submission_id}.json"))
    }

    /// Writes `bytes` to `audio/<submission-id>/<sanitized-name>`, returning
    /// the path written. The directory is created if missing; the write is
    /// atomic (temp file in the same directory, then rename).
    pub fn put_audio(&self, submission_id: i64, filename: &str, bytes: &[u8]) -> Result<String> {
        let sanitized = sanitize_filename(filename);
        let dir = self.dir_for(ArtifactKind::Audio).join(submission_id.to_string());
        std::fs::create_dir_all(&dir).map_err(anyhow::Error::from)?;
        let final_path = dir.join(&sanitized);
        atomic_write(&final_path, bytes)?;
        Ok(final_path.to_string_lossy().into_owned())
    }

    /// Writes a JSON-serializable value to `transcripts/<id>.json` or
    /// `chunks/<id>.json`, returning the path written.
    pub fn put_json<T: serde::Serialize>(&self, kind: ArtifactKind, submission_id: i64, value: &T) -> Result<String> {
        if kind == ArtifactKind::Audio {
            return Err(ResonanceError::InputInvalid("audio artifacts are written via put_audio".into()));
        }
        let dir = self.dir_for(kind);
        std::fs::create_dir_all(&dir).map_err(anyhow::Error::from)?;
        let path = self.flat_path(kind, submission_id);
        let bytes = serde_json::to_vec_pretty(value).map_err(anyhow::Error::from)?;
        atomic_write(&path, &bytes)?;
        Ok(path.to_string_lossy().into_owned())
    }

    pub fn get_json<T: serde::de::DeserializeOwned>(&self, kind: ArtifactKind, submission_id: i64) -> Result<T> {
        let path = self.flat_path(kind, submission_id);
        let bytes = std::fs::read(&path).map_err(|_| ResonanceError::NotFound(format!("{}", path.display())))?;
        serde_json::from_slice(&bytes).map_err(|e| ResonanceError::CorruptArtifact {
            stage: format!("{:?}", kind),
            detail: e.to_string(),
        })
    }

    pub fn get_audio(&self, path: &str) -> Result<Vec<u8>> {
        std::fs::read(path).map_err(|_| ResonanceError::NotFound(path.to_string()))
    }

    /// Removes all artifacts for a submission across every path family.
    pub fn delete(&self, submission_id: i64) -> Result<()> {
        let audio_dir = self.dir_for(ArtifactKind::Audio).join(submission_id.to_string());
        if audio_dir.exists() {
            std::fs::remove_dir_all(&audio_dir).map_err(anyhow::Error::from)?;
        }
        for kind in [ArtifactKind::Transcript, ArtifactKind::Chunks] {
            let path = self.flat_path(kind, submission_id);
            if path.exists() {
                std::fs::remove_file(&path).map_err(anyhow::Error::from)?;
            }
        }
        Ok(())
    }

    /// Aggregate bytes used under one path family, for monitoring (spec
    /// §4.2's `size(kind) -> bytes`).
    pub fn size(&self, kind: ArtifactKind) -> Result<u64> {
        let dir = self.dir_for(kind);
        if !dir.exists() {
            return Ok(0);
        }
        Ok(dir_size(&dir).map_err(anyhow::Error::from)?)
    }

    /// Aggregate bytes used across every path family.
    pub fn total_size(&self) -> Result<u64> {
        let mut total = 0u64;
        for kind in [ArtifactKind::Audio, ArtifactKind::Transcript, ArtifactKind::Chunks] {
            total += self.size(kind)?;
        }
        Ok(total)
    }
}

fn dir_size(dir: &Path) -> std::io::Result<u64> {
    let mut total = 0u64;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        if meta.is_dir() {
            total += dir_size(&entry.path())?;
        } else {
            total += meta.len();
        }
    }
    Ok(total)
}

fn atomic_write(final_path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = final_path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(anyhow::Error::from)?;
    std::io::Write::write_all(&mut tmp, bytes).map_err(anyhow::Error::from)?;
    tmp.persist(final_path).map_err(|e| ResonanceError::Other(anyhow::anyhow!("atomic rename failed: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use resonance_core::model::Transcript;

    #[test]
    fn put_and_get_json_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let transcript = Transcript {
            language: "en".into(),
            duration: 5.0,
            segments: vec![],
            full_text: "the quick brown fox".into(),
        };
        let path = store.put_json(ArtifactKind::Transcript, 1, &transcript).unwrap();
        assert!(Path::new(&path).exists());

        let loaded: Transcript = store.get_json(ArtifactKind::Transcript, 1).unwrap();
        assert_eq!(loaded, transcript);
    }

    #[test]
    fn get_missing_returns_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let err = store.get_json::<Transcript>(ArtifactKind::Transcript, 999).unwrap_err();
        assert_eq!(err.taxonomy_tag(), "not-found");
    }

    #[test]
    fn delete_removes_all_families() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.put_audio(1, "clip.wav", b"fake audio").unwrap();
        store.put_json(ArtifactKind::Transcript, 1, &serde_json::json!({"x": 1})).unwrap();

        store.delete(1).unwrap();

        assert!(store.get_json::<serde_json::Value>(ArtifactKind::Transcript, 1).is_err());
        assert!(!store.dir_for(ArtifactKind::Audio).join("1").exists());
    }

    #[test]
    fn size_aggregates_bytes_written() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.put_audio(1, "clip.wav", b"0123456789").unwrap();
        store.put_audio(2, "clip2.wav", b"01234").unwrap();
        assert_eq!(store.size(ArtifactKind::Audio).unwrap(), 15);
    }
}
