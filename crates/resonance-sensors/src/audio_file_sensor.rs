//! audio-file-sensor (spec §4.4): watches an ingress directory for files not
//! yet registered as a submission. Registration happens purely through the
//! Job Store's own dedup semantics, so the sensor stays side-effect-free
//! except through it: each file is offered to `insert_submission` and a
//! `DuplicateSource`/`Backpressure` result is treated as "already handled".

use resonance_core::model::SourceKind;
use resonance_core::{Result, ResonanceError};
use resonance_store::traits::JobStore;
use std::path::PathBuf;
use std::sync::Arc;

pub struct AudioFileSensor {
    store: Arc<dyn JobStore>,
    ingress_dir: PathBuf,
}

impl AudioFileSensor {
    pub fn new(store: Arc<dyn JobStore>, ingress_dir: impl Into<PathBuf>) -> Self {
        Self { store, ingress_dir: ingress_dir.into() }
    }

    /// Returns the number of new submissions registered this poll.
    pub async fn poll(&self, dedup_window: chrono::Duration, backpressure_high_water_mark: i64) -> Result<usize> {
        let dir = self.ingress_dir.clone();
        if !dir.exists() {
            return Ok(0);
        }
        let mut registered = 0usize;
        let entries = std::fs::read_dir(&dir).map_err(anyhow::Error::from)?;
        for entry in entries {
            let entry = entry.map_err(anyhow::Error::from)?;
            if !entry.file_type().map_err(anyhow::Error::from)?.is_file() {
                continue;
            }
            let path = entry.path();
            let path_str = path.to_string_lossy().into_owned();
            match self
                .store
                .insert_submission(SourceKind::LocalFile, &path_str, "system", None, dedup_window, backpressure_high_water_mark)
                .await
            {
                Ok(_) => registered += 1,
                Err(ResonanceError::DuplicateSource) | Err(ResonanceError::Backpressure) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(registered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resonance_store::mock::MockJobStore;

    #[tokio::test]
    async fn registers_each_file_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clip.wav"), b"fake").unwrap();
        let store: Arc<dyn JobStore> = Arc::new(MockJobStore::new());
        let sensor = AudioFileSensor::new(store, dir.path());

        let first = sensor.poll(chrono::Duration::hours(24), 1000).await.unwrap();
        let second = sensor.poll(chrono::Duration::hours(24), 1000).await.unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 0);
    }

    #[tokio::test]
    async fn missing_ingress_dir_is_not_an_error() {
        let store: Arc<dyn JobStore> = Arc::new(MockJobStore::new());
        let sensor = AudioFileSensor::new(store, "/does/not/exist");
        assert_eq!(sensor.poll(chrono::Duration::hours(24), 1000).await.unwrap(), 0);
    }
}
