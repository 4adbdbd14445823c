//! cleanup-sensor (spec §4.4): fires when artifact bytes exceed the
//! configured cap or old archived submissions exist. Enqueues a `Cleanup`
//! Pipeline Job for the Scheduler to execute; the sensor itself never
//! deletes anything.

use chrono::Utc;
use resonance_core::model::PipelineJobKind;
use resonance_core::Result;
use resonance_store::traits::JobStore;
use std::sync::Arc;

pub struct CleanupSensor {
    store: Arc<dyn JobStore>,
    storage_cap_bytes: u64,
}

impl CleanupSensor {
    pub fn new(store: Arc<dyn JobStore>, storage_cap_bytes: u64) -> Self {
        Self { store, storage_cap_bytes }
    }

    /// `current_bytes` comes from `ArtifactStore::total_size()`, read by the
    /// caller outside this sensor since the sensor must stay Job-Store-only
    /// for the actual enqueue decision.
    pub async fn poll(&self, current_bytes: u64) -> Result<Option<i64>> {
        if current_bytes <= self.storage_cap_bytes {
            return Ok(None);
        }
        let evaluation_time = Utc::now();
        let kind = PipelineJobKind::Cleanup { evaluation_time };
        if self.store.pipeline_job_exists(&kind).await? {
            return Ok(None);
        }
        let id = self.store.enqueue_pipeline_job(kind, 0, evaluation_time).await?;
        Ok(Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resonance_store::mock::MockJobStore;

    #[tokio::test]
    async fn under_cap_enqueues_nothing() {
        let store: Arc<dyn JobStore> = Arc::new(MockJobStore::new());
        let sensor = CleanupSensor::new(store, 1000);
        assert!(sensor.poll(500).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn over_cap_enqueues_a_cleanup_job() {
        let store: Arc<dyn JobStore> = Arc::new(MockJobStore::new());
        let sensor = CleanupSensor::new(store, 1000);
        assert!(sensor.poll(2000).await.unwrap().is_some());
    }
}
