//! url-sensor (spec §4.4): submissions sitting in `queued`/`pending` need a
//! Pipeline Job so the Scheduler picks them up on its next claim pass.

use chrono::Utc;
use resonance_core::model::{PipelineJobKind, Stage};
use resonance_core::Result;
use resonance_store::traits::JobStore;
use std::sync::Arc;

pub struct UrlSensor {
    store: Arc<dyn JobStore>,
}

impl UrlSensor {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Returns the number of Pipeline Jobs newly enqueued. Idempotent:
    /// a submission already carrying a pending/running `ProcessSubmission`
    /// job is skipped.
    pub async fn poll(&self, limit: i64) -> Result<usize> {
        let queued = self.store.list_pending(Stage::Queued, limit).await?;
        let mut enqueued = 0usize;
        for submission in queued {
            let kind = PipelineJobKind::ProcessSubmission { submission_id: submission.id };
            if self.store.pipeline_job_exists(&kind).await? {
                continue;
            }
            self.store.enqueue_pipeline_job(kind, submission.priority, Utc::now()).await?;
            enqueued += 1;
        }
        Ok(enqueued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resonance_store::mock::MockJobStore;

    #[tokio::test]
    async fn enqueues_each_queued_submission_once() {
        let store: Arc<dyn JobStore> = Arc::new(MockJobStore::new());
        store
            .insert_submission(
                resonance_core::model::SourceKind::RemoteUrl,
                "https://example/a",
                "u1",
                None,
                chrono::Duration::hours(24),
                1000,
            )
            .await
            .unwrap();

        let sensor = UrlSensor::new(store.clone());
        assert_eq!(sensor.poll(10).await.unwrap(), 1);
        // Second poll against unchanged state enqueues nothing new.
        assert_eq!(sensor.poll(10).await.unwrap(), 0);
    }
}
