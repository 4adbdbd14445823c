//! health-sensor (spec §4.4): always runs, computes metrics from the Job
//! Store and raises a `SystemAlert` whenever a threshold is breached.

use resonance_core::config::AlertThresholds;
use resonance_core::model::AlertSeverity;
use resonance_core::Result;
use resonance_store::traits::JobStore;
use std::sync::Arc;

pub struct HealthSensor {
    store: Arc<dyn JobStore>,
    thresholds: AlertThresholds,
}

impl HealthSensor {
    pub fn new(store: Arc<dyn JobStore>, thresholds: AlertThresholds) -> Self {
        Self { store, thresholds }
    }

    /// Returns the alerts raised this poll (empty when everything is within
    /// threshold).
    pub async fn poll(&self) -> Result<Vec<i64>> {
        let stats = self.store.stats().await?;
        let mut raised = Vec::new();

        if stats.total_submissions > 0 {
            let failure_rate = stats.failed_count as f64 / stats.total_submissions as f64;
            if failure_rate > self.thresholds.failure_rate_threshold {
                let id = self
                    .store
                    .record_alert(
                        AlertSeverity::Warning,
                        "failure-rate",
                        &format!(
                            "failure rate {:.1}% exceeds threshold {:.1}%",
                            failure_rate * 100.0,
                            self.thresholds.failure_rate_threshold * 100.0
                        ),
                    )
                    .await?;
                raised.push(id);
            }
        }

        if stats.pending_count > self.thresholds.backlog_threshold {
            let id = self
                .store
                .record_alert(
                    AlertSeverity::Warning,
                    "backlog",
                    &format!("pending backlog {} exceeds threshold {}", stats.pending_count, self.thresholds.backlog_threshold),
                )
                .await?;
            raised.push(id);
        }

        if stats.lease_expirations_last_hour > self.thresholds.lease_expirations_per_hour {
            let id = self
                .store
                .record_alert(
                    AlertSeverity::Error,
                    "lease-expirations",
                    &format!(
                        "{} claim leases expired in the last hour (threshold {})",
                        stats.lease_expirations_last_hour, self.thresholds.lease_expirations_per_hour
                    ),
                )
                .await?;
            raised.push(id);
        }

        Ok(raised)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resonance_core::model::SourceKind;
    use resonance_store::mock::MockJobStore;

    #[tokio::test]
    async fn healthy_store_raises_nothing() {
        let store: Arc<dyn JobStore> = Arc::new(MockJobStore::new());
        store
            .insert_submission(SourceKind::RemoteUrl, "https://example/a", "u1", None, chrono::Duration::hours(24), 1000)
            .await
            .unwrap();
        let sensor = HealthSensor::new(store, AlertThresholds::default());
        assert!(sensor.poll().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn backlog_above_threshold_raises_an_alert() {
        let store: Arc<dyn JobStore> = Arc::new(MockJobStore::new());
        for i in 0..3 {
            store
                .insert_submission(SourceKind::RemoteUrl, &format!("https://example/{i}"), "u1", None, chrono::Duration::hours(24), 1000)
                .await
                .unwrap();
        }
        let sensor = HealthSensor::new(store, AlertThresholds { backlog_threshold: 2, ..AlertThresholds::default() });
        assert_eq!(sensor.poll().await.unwrap().len(), 1);
    }
}
