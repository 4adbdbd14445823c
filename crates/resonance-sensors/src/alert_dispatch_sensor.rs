//! alert-dispatch-sensor (spec §4.4): finds undispatched alerts at or above
//! warning severity and hands each to an `AlertSink`.

use resonance_core::model::AlertSeverity;
use resonance_core::ports::AlertSink;
use resonance_core::Result;
use resonance_store::traits::JobStore;
use std::sync::Arc;

pub struct AlertDispatchSensor<S: ?Sized> {
    store: Arc<dyn JobStore>,
    sink: Arc<S>,
}

impl<S: AlertSink + ?Sized> AlertDispatchSensor<S> {
    pub fn new(store: Arc<dyn JobStore>, sink: Arc<S>) -> Self {
        Self { store, sink }
    }

    /// Returns the number of alerts dispatched this poll.
    pub async fn poll(&self) -> Result<usize> {
        let alerts = self.store.undispatched_alerts(AlertSeverity::Warning).await?;
        let mut dispatched = 0usize;
        for alert in &alerts {
            match self.sink.notify(alert).await {
                Ok(()) => {
                    self.store.mark_alert_dispatched(alert.id).await?;
                    dispatched += 1;
                }
                Err(e) => {
                    tracing::warn!(alert_id = alert.id, error = %e, "alert dispatch failed, will retry next poll");
                }
            }
        }
        Ok(dispatched)
    }
}
