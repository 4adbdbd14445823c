//! Concrete `AlertSink` implementations (spec §4.4 alert-dispatch-sensor).

use crate::telemetry::TelemetryLogger;
use async_trait::async_trait;
use resonance_core::model::SystemAlert;
use resonance_core::ports::AlertSink;
use resonance_core::Result;
use std::path::Path;

/// Writes every dispatched alert as a JSONL line via `TelemetryLogger`. The
/// default sink when no external notification channel (email, chat webhook)
/// is configured — satisfies "a human will see it" by putting alerts on disk
/// where `status`/`dashboard` can surface them.
pub struct JsonlAlertSink {
    logger: TelemetryLogger,
}

impl JsonlAlertSink {
    pub fn new<P: AsRef<Path>>(path: P) -> crate::error::Result<Self> {
        Ok(Self { logger: TelemetryLogger::new(path)? })
    }
}

#[async_trait]
impl AlertSink for JsonlAlertSink {
    async fn notify(&self, alert: &SystemAlert) -> Result<()> {
        self.logger.log_alert(alert).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::parse_telemetry_log;
    use chrono::Utc;
    use resonance_core::model::AlertSeverity;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn notify_appends_alert_as_jsonl() {
        let temp = NamedTempFile::new().unwrap();
        let sink = JsonlAlertSink::new(temp.path()).unwrap();
        let alert = SystemAlert {
            id: 1,
            severity: AlertSeverity::Warning,
            kind: "stall".into(),
            message: "submission 5 stalled".into(),
            created_at: Utc::now(),
            acknowledged_at: None,
            dispatched_at: None,
        };

        sink.notify(&alert).await.unwrap();

        let events = parse_telemetry_log(temp.path()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].alert_id, Some(1));
    }
}
