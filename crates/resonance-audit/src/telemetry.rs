//! Append-only JSON Lines telemetry trail of stage transitions and alerts
//! (SPEC_FULL.md §2), covering this workspace's two event families.

use crate::error::{AuditError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// One line of the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    StageTransition,
    AlertRaised,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub ts: DateTime<Utc>,
    pub event: EventKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_stage: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_stage: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_id: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Thread-safe append-only JSONL writer. Every write flushes immediately,
/// favoring durability over throughput.
pub struct TelemetryLogger {
    path: PathBuf,
    writer: Arc<Mutex<BufWriter<File>>>,
}

impl TelemetryLogger {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path).map_err(|_| AuditError::CreateFailed { path: path.clone() })?;

        Ok(Self { path, writer: Arc::new(Mutex::new(BufWriter::new(file))) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn log_event(&self, event: TelemetryEvent) -> Result<()> {
        let json = serde_json::to_string(&event)?;
        let mut writer = self.writer.lock().unwrap();
        writeln!(writer, "{json}")?;
        writer.flush()?;
        Ok(())
    }

    pub fn log_stage_transition(&self, submission_id: i64, from_stage: &str, to_stage: &str) -> Result<()> {
        self.log_event(TelemetryEvent {
            ts: Utc::now(),
            event: EventKind::StageTransition,
            submission_id: Some(submission_id),
            from_stage: Some(from_stage.to_string()),
            to_stage: Some(to_stage.to_string()),
            alert_id: None,
            severity: None,
            message: None,
        })
    }

    pub fn log_alert(&self, alert: &resonance_core::model::SystemAlert) -> Result<()> {
        self.log_event(TelemetryEvent {
            ts: Utc::now(),
            event: EventKind::AlertRaised,
            submission_id: None,
            from_stage: None,
            to_stage: None,
            alert_id: Some(alert.id),
            severity: Some(format!("{:?}", alert.severity).to_lowercase()),
            message: Some(alert.message.clone()),
        })
    }

    pub fn log_custom(&self, message: &str) -> Result<()> {
        self.log_event(TelemetryEvent {
            ts: Utc::now(),
            event: EventKind::Custom,
            submission_id: None,
            from_stage: None,
            to_stage: None,
            alert_id: None,
            severity: None,
            message: Some(message.to_string()),
        })
    }
}

/// Parse a JSONL telemetry trail back into events, for the `dashboard` and
/// `status` CLI subcommands. Blank lines are skipped.
pub fn parse_telemetry_log<P: AsRef<Path>>(path: P) -> Result<Vec<TelemetryEvent>> {
    let contents = std::fs::read_to_string(path)?;
    let mut events = Vec::new();
    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }
        events.push(serde_json::from_str(line)?);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use resonance_core::model::AlertSeverity;
    use tempfile::NamedTempFile;

    #[test]
    fn logs_stage_transition_as_jsonl() {
        let temp = NamedTempFile::new().unwrap();
        let logger = TelemetryLogger::new(temp.path()).unwrap();
        logger.log_stage_transition(42, "downloading", "downloaded").unwrap();

        let events = parse_telemetry_log(temp.path()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, EventKind::StageTransition);
        assert_eq!(events[0].submission_id, Some(42));
        assert_eq!(events[0].from_stage.as_deref(), Some("downloading"));
        assert_eq!(events[0].to_stage.as_deref(), Some("downloaded"));
    }

    #[test]
    fn logs_alert_with_severity_and_message() {
        let temp = NamedTempFile::new().unwrap();
        let logger = TelemetryLogger::new(temp.path()).unwrap();
        let alert = resonance_core::model::SystemAlert {
            id: 7,
            severity: AlertSeverity::Critical,
            kind: "stall".into(),
            message: "submission 3 stalled in downloading".into(),
            created_at: Utc::now(),
            acknowledged_at: None,
            dispatched_at: None,
        };
        logger.log_alert(&alert).unwrap();

        let events = parse_telemetry_log(temp.path()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].alert_id, Some(7));
        assert_eq!(events[0].severity.as_deref(), Some("critical"));
    }

    #[test]
    fn appends_across_multiple_loggers_on_same_path() {
        let temp = NamedTempFile::new().unwrap();
        {
            let logger = TelemetryLogger::new(temp.path()).unwrap();
            logger.log_custom("first").unwrap();
        }
        let logger = TelemetryLogger::new(temp.path()).unwrap();
        logger.log_custom("second").unwrap();

        let events = parse_telemetry_log(temp.path()).unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn skips_blank_lines_when_parsing() {
        let temp = NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "\n\n{\"ts\":\"2026-01-01T00:00:00Z\",\"event\":\"custom\",\"message\":\"x\"}\n\n").unwrap();
        let events = parse_telemetry_log(temp.path()).unwrap();
        assert_eq!(events.len(), 1);
    }
}
