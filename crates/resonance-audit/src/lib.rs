//! Append-only JSONL telemetry trail and alert-sink implementations
//! (SPEC_FULL.md §0/§2).

pub mod beacon;
pub mod error;
pub mod sinks;
pub mod telemetry;

pub use beacon::{JobSummary, JobSummaryBuilder};
pub use sinks::JsonlAlertSink;
pub use telemetry::{parse_telemetry_log, EventKind, TelemetryEvent, TelemetryLogger};
