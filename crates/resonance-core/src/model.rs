//! Shared data model for the ingestion-and-retrieval orchestration engine.
//!
//! These types carry no I/O; they are produced and consumed by the Job
//! Store, Stage Workers, Sensors, Scheduler and Retrieval Engine crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline position of a `Submission`.
///
/// Ordered; transitions are monotonic forward except the two terminal
/// states (`Failed`, `Cancelled`), which may be entered from any
/// non-terminal stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Queued,
    Downloading,
    Downloaded,
    Transcribing,
    Transcribed,
    Chunking,
    Chunked,
    Embedding,
    Embedded,
    Indexed,
    Failed,
    Cancelled,
}

impl Stage {
    /// All non-terminal stages in pipeline order.
    pub const ORDER: [Stage; 10] = [
        Stage::Queued,
        Stage::Downloading,
        Stage::Downloaded,
        Stage::Transcribing,
        Stage::Transcribed,
        Stage::Chunking,
        Stage::Chunked,
        Stage::Embedding,
        Stage::Embedded,
        Stage::Indexed,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Failed | Stage::Cancelled)
    }

    /// Ordinal used to derive progress percentage; terminal stages have no
    /// fixed ordinal since they can be reached from anywhere.
    pub fn ordinal(self) -> Option<usize> {
        Self::ORDER.iter().position(|s| *s == self)
    }

    /// Stage reached once a worker finishes the stage named by `self`
    /// (e.g. `Downloading` worker success advances to `Downloaded`).
    pub fn next_done(self) -> Option<Stage> {
        match self {
            Stage::Queued => Some(Stage::Downloaded),
            Stage::Downloading => Some(Stage::Downloaded),
            Stage::Downloaded => Some(Stage::Transcribed),
            Stage::Transcribing => Some(Stage::Transcribed),
            Stage::Transcribed => Some(Stage::Chunked),
            Stage::Chunking => Some(Stage::Chunked),
            Stage::Chunked => Some(Stage::Embedded),
            // Embedder and Indexer are fused (spec §4.3): a successful
            // embed worker run has already confirmed every chunk is
            // present in the Vector Store, so completion skips straight
            // past the transient `Embedded` state to `Indexed`.
            Stage::Embedding => Some(Stage::Indexed),
            Stage::Embedded => Some(Stage::Indexed),
            Stage::Indexed | Stage::Failed | Stage::Cancelled => None,
        }
    }

    /// Done-state stage a worker claims from in order to begin this stage's work.
    pub fn prerequisite(self) -> Option<Stage> {
        match self {
            Stage::Downloading => Some(Stage::Queued),
            Stage::Transcribing => Some(Stage::Downloaded),
            Stage::Chunking => Some(Stage::Transcribed),
            Stage::Embedding => Some(Stage::Chunked),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_value(self).unwrap_or_default();
        write!(f, "{}", s.as_str().unwrap_or("unknown"))
    }
}

/// Worker state within the current stage. Orthogonal to `Stage`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Running,
    Done,
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Pending => write!(f, "pending"),
            Status::Running => write!(f, "running"),
            Status::Done => write!(f, "done"),
            Status::Error => write!(f, "error"),
        }
    }
}

/// Where a submission's audio originated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    RemoteUrl,
    LocalFile,
}

/// A user-initiated request to ingest one media source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Submission {
    pub id: i64,
    pub source_kind: SourceKind,
    pub source: String,
    pub user_id: String,
    pub language_hint: Option<String>,
    pub created_at: DateTime<Utc>,
    pub stage: Stage,
    pub status: Status,
    pub error: Option<String>,
    pub audio_path: Option<String>,
    pub transcript_path: Option<String>,
    pub chunks_path: Option<String>,
    pub indexed_chunk_count: i64,
    pub attempts: i32,
    pub priority: i32,
    pub claim_owner: Option<String>,
    pub claim_deadline: Option<DateTime<Utc>>,
    /// Earliest time a retried submission becomes claimable again
    /// (exponential backoff after a retriable failure).
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub cancel_requested: bool,
    pub archived: bool,
}

/// Progress snapshot derived from `stage`/`status`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Progress {
    pub stage: Stage,
    pub status: Status,
    pub percent: f32,
}

/// A file registered with the Artifact Store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioArtifact {
    pub id: i64,
    pub submission_id: i64,
    pub path: String,
    pub byte_size: u64,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub language: Option<String>,
}

/// A single ASR segment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// JSON `{language, duration, segments, full_text}`, stable across versions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transcript {
    pub language: String,
    pub duration: f64,
    pub segments: Vec<TranscriptSegment>,
    pub full_text: String,
}

/// A bounded, overlapping text window derived from a transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub submission_id: i64,
    pub ordinal: u32,
    pub text: String,
    pub char_count: usize,
    pub segment_range: (u32, u32),
}

impl Chunk {
    /// Deterministic chunk id: `hash(submission_id, ordinal)`, matching the
    /// invariant that chunking is idempotent across retries.
    pub fn make_id(submission_id: i64, ordinal: u32) -> String {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        submission_id.hash(&mut hasher);
        ordinal.hash(&mut hasher);
        format!("chunk-{:016x}", hasher.finish())
    }
}

/// A user query and the answer returned by the Retrieval Engine. Immutable
/// once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryEvent {
    pub id: i64,
    pub user_id: String,
    pub query_text: String,
    pub top_k: u32,
    pub variant: String,
    pub rewriting_applied: bool,
    pub response_text: String,
    pub response_time_ms: u64,
    pub retrieved_chunk_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// User sentiment about a `QueryEvent`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackRating {
    Positive,
    Negative,
    DetailRequested,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackEvent {
    pub id: i64,
    pub query_event_id: i64,
    pub rating: FeedbackRating,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Discriminated union over the finite set of scheduler-internal job kinds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum PipelineJobKind {
    ProcessSubmission { submission_id: i64 },
    HealthCheck { evaluation_time: DateTime<Utc> },
    Cleanup { evaluation_time: DateTime<Utc> },
    AlertDispatch { alert_id: i64 },
}

impl PipelineJobKind {
    /// Sensor-idempotency comparison (spec §4.4): `evaluation_time` is a
    /// fresh timestamp on every poll, so two `HealthCheck`/`Cleanup` jobs
    /// are the "same" job regardless of it; `ProcessSubmission` and
    /// `AlertDispatch` carry a stable id and must match exactly.
    pub fn same_family(&self, other: &Self) -> bool {
        match (self, other) {
            (PipelineJobKind::ProcessSubmission { submission_id: a }, PipelineJobKind::ProcessSubmission { submission_id: b }) => a == b,
            (PipelineJobKind::AlertDispatch { alert_id: a }, PipelineJobKind::AlertDispatch { alert_id: b }) => a == b,
            (PipelineJobKind::HealthCheck { .. }, PipelineJobKind::HealthCheck { .. }) => true,
            (PipelineJobKind::Cleanup { .. }, PipelineJobKind::Cleanup { .. }) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineJobStatus {
    Pending,
    Running,
    Done,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineJob {
    pub id: i64,
    pub kind: PipelineJobKind,
    pub priority: i32,
    pub scheduled_at: DateTime<Utc>,
    pub status: PipelineJobStatus,
    pub attempt_count: i32,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemAlert {
    pub id: i64,
    pub severity: AlertSeverity,
    pub kind: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub dispatched_at: Option<DateTime<Utc>>,
}

/// Retrieval variant, used both at serve time and by the evaluation harness.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalVariant {
    Semantic,
    Hybrid,
    HybridRerank,
    RewriteHybridRerank,
}

impl fmt::Display for RetrievalVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RetrievalVariant::Semantic => "semantic",
            RetrievalVariant::Hybrid => "hybrid",
            RetrievalVariant::HybridRerank => "hybrid+rerank",
            RetrievalVariant::RewriteHybridRerank => "rewrite+hybrid+rerank",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for RetrievalVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "semantic" => Ok(RetrievalVariant::Semantic),
            "hybrid" => Ok(RetrievalVariant::Hybrid),
            "hybrid+rerank" => Ok(RetrievalVariant::HybridRerank),
            "rewrite+hybrid+rerank" => Ok(RetrievalVariant::RewriteHybridRerank),
            other => Err(format!("unknown retrieval variant: {other}")),
        }
    }
}
