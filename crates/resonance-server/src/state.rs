//! Shared application state handed to every route handler.

use resonance_artifacts::ArtifactStore;
use resonance_core::config::ResonanceConfig;
use resonance_core::ports::{EmbeddingModel, KeywordIndex, LlmClient, Reranker, VectorStore};
use resonance_retrieval::engine::RetrievalEngine;
use resonance_scheduler::PoolStatusHandle;
use resonance_store::traits::JobStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Type alias for the one retrieval engine instantiation the server needs:
/// every port behind a trait object, since the concrete backend is chosen
/// at the binary boundary, not known to this crate.
pub type DynRetrievalEngine =
    RetrievalEngine<dyn VectorStore, dyn KeywordIndex, dyn EmbeddingModel, dyn LlmClient, dyn Reranker>;

/// Shared across every Axum handler and the WebSocket loop. Cheap to clone:
/// everything inside is already `Arc`, a channel sender, or a handle.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn JobStore>,
    pub artifacts: Arc<ArtifactStore>,
    pub vectors: Arc<dyn VectorStore>,
    pub retrieval: Arc<DynRetrievalEngine>,
    pub pool_status: PoolStatusHandle,
    pub config: Arc<ResonanceConfig>,
    pub events: broadcast::Sender<ResonanceEvent>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn JobStore>,
        artifacts: Arc<ArtifactStore>,
        vectors: Arc<dyn VectorStore>,
        retrieval: Arc<DynRetrievalEngine>,
        pool_status: PoolStatusHandle,
        config: Arc<ResonanceConfig>,
    ) -> Self {
        let (events, _) = broadcast::channel(1024);
        Self { store, artifacts, vectors, retrieval, pool_status, config, events }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ResonanceEvent> {
        self.events.subscribe()
    }

    /// Ignores send errors — no subscribers connected is not a failure.
    pub fn emit_event(&self, event: ResonanceEvent) {
        let _ = self.events.send(event);
    }
}

/// Real-time events broadcast over `/ws`, one per submission stage
/// transition plus alert dispatch — the near-real-time progress surface
/// named in spec §2(d).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResonanceEvent {
    SubmissionProgress {
        submission_id: i64,
        stage: String,
        status: String,
        error: Option<String>,
    },
    AlertRaised {
        severity: String,
        kind: String,
        message: String,
    },
}

impl ResonanceEvent {
    pub fn submission_id(&self) -> Option<i64> {
        match self {
            ResonanceEvent::SubmissionProgress { submission_id, .. } => Some(*submission_id),
            ResonanceEvent::AlertRaised { .. } => None,
        }
    }
}
