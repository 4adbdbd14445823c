//! Assembles the concrete component graph the Scheduler, Retrieval Engine
//! and HTTP control plane all share: opens the Job Store, wires the default
//! adapters from [`crate::adapters`] into the stage workers, and reads the
//! environment variables spec §6 names.

use crate::adapters::{
    alert::{ChatAlertSink, CompositeAlertSink},
    asr::StubAsrEngine,
    downloader::HttpDownloader,
    embedding::HashedEmbedder,
    llm::OpenAiCompatibleClient,
    memory_index::{InMemoryKeywordIndex, InMemoryVectorStore},
    reranker::OverlapReranker,
};
use resonance_artifacts::ArtifactStore;
use resonance_audit::sinks::JsonlAlertSink;
use resonance_core::config::{env, ResonanceConfig};
use resonance_core::ports::{AlertSink, AsrEngine, Downloader, EmbeddingModel, KeywordIndex, LlmClient, Reranker, VectorStore};
use resonance_retrieval::engine::RetrievalEngine;
use resonance_scheduler::Scheduler;
use resonance_store::traits::JobStore;
use resonance_store::SqliteJobStore;
use resonance_workers::{ChunkerWorker, DownloaderWorker, EmbedderWorker, TranscriberWorker};
use std::sync::Arc;

pub type DynRetrievalEngine = RetrievalEngine<dyn VectorStore, dyn KeywordIndex, dyn EmbeddingModel, dyn LlmClient, dyn Reranker>;

/// Every long-lived component a one-shot CLI command or the daemon might need.
pub struct Engine {
    pub config: Arc<ResonanceConfig>,
    pub store: Arc<dyn JobStore>,
    pub artifacts: Arc<ArtifactStore>,
    pub vectors: Arc<dyn VectorStore>,
    pub keywords: Arc<dyn KeywordIndex>,
    pub embedder: Arc<dyn EmbeddingModel>,
    pub llm: Option<Arc<dyn LlmClient>>,
    pub retrieval: Option<Arc<DynRetrievalEngine>>,
    pub alert_sink: Arc<dyn AlertSink>,
    pub downloader: Arc<dyn Downloader>,
    pub asr: Arc<dyn AsrEngine>,
}

/// Loads `./resonance.toml` (or `~/.resonance/resonance.toml`), applies
/// `DATA_ROOT`, and opens every store/adapter needed to run a command.
/// `LLM_API_KEY` is required for anything that touches the Retrieval
/// Engine (spec §6); its absence is not fatal here; `retrieval`/`llm` are
/// `None` and callers that need them report the missing key themselves.
pub async fn assemble() -> anyhow::Result<Engine> {
    let config = load_config().apply_env_overrides();
    std::fs::create_dir_all(&config.data_root)?;
    let config = Arc::new(config);

    let store: Arc<dyn JobStore> = Arc::new(SqliteJobStore::open(config.jobstore_path().to_str().unwrap_or("jobstore.db")).await?);
    let artifacts = Arc::new(ArtifactStore::new(config.data_root.clone()));

    let vectors: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
    let keywords: Arc<dyn KeywordIndex> = Arc::new(InMemoryKeywordIndex::new());
    let embedder: Arc<dyn EmbeddingModel> = Arc::new(HashedEmbedder::new());
    let downloader: Arc<dyn Downloader> = Arc::new(HttpDownloader::new());
    let asr: Arc<dyn AsrEngine> = Arc::new(StubAsrEngine::new());

    std::fs::create_dir_all(config.logs_dir())?;
    let log_sink = JsonlAlertSink::new(config.logs_dir().join("alerts.jsonl"))?;
    let chat_sink = match (std::env::var(env::BOT_TOKEN), std::env::var(env::ADMIN_CHAT_ID)) {
        (Ok(token), Ok(chat_id)) => Some(ChatAlertSink::new(token, chat_id)),
        _ => None,
    };
    let alert_sink: Arc<dyn AlertSink> = Arc::new(CompositeAlertSink::new(log_sink, chat_sink));

    let llm: Option<Arc<dyn LlmClient>> = std::env::var(env::LLM_API_KEY).ok().map(|key| Arc::new(OpenAiCompatibleClient::new(key)) as Arc<dyn LlmClient>);
    let reranker: Arc<dyn Reranker> = Arc::new(OverlapReranker);

    let retrieval = llm.clone().map(|llm| {
        Arc::new(RetrievalEngine::new(vectors.clone(), keywords.clone(), embedder.clone(), llm, reranker, store.clone(), config.retrieval.clone()))
    });

    Ok(Engine { config, store, artifacts, vectors, keywords, embedder, llm, retrieval, alert_sink, downloader, asr })
}

impl Engine {
    /// Builds a fully wired `Scheduler` plus the handle callers take before
    /// spawning `run()` (spec §4.5). Only the daemon path needs this; the
    /// one-shot subcommands talk to the Job Store/Artifact Store directly.
    pub fn scheduler(&self, worker_id: impl Into<String>) -> Scheduler {
        let downloader_worker = Arc::new(DownloaderWorker::new(self.downloader.clone(), self.artifacts.clone()));
        let transcriber_worker = Arc::new(TranscriberWorker::with_timeout(self.asr.clone(), self.artifacts.clone(), self.config.asr_timeout_secs));
        let chunker_worker = Arc::new(ChunkerWorker::new(self.config.chunking, self.artifacts.clone()));
        let embedder_worker = Arc::new(EmbedderWorker::new(
            self.embedder.clone(),
            self.vectors.clone(),
            self.keywords.clone(),
            self.config.embedding.clone(),
            self.artifacts.clone(),
        ));

        Scheduler::new(
            worker_id,
            self.store.clone(),
            self.artifacts.clone(),
            downloader_worker,
            transcriber_worker,
            chunker_worker,
            embedder_worker,
            self.alert_sink.clone(),
            self.config.data_root.join("ingress"),
            self.config.clone(),
        )
    }
}

/// Tries `./resonance.toml`, then `~/.resonance/resonance.toml`, falling
/// back to defaults.
fn load_config() -> ResonanceConfig {
    let project_local = std::path::Path::new("resonance.toml");
    if project_local.exists() {
        return ResonanceConfig::load_with_fallback(project_local);
    }

    if let Some(home) = dirs::home_dir() {
        let user_config = home.join(".resonance").join("resonance.toml");
        if user_config.exists() {
            return ResonanceConfig::load_with_fallback(&user_config);
        }
    }

    ResonanceConfig::default()
}
