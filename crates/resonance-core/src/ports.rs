//! Trait boundaries to collaborators the engine only ever reaches through
//! an interface (spec §1's "out of scope" list): the downloader, the ASR
//! engine, the embedding model, the vector store, the keyword index and
//! the LLM client. Stage workers and the retrieval engine depend on these
//! traits, never on a concrete backend, so tests can swap in fakes.

use crate::error::Result;
use crate::model::{Chunk, Transcript};
use async_trait::async_trait;
use std::path::Path;

/// Result of fetching one source into the Artifact Store's `audio/` tree.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedAudio {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub duration_seconds: f64,
    pub sample_rate: u32,
}

/// Fetches remote audio/video, or reads a local file, into memory as a
/// uniform container (spec §4.3 Downloader).
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn fetch_remote(&self, url: &str) -> Result<DownloadedAudio>;
    async fn read_local(&self, path: &str) -> Result<DownloadedAudio>;
}

/// Speech-to-text backend (spec §4.3 Transcriber).
#[async_trait]
pub trait AsrEngine: Send + Sync {
    async fn transcribe(&self, audio_path: &Path, language_hint: Option<&str>) -> Result<Transcript>;
}

/// Embedding backend turning chunk text into dense vectors (spec §4.3 Embedder).
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Dimensionality of vectors this model produces; used to validate
    /// the vector store's collection at startup.
    fn dimensions(&self) -> usize;
}

/// A single semantic search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub chunk_id: String,
    pub score: f32,
}

/// Dense vector index (spec §4.3 Indexer, §4.6 retrieval).
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()>;
    async fn search(&self, query_vector: &[f32], top_k: u32) -> Result<Vec<VectorHit>>;
    async fn delete_by_submission(&self, submission_id: i64) -> Result<()>;

    /// True if the collection holds no vectors at all — the retrieval
    /// engine's `no-corpus` check (spec §4.6 Failure semantics), distinct
    /// from a query legitimately matching nothing.
    async fn is_empty(&self) -> Result<bool>;

    /// Total vector count, for `GET /health`'s `collection_size`.
    async fn count(&self) -> Result<usize>;

    /// Which of `ids` already have a vector stored — lets the Embedder
    /// (spec §4.3) retry only the chunks a partial failure left unembedded,
    /// rather than re-embedding the whole submission.
    async fn contains_ids(&self, ids: &[String]) -> Result<std::collections::HashSet<String>>;
}

/// A single lexical search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit {
    pub chunk_id: String,
    pub score: f32,
}

/// Sparse/lexical (e.g. BM25) index used by hybrid search (spec §4.6). Also
/// the canonical place retrieval hydrates a chunk id back into source text
/// for the `/query` response, since it already holds full chunk text.
#[async_trait]
pub trait KeywordIndex: Send + Sync {
    async fn index(&self, chunks: &[Chunk]) -> Result<()>;
    async fn search(&self, query_text: &str, top_k: u32) -> Result<Vec<LexicalHit>>;
    async fn delete_by_submission(&self, submission_id: i64) -> Result<()>;
    async fn get_text(&self, chunk_id: &str) -> Result<Option<String>>;
}

/// Chat-completion backend used for query rewriting and answer generation
/// (spec §4.6).
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

/// Cross-encoder-style (query, chunk) relevance scorer used by re-rank
/// (spec §4.6 Re-rank) — kept distinct from `LlmClient` since a re-ranker is
/// typically a separate, cheaper model than the answer-generation LLM.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn score(&self, query: &str, chunk_text: &str) -> Result<f32>;
}

/// Delivers a dispatched `SystemAlert` somewhere a human will see it (spec
/// §4.4 alert-dispatch-sensor, §6 chat-bot protocol). A no-op/log-only
/// implementation is sufficient when no external channel is configured.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(&self, alert: &crate::model::SystemAlert) -> Result<()>;
}
