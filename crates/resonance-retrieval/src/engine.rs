//! The Retrieval Engine (spec §4.6): variant dispatch, answer generation,
//! Query Event recording, and the two named failure paths.

use crate::hybrid::{blend, ScoredChunk};
use crate::rerank::rerank;
use crate::rewrite::rewrite_query;
use crate::rrf::reciprocal_rank_fusion;
use resonance_core::config::RetrievalConfig;
use resonance_core::model::{QueryEvent, RetrievalVariant};
use resonance_core::ports::{EmbeddingModel, KeywordIndex, LlmClient, Reranker, VectorStore};
use resonance_core::{Result, ResonanceError};
use resonance_store::traits::JobStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// One retrieved chunk surfaced in a query response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceChunk {
    pub chunk_id: String,
    pub score: f32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub user_id: String,
    pub question: String,
    pub top_k: u32,
    /// Falls back to `RetrievalConfig`'s variant default when unset.
    pub variant: Option<RetrievalVariant>,
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<SourceChunk>,
    pub response_time_ms: u64,
}

const DEFAULT_ANSWER_SYSTEM_PROMPT: &str = "Answer the user's question using only the provided context chunks. \
If the context doesn't contain the answer, say so plainly.";

/// Placeholder answer substituted when the LLM call fails after retries
/// (spec §4.6 Failure semantics): the Query Event is still recorded, and
/// the retrieved chunks are still returned to the caller.
const LLM_FAILURE_PLACEHOLDER: &str = "(answer generation failed; showing retrieved sources only)";

pub struct RetrievalEngine<V: ?Sized, K: ?Sized, E: ?Sized, L: ?Sized, R: ?Sized> {
    vectors: Arc<V>,
    keywords: Arc<K>,
    embedder: Arc<E>,
    llm: Arc<L>,
    reranker: Arc<R>,
    store: Arc<dyn JobStore>,
    config: RetrievalConfig,
}

impl<V, K, E, L, R> RetrievalEngine<V, K, E, L, R>
where
    V: VectorStore + ?Sized,
    K: KeywordIndex + ?Sized,
    E: EmbeddingModel + ?Sized,
    L: LlmClient + ?Sized,
    R: Reranker + ?Sized,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(vectors: Arc<V>, keywords: Arc<K>, embedder: Arc<E>, llm: Arc<L>, reranker: Arc<R>, store: Arc<dyn JobStore>, config: RetrievalConfig) -> Self {
        Self { vectors, keywords, embedder, llm, reranker, store, config }
    }

    /// Runs the configured (or requested) variant, generates an answer, and
    /// records the Query Event before returning — spec §5's "Query Events
    /// are written before the response returns to the caller".
    pub async fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
        let started = Instant::now();

        if self.vectors.is_empty().await? {
            return Err(ResonanceError::NotFound("no-corpus: vector store is empty".into()));
        }

        let variant = request.variant.unwrap_or(RetrievalVariant::Hybrid);
        let (ranked, rewriting_applied) = self.retrieve(&request.question, request.top_k, variant).await?;

        let mut sources = Vec::with_capacity(ranked.len());
        for hit in &ranked {
            let text = self.keywords.get_text(&hit.chunk_id).await?.unwrap_or_default();
            sources.push(SourceChunk { chunk_id: hit.chunk_id.clone(), score: hit.score, text });
        }

        let system_prompt = request.system_prompt.as_deref().unwrap_or(DEFAULT_ANSWER_SYSTEM_PROMPT);
        let answer = match self.generate_answer(system_prompt, &request.question, &sources).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "answer generation failed, returning placeholder");
                LLM_FAILURE_PLACEHOLDER.to_string()
            }
        };

        let response_time_ms = started.elapsed().as_millis() as u64;

        let event = QueryEvent {
            id: 0,
            user_id: request.user_id,
            query_text: request.question,
            top_k: request.top_k,
            variant: variant.to_string(),
            rewriting_applied,
            response_text: answer.clone(),
            response_time_ms,
            retrieved_chunk_ids: sources.iter().map(|s| s.chunk_id.clone()).collect(),
            created_at: chrono::Utc::now(),
        };
        self.store.record_query_event(&event).await?;

        Ok(QueryResponse { answer, sources, response_time_ms })
    }

    async fn generate_answer(&self, system_prompt: &str, question: &str, sources: &[SourceChunk]) -> Result<String> {
        let context = sources
            .iter()
            .enumerate()
            .map(|(i, s)| format!("[{i}] {}", s.text))
            .collect::<Vec<_>>()
            .join("\n\n");
        let user_prompt = format!("Context:\n{context}\n\nQuestion: {question}");
        let timeout = std::time::Duration::from_secs(self.config.llm_timeout_secs);
        tokio::time::timeout(timeout, self.llm.complete(system_prompt, &user_prompt))
            .await
            .map_err(|_| ResonanceError::TransientNetwork(format!("LLM call exceeded {}s timeout", timeout.as_secs())))?
    }

    /// Dispatches to the configured variant, returning `(top_k ranked
    /// chunks, whether query rewriting ran)`.
    async fn retrieve(&self, question: &str, top_k: u32, variant: RetrievalVariant) -> Result<(Vec<ScoredChunk>, bool)> {
        match variant {
            RetrievalVariant::Semantic => Ok((self.semantic_search(question, top_k).await?, false)),
            RetrievalVariant::Hybrid => Ok((self.hybrid_search(question, top_k).await?, false)),
            RetrievalVariant::HybridRerank => {
                let pool = self.hybrid_search(question, top_k * self.config.rerank_pool_multiplier as u32).await?;
                Ok((self.rerank_pool(question, pool, top_k).await?, false))
            }
            RetrievalVariant::RewriteHybridRerank => {
                let variants = rewrite_query(&*self.llm, question, self.config.rewrite_variants, self.config.llm_timeout_secs).await?;
                let mut queries = vec![question.to_string()];
                queries.extend(variants);

                let mut lists = Vec::with_capacity(queries.len());
                for q in &queries {
                    lists.push(self.hybrid_search(q, top_k * self.config.rerank_pool_multiplier as u32).await?);
                }
                let fused = reciprocal_rank_fusion(&lists, self.config.rrf_k);
                Ok((self.rerank_pool(question, fused, top_k).await?, true))
            }
        }
    }

    async fn semantic_search(&self, question: &str, top_k: u32) -> Result<Vec<ScoredChunk>> {
        let query_vector = self.embed_query(question).await?;
        let hits = self.vectors.search(&query_vector, top_k).await?;
        Ok(hits.into_iter().map(|h| ScoredChunk { chunk_id: h.chunk_id, score: h.score }).collect())
    }

    async fn hybrid_search(&self, question: &str, top_k: u32) -> Result<Vec<ScoredChunk>> {
        let query_vector = self.embed_query(question).await?;
        let semantic = self.vectors.search(&query_vector, top_k).await?;
        let lexical = self.keywords.search(question, top_k).await?;
        let mut blended = blend(&semantic, &lexical, self.config.semantic_weight, self.config.lexical_weight);
        blended.truncate(top_k as usize);
        Ok(blended)
    }

    async fn embed_query(&self, question: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embedder.embed_batch(&[question.to_string()]).await?;
        Ok(vectors.pop().unwrap_or_default())
    }

    async fn rerank_pool(&self, question: &str, pool: Vec<ScoredChunk>, top_n: u32) -> Result<Vec<ScoredChunk>> {
        let mut candidates = Vec::with_capacity(pool.len());
        for chunk in pool {
            let text = self.keywords.get_text(&chunk.chunk_id).await?.unwrap_or_default();
            candidates.push((chunk, text));
        }
        rerank(&*self.reranker, question, &candidates, top_n, self.config.rerank_timeout_secs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use resonance_core::ports::{LexicalHit, VectorHit};
    use resonance_store::mock::MockJobStore;
    use std::sync::Mutex;

    struct FakeEmbedder;

    #[async_trait]
    impl EmbeddingModel for FakeEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
        fn dimensions(&self) -> usize {
            2
        }
    }

    struct FakeVectorStore {
        hits: Vec<VectorHit>,
        empty: bool,
    }

    #[async_trait]
    impl VectorStore for FakeVectorStore {
        async fn upsert(&self, _chunks: &[resonance_core::model::Chunk], _vectors: &[Vec<f32>]) -> Result<()> {
            Ok(())
        }
        async fn search(&self, _query_vector: &[f32], top_k: u32) -> Result<Vec<VectorHit>> {
            Ok(self.hits.iter().take(top_k as usize).cloned().collect())
        }
        async fn delete_by_submission(&self, _submission_id: i64) -> Result<()> {
            Ok(())
        }
        async fn is_empty(&self) -> Result<bool> {
            Ok(self.empty)
        }
        async fn count(&self) -> Result<usize> {
            Ok(self.hits.len())
        }
        async fn contains_ids(&self, ids: &[String]) -> Result<std::collections::HashSet<String>> {
            Ok(ids.iter().filter(|id| self.hits.iter().any(|h| &h.chunk_id == *id)).cloned().collect())
        }
    }

    struct FakeKeywordIndex {
        hits: Vec<LexicalHit>,
        texts: std::collections::HashMap<String, String>,
    }

    #[async_trait]
    impl KeywordIndex for FakeKeywordIndex {
        async fn index(&self, _chunks: &[resonance_core::model::Chunk]) -> Result<()> {
            Ok(())
        }
        async fn search(&self, _query_text: &str, top_k: u32) -> Result<Vec<LexicalHit>> {
            Ok(self.hits.iter().take(top_k as usize).cloned().collect())
        }
        async fn delete_by_submission(&self, _submission_id: i64) -> Result<()> {
            Ok(())
        }
        async fn get_text(&self, chunk_id: &str) -> Result<Option<String>> {
            Ok(self.texts.get(chunk_id).cloned())
        }
    }

    struct FakeLlm(Mutex<Option<String>>);

    #[async_trait]
    impl LlmClient for FakeLlm {
        async fn complete(&self, _system_prompt: &str, _user_prompt: &str) -> Result<String> {
            match self.0.lock().unwrap().clone() {
                Some(text) => Ok(text),
                None => Err(ResonanceError::ModelFailure("llm down".into())),
            }
        }
    }

    struct FakeReranker;

    #[async_trait]
    impl Reranker for FakeReranker {
        async fn score(&self, _query: &str, chunk_text: &str) -> Result<f32> {
            Ok(chunk_text.len() as f32)
        }
    }

    fn make_engine(
        hits: Vec<VectorHit>,
        lexical: Vec<LexicalHit>,
        texts: std::collections::HashMap<String, String>,
        llm_answer: Option<String>,
        empty: bool,
    ) -> RetrievalEngine<FakeVectorStore, FakeKeywordIndex, FakeEmbedder, FakeLlm, FakeReranker> {
        RetrievalEngine::new(
            Arc::new(FakeVectorStore { hits, empty }),
            Arc::new(FakeKeywordIndex { hits: lexical, texts }),
            Arc::new(FakeEmbedder),
            Arc::new(FakeLlm(Mutex::new(llm_answer))),
            Arc::new(FakeReranker),
            Arc::new(MockJobStore::new()),
            RetrievalConfig::default(),
        )
    }

    fn req(question: &str, variant: RetrievalVariant) -> QueryRequest {
        QueryRequest { user_id: "u1".into(), question: question.into(), top_k: 2, variant: Some(variant), system_prompt: None }
    }

    #[tokio::test]
    async fn empty_vector_store_returns_no_corpus() {
        let engine = make_engine(vec![], vec![], Default::default(), Some("ok".into()), true);
        let err = engine.query(req("brown", RetrievalVariant::Semantic)).await.unwrap_err();
        assert_eq!(err.taxonomy_tag(), "not-found");
    }

    /// Spec §8 scenario 2: query "brown" vs mocked chunks, hybrid variant,
    /// top_k=2 — ordinals [0, 1] or [1, 0] depending on lexical weighting.
    #[tokio::test]
    async fn hybrid_query_returns_both_candidate_chunks() {
        let hits = vec![VectorHit { chunk_id: "c0".into(), score: 0.9 }, VectorHit { chunk_id: "c1".into(), score: 0.8 }];
        let lexical = vec![LexicalHit { chunk_id: "c1".into(), score: 1.0 }, LexicalHit { chunk_id: "c0".into(), score: 0.2 }];
        let mut texts = std::collections::HashMap::new();
        texts.insert("c0".to_string(), "the quick brown ".to_string());
        texts.insert("c1".to_string(), "ick brown fox".to_string());
        let engine = make_engine(hits, lexical, texts, Some("a fox".into()), false);

        let response = engine.query(req("brown", RetrievalVariant::Hybrid)).await.unwrap();
        let mut ids: Vec<&str> = response.sources.iter().map(|s| s.chunk_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["c0", "c1"]);
        assert_eq!(response.answer, "a fox");
    }

    #[tokio::test]
    async fn llm_failure_falls_back_to_placeholder_but_still_returns_sources() {
        let hits = vec![VectorHit { chunk_id: "c0".into(), score: 0.9 }];
        let mut texts = std::collections::HashMap::new();
        texts.insert("c0".to_string(), "some text".to_string());
        let engine = make_engine(hits, vec![], texts, None, false);

        let response = engine.query(req("q", RetrievalVariant::Semantic)).await.unwrap();
        assert_eq!(response.answer, LLM_FAILURE_PLACEHOLDER);
        assert_eq!(response.sources.len(), 1);
    }

    #[tokio::test]
    async fn hybrid_rerank_truncates_to_top_n() {
        let hits = vec![
            VectorHit { chunk_id: "c0".into(), score: 0.9 },
            VectorHit { chunk_id: "c1".into(), score: 0.8 },
            VectorHit { chunk_id: "c2".into(), score: 0.7 },
        ];
        let mut texts = std::collections::HashMap::new();
        texts.insert("c0".to_string(), "short".to_string());
        texts.insert("c1".to_string(), "a much longer piece of text".to_string());
        texts.insert("c2".to_string(), "mid length text".to_string());
        let engine = make_engine(hits, vec![], texts, Some("answer".into()), false);

        let response = engine.query(req("q", RetrievalVariant::HybridRerank)).await.unwrap();
        assert_eq!(response.sources.len(), 2);
        assert_eq!(response.sources[0].chunk_id, "c1");
    }
}
