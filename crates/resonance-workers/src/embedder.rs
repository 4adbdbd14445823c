//! Embedder+Indexer stage worker (spec §4.3). The two are fused: once every
//! chunk's vector is confirmed present in the Vector Store the submission
//! advances straight to `indexed`.

use resonance_artifacts::{ArtifactKind, ArtifactStore};
use resonance_core::config::EmbeddingConfig;
use resonance_core::error::{Result, ResonanceError};
use resonance_core::model::{Chunk, Submission};
use resonance_core::ports::{EmbeddingModel, KeywordIndex, VectorStore};
use resonance_store::traits::ArtifactRefs;
use std::sync::Arc;
use std::time::Duration;

pub struct EmbedderWorker<E: ?Sized, V: ?Sized, K: ?Sized> {
    model: Arc<E>,
    vectors: Arc<V>,
    keywords: Arc<K>,
    config: EmbeddingConfig,
    artifacts: Arc<ArtifactStore>,
}

impl<E: EmbeddingModel + ?Sized, V: VectorStore + ?Sized, K: KeywordIndex + ?Sized> EmbedderWorker<E, V, K> {
    pub fn new(model: Arc<E>, vectors: Arc<V>, keywords: Arc<K>, config: EmbeddingConfig, artifacts: Arc<ArtifactStore>) -> Self {
        Self { model, vectors, keywords, config, artifacts }
    }

    /// Embeds and upserts every chunk for `submission` not already present in
    /// the Vector Store, in batches of `config.batch_size`. On retry after a
    /// partial failure this re-embeds only the chunks still missing, since
    /// the ones already upserted were confirmed indexed on a prior attempt.
    /// The `KeywordIndex` mirror is local and idempotent, so it's rebuilt
    /// from the full chunk set every run regardless of what was missing.
    pub async fn run(&self, submission: &Submission) -> Result<ArtifactRefs> {
        let chunks: Vec<Chunk> = self.artifacts.get_json(ArtifactKind::Chunks, submission.id)?;

        if chunks.is_empty() {
            tracing::warn!(submission_id = submission.id, "no-content: zero chunks to index");
            return Ok(ArtifactRefs { indexed_chunk_count: Some(0), ..Default::default() });
        }

        let all_ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
        let present = self.vectors.contains_ids(&all_ids).await?;
        let missing: Vec<Chunk> = chunks.iter().filter(|c| !present.contains(&c.id)).cloned().collect();

        let timeout = Duration::from_secs(self.config.timeout_secs);
        for batch in missing.chunks(self.config.batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = tokio::time::timeout(timeout, self.model.embed_batch(&texts))
                .await
                .map_err(|_| ResonanceError::TransientNetwork(format!("embedding batch exceeded {}s timeout", timeout.as_secs())))??;
            self.vectors.upsert(batch, &vectors).await?;
        }

        self.keywords.index(&chunks).await?;

        tracing::info!(submission_id = submission.id, total = chunks.len(), re_embedded = missing.len(), "embedded and indexed chunks");

        Ok(ArtifactRefs { indexed_chunk_count: Some(chunks.len() as i64), ..Default::default() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use resonance_core::model::{SourceKind, Stage, Status};
    use resonance_core::ports::{LexicalHit, VectorHit};
    use std::sync::Mutex;

    struct FakeEmbedder;

    #[async_trait]
    impl EmbeddingModel for FakeEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0, 0.0]).collect())
        }

        fn dimensions(&self) -> usize {
            4
        }
    }

    #[derive(Default)]
    struct FakeVectorStore {
        upserted: Mutex<Vec<Chunk>>,
    }

    #[async_trait]
    impl VectorStore for FakeVectorStore {
        async fn upsert(&self, chunks: &[Chunk], _vectors: &[Vec<f32>]) -> Result<()> {
            self.upserted.lock().unwrap().extend(chunks.iter().cloned());
            Ok(())
        }

        async fn search(&self, _query_vector: &[f32], _top_k: u32) -> Result<Vec<VectorHit>> {
            Ok(Vec::new())
        }

        async fn delete_by_submission(&self, submission_id: i64) -> Result<()> {
            self.upserted.lock().unwrap().retain(|c| c.submission_id != submission_id);
            Ok(())
        }

        async fn is_empty(&self) -> Result<bool> {
            Ok(self.upserted.lock().unwrap().is_empty())
        }

        async fn count(&self) -> Result<usize> {
            Ok(self.upserted.lock().unwrap().len())
        }

        async fn contains_ids(&self, ids: &[String]) -> Result<std::collections::HashSet<String>> {
            let upserted = self.upserted.lock().unwrap();
            Ok(ids.iter().filter(|id| upserted.iter().any(|c| &c.id == *id)).cloned().collect())
        }
    }

    #[derive(Default)]
    struct CountingEmbedder {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EmbeddingModel for CountingEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.lock().unwrap().extend(texts.iter().cloned());
            Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0, 0.0]).collect())
        }

        fn dimensions(&self) -> usize {
            4
        }
    }

    #[derive(Default)]
    struct FakeKeywordIndex {
        indexed: Mutex<Vec<Chunk>>,
    }

    #[async_trait]
    impl KeywordIndex for FakeKeywordIndex {
        async fn index(&self, chunks: &[Chunk]) -> Result<()> {
            self.indexed.lock().unwrap().extend(chunks.iter().cloned());
            Ok(())
        }

        async fn search(&self, _query_text: &str, _top_k: u32) -> Result<Vec<LexicalHit>> {
            Ok(Vec::new())
        }

        async fn delete_by_submission(&self, submission_id: i64) -> Result<()> {
            self.indexed.lock().unwrap().retain(|c| c.submission_id != submission_id);
            Ok(())
        }

        async fn get_text(&self, chunk_id: &str) -> Result<Option<String>> {
            Ok(self.indexed.lock().unwrap().iter().find(|c| c.id == chunk_id).map(|c| c.text.clone()))
        }
    }

    fn stub_submission() -> Submission {
        Submission {
            id: 3,
            source_kind: SourceKind::RemoteUrl,
            source: "https://example/test".into(),
            user_id: "u1".into(),
            language_hint: None,
            created_at: Utc::now(),
            stage: Stage::Embedding,
            status: Status::Running,
            error: None,
            audio_path: None,
            transcript_path: None,
            chunks_path: None,
            indexed_chunk_count: 0,
            attempts: 0,
            priority: 0,
            claim_owner: Some("w1".into()),
            claim_deadline: None,
            next_attempt_at: None,
            cancel_requested: false,
            archived: false,
        }
    }

    fn make_chunks(submission_id: i64, n: u32) -> Vec<Chunk> {
        (0..n)
            .map(|i| Chunk {
                id: Chunk::make_id(submission_id, i),
                submission_id,
                ordinal: i,
                text: format!("chunk {i}"),
                char_count: 7,
                segment_range: (0, 0),
            })
            .collect()
    }

    #[tokio::test]
    async fn embeds_all_chunks_in_batches() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = Arc::new(ArtifactStore::new(dir.path()));
        let submission = stub_submission();
        artifacts.put_json(ArtifactKind::Chunks, submission.id, &make_chunks(submission.id, 5)).unwrap();

        let vectors = Arc::new(FakeVectorStore::default());
        let keywords = Arc::new(FakeKeywordIndex::default());
        let worker = EmbedderWorker::new(
            Arc::new(FakeEmbedder),
            vectors.clone(),
            keywords.clone(),
            EmbeddingConfig { batch_size: 2, timeout_secs: 30 },
            artifacts,
        );
        let refs = worker.run(&submission).await.unwrap();
        assert_eq!(refs.indexed_chunk_count, Some(5));
        assert_eq!(vectors.upserted.lock().unwrap().len(), 5);
        assert_eq!(keywords.indexed.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn empty_chunk_set_indexes_zero() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = Arc::new(ArtifactStore::new(dir.path()));
        let submission = stub_submission();
        artifacts.put_json(ArtifactKind::Chunks, submission.id, &Vec::<Chunk>::new()).unwrap();

        let worker = EmbedderWorker::new(
            Arc::new(FakeEmbedder),
            Arc::new(FakeVectorStore::default()),
            Arc::new(FakeKeywordIndex::default()),
            EmbeddingConfig::default(),
            artifacts,
        );
        let refs = worker.run(&submission).await.unwrap();
        assert_eq!(refs.indexed_chunk_count, Some(0));
    }

    /// Simulates a retry after a prior attempt partially embedded a
    /// submission: chunks already present in the Vector Store must not be
    /// re-sent to the embedding model.
    #[tokio::test]
    async fn retry_re_embeds_only_missing_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = Arc::new(ArtifactStore::new(dir.path()));
        let submission = stub_submission();
        let chunks = make_chunks(submission.id, 5);
        artifacts.put_json(ArtifactKind::Chunks, submission.id, &chunks).unwrap();

        let vectors = Arc::new(FakeVectorStore::default());
        // First two chunks already indexed by a prior, partially-failed attempt.
        vectors.upsert(&chunks[..2], &[vec![1.0, 0.0, 0.0, 0.0], vec![1.0, 0.0, 0.0, 0.0]]).await.unwrap();

        let keywords = Arc::new(FakeKeywordIndex::default());
        let embedder = Arc::new(CountingEmbedder::default());
        let worker = EmbedderWorker::new(
            embedder.clone(),
            vectors.clone(),
            keywords.clone(),
            EmbeddingConfig { batch_size: 2, timeout_secs: 30 },
            artifacts,
        );

        let refs = worker.run(&submission).await.unwrap();

        assert_eq!(refs.indexed_chunk_count, Some(5));
        assert_eq!(embedder.calls.lock().unwrap().len(), 3, "only the 3 missing chunks should reach the embedding model");
        assert_eq!(vectors.upserted.lock().unwrap().len(), 5);
        assert_eq!(keywords.indexed.lock().unwrap().len(), 5, "keyword index is rebuilt from the full chunk set");
    }

    struct SlowEmbedder;

    #[async_trait]
    impl EmbeddingModel for SlowEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0, 0.0]).collect())
        }

        fn dimensions(&self) -> usize {
            4
        }
    }

    /// Spec §5: "every external model call has a configurable timeout
    /// ... timeouts count as retriable failures".
    #[tokio::test]
    async fn embedding_batch_past_timeout_is_transient_network() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = Arc::new(ArtifactStore::new(dir.path()));
        let submission = stub_submission();
        artifacts.put_json(ArtifactKind::Chunks, submission.id, &make_chunks(submission.id, 2)).unwrap();

        let worker = EmbedderWorker::new(
            Arc::new(SlowEmbedder),
            Arc::new(FakeVectorStore::default()),
            Arc::new(FakeKeywordIndex::default()),
            EmbeddingConfig { batch_size: 2, timeout_secs: 0 },
            artifacts,
        );
        let err = worker.run(&submission).await.unwrap_err();
        assert_eq!(err.taxonomy_tag(), "transient-network");
        assert!(err.retriable());
    }
}
