//! Cross-encoder re-rank stage (spec §4.6 Re-rank): scores the top-M hybrid
//! candidates pairwise against the query, returns the top-N, ties broken by
//! the original hybrid rank.
//!
//! Scoring waits are modeled as parallel tasks with a join barrier (spec
//! §9's "Coroutine control flow" note): every candidate's `score` call is
//! dispatched concurrently and bounded by its own timeout, rather than
//! awaited one at a time.

use crate::hybrid::ScoredChunk;
use futures::future::join_all;
use resonance_core::{ResonanceError, Result};
use resonance_core::ports::Reranker;
use std::time::Duration;

/// Re-ranks `candidates` (already hybrid-ranked, best-first) against
/// `query`, returning the top `top_n` by reranker score. `candidates` is
/// expected to already be truncated to the top-M pool by the caller. A
/// candidate whose scoring call exceeds `timeout_secs` is dropped rather
/// than failing the whole re-rank.
pub async fn rerank(reranker: &dyn Reranker, query: &str, candidates: &[(ScoredChunk, String)], top_n: u32, timeout_secs: u64) -> Result<Vec<ScoredChunk>> {
    let timeout = Duration::from_secs(timeout_secs);
    let tasks = candidates.iter().enumerate().map(|(original_rank, (chunk, text))| async move {
        match tokio::time::timeout(timeout, reranker.score(query, text)).await {
            Ok(Ok(score)) => Some((original_rank, ScoredChunk { chunk_id: chunk.chunk_id.clone(), score }, None)),
            Ok(Err(e)) => Some((original_rank, ScoredChunk { chunk_id: chunk.chunk_id.clone(), score: 0.0 }, Some(e))),
            Err(_) => None,
        }
    });

    let mut scored = Vec::with_capacity(candidates.len());
    for outcome in join_all(tasks).await {
        match outcome {
            Some((rank, chunk, None)) => scored.push((rank, chunk)),
            Some((_, _, Some(e))) => return Err(e),
            None => continue,
        }
    }

    if scored.is_empty() && !candidates.is_empty() {
        return Err(ResonanceError::TransientNetwork(format!("every re-rank candidate exceeded {}s timeout", timeout.as_secs())));
    }

    scored.sort_by(|(rank_a, a), (rank_b, b)| {
        b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then_with(|| rank_a.cmp(rank_b))
    });

    Ok(scored.into_iter().take(top_n as usize).map(|(_, chunk)| chunk).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedScorer(std::collections::HashMap<String, f32>);

    #[async_trait]
    impl Reranker for FixedScorer {
        async fn score(&self, _query: &str, chunk_text: &str) -> Result<f32> {
            Ok(*self.0.get(chunk_text).unwrap_or(&0.0))
        }
    }

    fn candidate(id: &str, text: &str) -> (ScoredChunk, String) {
        (ScoredChunk { chunk_id: id.into(), score: 0.0 }, text.to_string())
    }

    #[tokio::test]
    async fn returns_top_n_by_reranker_score() {
        let scores = [("t0".to_string(), 0.1), ("t1".to_string(), 0.9), ("t2".to_string(), 0.5)].into_iter().collect();
        let scorer = FixedScorer(scores);
        let candidates = vec![candidate("a", "t0"), candidate("b", "t1"), candidate("c", "t2")];
        let top = rerank(&scorer, "q", &candidates, 2, 30).await.unwrap();
        assert_eq!(top.iter().map(|c| c.chunk_id.as_str()).collect::<Vec<_>>(), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn ties_break_by_original_hybrid_rank() {
        let scores = [("t0".to_string(), 0.5), ("t1".to_string(), 0.5)].into_iter().collect();
        let scorer = FixedScorer(scores);
        let candidates = vec![candidate("a", "t0"), candidate("b", "t1")];
        let top = rerank(&scorer, "q", &candidates, 2, 30).await.unwrap();
        assert_eq!(top[0].chunk_id, "a");
    }

    struct SlowScorer;

    #[async_trait]
    impl Reranker for SlowScorer {
        async fn score(&self, _query: &str, _chunk_text: &str) -> Result<f32> {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            Ok(1.0)
        }
    }

    /// Spec §9: a re-rank candidate past its per-task timeout is dropped,
    /// not treated as a failure of the whole re-rank — as long as some
    /// candidate still scores in time.
    #[tokio::test]
    async fn slow_candidate_is_dropped_when_others_score_in_time() {
        struct MixedScorer;

        #[async_trait]
        impl Reranker for MixedScorer {
            async fn score(&self, _query: &str, chunk_text: &str) -> Result<f32> {
                if chunk_text == "slow" {
                    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                }
                Ok(if chunk_text == "slow" { 1.0 } else { 0.5 })
            }
        }

        let candidates = vec![candidate("a", "slow"), candidate("b", "fast")];
        let top = rerank(&MixedScorer, "q", &candidates, 2, 0).await.unwrap();
        assert_eq!(top.iter().map(|c| c.chunk_id.as_str()).collect::<Vec<_>>(), vec!["b"]);
    }

    #[tokio::test]
    async fn every_candidate_timing_out_is_transient_network() {
        let candidates = vec![candidate("a", "t0")];
        let err = rerank(&SlowScorer, "q", &candidates, 1, 0).await.unwrap_err();
        assert_eq!(err.taxonomy_tag(), "transient-network");
        assert!(err.retriable());
    }
}
