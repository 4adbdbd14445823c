//! Default `Reranker` (spec §4.6): scores by query/chunk token overlap. A
//! real cross-encoder is out of scope (spec §1); this gives the
//! `hybrid_rerank`/`rewrite_hybrid_rerank` variants something deterministic
//! to order by.

use async_trait::async_trait;
use resonance_core::error::Result;
use resonance_core::ports::Reranker;

pub struct OverlapReranker;

#[async_trait]
impl Reranker for OverlapReranker {
    async fn score(&self, query: &str, chunk_text: &str) -> Result<f32> {
        let query_tokens: std::collections::HashSet<&str> = query.split_whitespace().collect();
        let overlap = chunk_text.split_whitespace().filter(|t| query_tokens.contains(t)).count();
        Ok(overlap as f32)
    }
}
