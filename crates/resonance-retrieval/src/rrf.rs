//! Reciprocal-rank-fusion across the ranked lists produced by a rewritten
//! query's variants (spec §4.6 Rewrite).

use crate::hybrid::ScoredChunk;
use std::collections::HashMap;

/// Fuses multiple ranked lists (one per query variant, each already sorted
/// best-first) into a single ranking: `score = Σ 1/(k + rank)`, rank
/// 0-indexed, summed across every list a chunk id appears in.
pub fn reciprocal_rank_fusion(lists: &[Vec<ScoredChunk>], k: f32) -> Vec<ScoredChunk> {
    let mut fused: HashMap<String, f32> = HashMap::new();
    for list in lists {
        for (rank, chunk) in list.iter().enumerate() {
            *fused.entry(chunk.chunk_id.clone()).or_insert(0.0) += 1.0 / (k + rank as f32);
        }
    }
    let mut out: Vec<ScoredChunk> = fused.into_iter().map(|(chunk_id, score)| ScoredChunk { chunk_id, score }).collect();
    out.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(ids: &[&str]) -> Vec<ScoredChunk> {
        ids.iter().map(|id| ScoredChunk { chunk_id: id.to_string(), score: 0.0 }).collect()
    }

    #[test]
    fn fuses_across_lists_summing_reciprocal_ranks() {
        let lists = vec![list(&["a", "b", "c"]), list(&["b", "a", "c"])];
        let fused = reciprocal_rank_fusion(&lists, 60.0);
        let a = fused.iter().find(|c| c.chunk_id == "a").unwrap().score;
        let b = fused.iter().find(|c| c.chunk_id == "b").unwrap().score;
        // a: rank 0 in list 1, rank 1 in list 2 -> 1/60 + 1/61
        // b: rank 1 in list 1, rank 0 in list 2 -> 1/61 + 1/60
        assert!((a - b).abs() < 1e-6);
    }

    /// Spec §8: "moving any item earlier in any variant list never decreases
    /// its fused score".
    #[test]
    fn is_monotonic_in_rank() {
        let baseline = vec![list(&["x", "a", "b", "c"])];
        let improved = vec![list(&["a", "x", "b", "c"])];
        let before = reciprocal_rank_fusion(&baseline, 60.0);
        let after = reciprocal_rank_fusion(&improved, 60.0);
        let x_before = before.iter().find(|c| c.chunk_id == "x").unwrap().score;
        let x_after = after.iter().find(|c| c.chunk_id == "x").unwrap().score;
        assert!(x_after >= x_before);
    }

    #[test]
    fn single_list_preserves_order() {
        let lists = vec![list(&["a", "b", "c"])];
        let fused = reciprocal_rank_fusion(&lists, 60.0);
        assert_eq!(fused.iter().map(|c| c.chunk_id.as_str()).collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }
}
