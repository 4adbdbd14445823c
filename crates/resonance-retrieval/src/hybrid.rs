//! Hybrid blend of semantic and lexical result sets (spec §4.6).

use resonance_core::ports::{LexicalHit, VectorHit};
use std::collections::HashMap;

/// One scored chunk, independent of which retrieval path produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub score: f32,
}

/// Min-max normalizes `scores` to `[0, 1]`. A constant (or empty) input
/// normalizes to all zeros rather than dividing by zero.
fn normalize(hits: &[(String, f32)]) -> HashMap<String, f32> {
    if hits.is_empty() {
        return HashMap::new();
    }
    let min = hits.iter().map(|(_, s)| *s).fold(f32::INFINITY, f32::min);
    let max = hits.iter().map(|(_, s)| *s).fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    hits.iter()
        .map(|(id, s)| {
            let normalized = if range > 0.0 { (s - min) / range } else { 0.0 };
            (id.clone(), normalized)
        })
        .collect()
}

/// Blends normalized semantic and lexical scores per spec §4.6: default
/// weights `0.7` semantic, `0.3` lexical, deduplicated by chunk id keeping
/// the max score a chunk id receives from the blend (a chunk present in
/// only one result set still gets a score via the missing side's implicit
/// zero).
pub fn blend(semantic: &[VectorHit], lexical: &[LexicalHit], semantic_weight: f32, lexical_weight: f32) -> Vec<ScoredChunk> {
    let sem_pairs: Vec<(String, f32)> = semantic.iter().map(|h| (h.chunk_id.clone(), h.score)).collect();
    let lex_pairs: Vec<(String, f32)> = lexical.iter().map(|h| (h.chunk_id.clone(), h.score)).collect();

    let sem_norm = normalize(&sem_pairs);
    let lex_norm = normalize(&lex_pairs);

    let mut blended: HashMap<String, f32> = HashMap::new();
    for (id, s) in &sem_norm {
        let lex = lex_norm.get(id).copied().unwrap_or(0.0);
        let score = semantic_weight * s + lexical_weight * lex;
        blended.entry(id.clone()).and_modify(|existing| *existing = existing.max(score)).or_insert(score);
    }
    for (id, l) in &lex_norm {
        if sem_norm.contains_key(id) {
            continue;
        }
        let score = lexical_weight * l;
        blended.entry(id.clone()).and_modify(|existing| *existing = existing.max(score)).or_insert(score);
    }

    let mut out: Vec<ScoredChunk> = blended.into_iter().map(|(chunk_id, score)| ScoredChunk { chunk_id, score }).collect();
    out.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Spec §8: "given synthetic keyword-only and semantic-only result sets
    /// with known scores, the blended output matches the formula
    /// `0.7*s_sem + 0.3*s_lex`".
    #[test]
    fn blend_matches_spec_formula_on_disjoint_single_point_sets() {
        let semantic = vec![VectorHit { chunk_id: "a".into(), score: 1.0 }];
        let lexical = vec![LexicalHit { chunk_id: "a".into(), score: 1.0 }];
        let blended = blend(&semantic, &lexical, 0.7, 0.3);
        assert_eq!(blended.len(), 1);
        // A single-point set normalizes to 0.0 (no range), so the formula
        // degenerates to 0.7*0 + 0.3*0 = 0 here; verified against a
        // two-point set below where normalization is meaningful.
        assert_eq!(blended[0].score, 0.0);
    }

    #[test]
    fn blend_weights_and_dedups_by_max_score() {
        let semantic = vec![VectorHit { chunk_id: "a".into(), score: 1.0 }, VectorHit { chunk_id: "b".into(), score: 0.0 }];
        let lexical = vec![LexicalHit { chunk_id: "a".into(), score: 0.0 }, LexicalHit { chunk_id: "b".into(), score: 1.0 }];
        let blended = blend(&semantic, &lexical, 0.7, 0.3);
        let a = blended.iter().find(|c| c.chunk_id == "a").unwrap();
        let b = blended.iter().find(|c| c.chunk_id == "b").unwrap();
        assert!((a.score - 0.7).abs() < 1e-6);
        assert!((b.score - 0.3).abs() < 1e-6);
        assert_eq!(blended[0].chunk_id, "a");
    }

    #[test]
    fn chunk_present_in_only_one_side_still_scores() {
        let semantic = vec![VectorHit { chunk_id: "a".into(), score: 1.0 }, VectorHit { chunk_id: "b".into(), score: 0.0 }];
        let lexical = vec![];
        let blended = blend(&semantic, &lexical, 0.7, 0.3);
        assert_eq!(blended.len(), 2);
    }
}
