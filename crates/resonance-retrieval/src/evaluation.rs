//! Evaluation harness (spec §4.6): runs a curated case set through every
//! configured variant, scoring both retrieval (hit-rate@k, MRR) and answer
//! quality (embedding-distance similarity, an LLM-judge placeholder).
//! Deterministic given fixed model outputs — no randomness of its own.

use crate::engine::{QueryRequest, RetrievalEngine};
use resonance_core::model::RetrievalVariant;
use resonance_core::ports::{EmbeddingModel, KeywordIndex, LlmClient, Reranker, VectorStore};
use resonance_core::Result;

/// One curated (query, expected-chunk-id) pair, with an optional
/// expected-answer used for the answer-similarity metric.
#[derive(Debug, Clone)]
pub struct EvalCase {
    pub query: String,
    pub expected_chunk_id: String,
    pub expected_answer: Option<String>,
}

/// Per-case outcome, raw enough that a human can audit a surprising score.
#[derive(Debug, Clone)]
pub struct EvalCaseResult {
    pub query: String,
    pub expected_chunk_id: String,
    pub retrieved_chunk_ids: Vec<String>,
    pub hit: bool,
    /// 1-indexed rank of the expected chunk id among retrieved results, if present.
    pub rank: Option<usize>,
    pub raw_answer: String,
    pub answer_similarity: Option<f32>,
    pub llm_judge_score: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct EvalVariantResult {
    pub variant: RetrievalVariant,
    pub hit_rate_at_k: f64,
    pub mean_reciprocal_rank: f64,
    pub cases: Vec<EvalCaseResult>,
}

/// Ranked (best hit-rate first) comparison across every variant run.
#[derive(Debug, Clone)]
pub struct EvalReport {
    pub results: Vec<EvalVariantResult>,
}

const JUDGE_SYSTEM_PROMPT: &str = "You score how well a candidate answer matches an expected answer, on a scale \
from 0.0 (unrelated) to 1.0 (equivalent). Reply with only the number.";

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Runs `cases` through `engine` for every variant in `variants`, at
/// `top_k`, producing one `EvalVariantResult` per variant. `judge_llm` asks
/// for an LLM-judge score; a response that doesn't parse as a float is
/// recorded as `None` rather than failing the case.
pub async fn run_evaluation<V, K, E, L, R>(
    engine: &RetrievalEngine<V, K, E, L, R>,
    embedder: &dyn EmbeddingModel,
    judge_llm: &dyn LlmClient,
    cases: &[EvalCase],
    variants: &[RetrievalVariant],
    top_k: u32,
) -> Result<EvalReport>
where
    V: VectorStore + ?Sized,
    K: KeywordIndex + ?Sized,
    E: EmbeddingModel + ?Sized,
    L: LlmClient + ?Sized,
    R: Reranker + ?Sized,
{
    let mut results = Vec::with_capacity(variants.len());

    for &variant in variants {
        let mut case_results = Vec::with_capacity(cases.len());
        for case in cases {
            let request = QueryRequest {
                user_id: "eval-harness".into(),
                question: case.query.clone(),
                top_k,
                variant: Some(variant),
                system_prompt: None,
            };
            let response = engine.query(request).await?;
            let retrieved_chunk_ids: Vec<String> = response.sources.iter().map(|s| s.chunk_id.clone()).collect();
            let rank = retrieved_chunk_ids.iter().position(|id| id == &case.expected_chunk_id).map(|i| i + 1);

            let answer_similarity = match &case.expected_answer {
                Some(expected) => {
                    let vectors = embedder.embed_batch(&[response.answer.clone(), expected.clone()]).await?;
                    if vectors.len() == 2 {
                        Some(cosine_similarity(&vectors[0], &vectors[1]))
                    } else {
                        None
                    }
                }
                None => None,
            };

            let llm_judge_score = match &case.expected_answer {
                Some(expected) => {
                    let prompt = format!("Expected: {expected}\nCandidate: {}", response.answer);
                    judge_llm.complete(JUDGE_SYSTEM_PROMPT, &prompt).await.ok().and_then(|text| text.trim().parse::<f32>().ok())
                }
                None => None,
            };

            case_results.push(EvalCaseResult {
                query: case.query.clone(),
                expected_chunk_id: case.expected_chunk_id.clone(),
                retrieved_chunk_ids,
                hit: rank.is_some(),
                rank,
                raw_answer: response.answer,
                answer_similarity,
                llm_judge_score,
            });
        }

        let hits = case_results.iter().filter(|c| c.hit).count();
        let hit_rate_at_k = if case_results.is_empty() { 0.0 } else { hits as f64 / case_results.len() as f64 };
        let mrr_sum: f64 = case_results.iter().map(|c| c.rank.map(|r| 1.0 / r as f64).unwrap_or(0.0)).sum();
        let mean_reciprocal_rank = if case_results.is_empty() { 0.0 } else { mrr_sum / case_results.len() as f64 };

        results.push(EvalVariantResult { variant, hit_rate_at_k, mean_reciprocal_rank, cases: case_results });
    }

    results.sort_by(|a, b| b.hit_rate_at_k.partial_cmp(&a.hit_rate_at_k).unwrap_or(std::cmp::Ordering::Equal));

    Ok(EvalReport { results })
}
