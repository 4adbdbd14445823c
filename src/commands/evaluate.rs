//! `evaluate` (spec §6): runs a curated case set through every retrieval
//! variant and prints hit-rate/MRR side by side (spec §4.6).

use crate::bootstrap::Engine;
use console::style;
use resonance_core::error::ResonanceError;
use resonance_core::model::RetrievalVariant;
use resonance_core::Result;
use resonance_retrieval::{run_evaluation, EvalCase};
use serde::Deserialize;

const VARIANTS: [RetrievalVariant; 4] =
    [RetrievalVariant::Semantic, RetrievalVariant::Hybrid, RetrievalVariant::HybridRerank, RetrievalVariant::RewriteHybridRerank];

#[derive(Deserialize)]
struct RawCase {
    query: String,
    expected_chunk_id: String,
    expected_answer: Option<String>,
}

pub async fn run(engine: &Engine, cases_path: &str, top_k: u32) -> Result<()> {
    let retrieval = engine.retrieval.as_ref().ok_or_else(|| ResonanceError::InputInvalid("LLM_API_KEY is not set".into()))?;
    let llm = engine.llm.as_ref().ok_or_else(|| ResonanceError::InputInvalid("LLM_API_KEY is not set".into()))?;

    let text = std::fs::read_to_string(cases_path).map_err(|e| ResonanceError::InputInvalid(format!("{cases_path}: {e}")))?;
    let raw: Vec<RawCase> = serde_json::from_str(&text).map_err(|e| ResonanceError::InputInvalid(format!("{cases_path}: {e}")))?;
    let cases: Vec<EvalCase> =
        raw.into_iter().map(|c| EvalCase { query: c.query, expected_chunk_id: c.expected_chunk_id, expected_answer: c.expected_answer }).collect();

    let report = run_evaluation(retrieval.as_ref(), engine.embedder.as_ref(), llm.as_ref(), &cases, &VARIANTS, top_k).await?;

    for variant_result in &report.results {
        println!(
            "{:<24} hit-rate@{top_k} {:.3}  mrr {:.3}",
            style(variant_result.variant.to_string()).bold(),
            variant_result.hit_rate_at_k,
            variant_result.mean_reciprocal_rank
        );
    }
    Ok(())
}
