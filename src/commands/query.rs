//! `query <text>` (spec §6): runs one question through the Retrieval Engine
//! and prints the answer plus its sources.

use crate::bootstrap::Engine;
use console::style;
use resonance_core::error::ResonanceError;
use resonance_core::Result;
use resonance_retrieval::QueryRequest;

pub async fn run(engine: &Engine, question: &str, top_k: u32, user_id: &str) -> Result<()> {
    let retrieval = engine
        .retrieval
        .as_ref()
        .ok_or_else(|| ResonanceError::InputInvalid("LLM_API_KEY is not set; retrieval is unavailable".into()))?;

    let response = retrieval
        .query(QueryRequest { user_id: user_id.to_string(), question: question.to_string(), top_k, variant: None, system_prompt: None })
        .await?;

    println!("{}\n", response.answer);
    for source in &response.sources {
        println!("  {} {:.3}  {}", style(&source.chunk_id).dim(), source.score, truncate(&source.text, 80));
    }
    println!("\n{}ms", response.response_time_ms);
    Ok(())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        format!("{}…", text.chars().take(max).collect::<String>())
    }
}
