//! Query rewriting (spec §4.6 Rewrite): asks the LLM for `K` alternate
//! phrasings of the query before fan-out retrieval.

use resonance_core::ports::LlmClient;
use resonance_core::{ResonanceError, Result};
use std::time::Duration;

const REWRITE_SYSTEM_PROMPT: &str = "You rewrite a user's search query into alternate phrasings that \
preserve its meaning but vary word choice, to widen a lexical/semantic search. \
Reply with exactly one rewritten query per line, no numbering, no commentary.";

/// Asks `llm` for `variants` alternate phrasings of `query`. The prompt asks
/// for one per line; trailing blank lines are dropped, and the result is
/// truncated (never padded) to `variants` entries — a terse LLM response is
/// treated as "fewer variants", not an error. `timeout_secs` bounds the call
/// the same way every other external model call is bounded (spec §5).
pub async fn rewrite_query(llm: &dyn LlmClient, query: &str, variants: usize, timeout_secs: u64) -> Result<Vec<String>> {
    let user_prompt = format!("Original query: {query}\nGenerate {variants} rewritten variants.");
    let response = tokio::time::timeout(Duration::from_secs(timeout_secs), llm.complete(REWRITE_SYSTEM_PROMPT, &user_prompt))
        .await
        .map_err(|_| ResonanceError::TransientNetwork(format!("query rewrite exceeded {timeout_secs}s timeout")))??;
    let lines: Vec<String> = response.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect();
    Ok(lines.into_iter().take(variants).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedLlm(&'static str);

    #[async_trait]
    impl LlmClient for FixedLlm {
        async fn complete(&self, _system_prompt: &str, _user_prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn parses_one_variant_per_line() {
        let llm = FixedLlm("quick brown fox\nfast auburn fox\nswift reddish fox\n");
        let variants = rewrite_query(&llm, "brown fox", 3, 30).await.unwrap();
        assert_eq!(variants, vec!["quick brown fox", "fast auburn fox", "swift reddish fox"]);
    }

    #[tokio::test]
    async fn truncates_but_never_pads() {
        let llm = FixedLlm("only one line");
        let variants = rewrite_query(&llm, "q", 3, 30).await.unwrap();
        assert_eq!(variants.len(), 1);
    }
}
