//! Default `LlmClient` (spec §4.6): a thin OpenAI-compatible chat-completion
//! client over `LLM_API_KEY`. The model endpoint itself is out of scope
//! (spec §1); this is the HTTP plumbing any such endpoint needs.

use async_trait::async_trait;
use resonance_core::error::{Result, ResonanceError};
use resonance_core::ports::LlmClient;
use serde::{Deserialize, Serialize};

pub struct OpenAiCompatibleClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatibleClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: api_key.into(),
            model: "gpt-4o-mini".to_string(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageOwned,
}

#[derive(Deserialize)]
struct ChatMessageOwned {
    content: String,
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "system", content: system_prompt }, ChatMessage { role: "user", content: user_prompt }],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ResonanceError::TransientNetwork(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ResonanceError::ModelFailure(format!("LLM endpoint returned {}", response.status())));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| ResonanceError::ModelFailure(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ResonanceError::ModelFailure("empty choices in LLM response".into()))
    }
}
