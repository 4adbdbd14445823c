//! Chat-bot protocol adapter (spec §6): transport-agnostic message routing
//! shared by whichever bot transport a binary wires up. A URL in the text
//! creates a submission; anything else is dispatched to the retrieval
//! engine. Feedback buttons and the verbose toggle write straight to the
//! Job Store. The actual wire protocol (long-poll/webhook, inline keyboard
//! rendering) is a transport concern left to the binary embedding this.

use crate::routes::process::classify_source;
use crate::state::AppState;
use regex::Regex;
use resonance_core::model::FeedbackRating;
use resonance_core::{Result, ResonanceError};
use resonance_retrieval::{QueryRequest, QueryResponse};
use std::sync::OnceLock;

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://\S+").expect("static url regex"))
}

/// Outcome of routing one inbound chat message, for the transport to render.
#[derive(Debug, Clone)]
pub enum ChatReply {
    SubmissionCreated { submission_ids: Vec<i64> },
    QueryAnswered(QueryResponse),
}

pub struct ChatBotAdapter {
    state: AppState,
}

impl ChatBotAdapter {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Routes one text message: URLs become submissions, everything else is
    /// a question for the retrieval engine.
    pub async fn handle_text(&self, user_id: &str, text: &str) -> Result<ChatReply> {
        let urls: Vec<&str> = url_regex().find_iter(text).map(|m| m.as_str()).collect();

        if !urls.is_empty() {
            let dedup_window = chrono::Duration::hours(self.state.config.dedup_window_hours);
            let high_water_mark = self.state.config.backpressure_high_water_mark;
            let mut submission_ids = Vec::with_capacity(urls.len());
            for url in urls {
                let id = self
                    .state
                    .store
                    .insert_submission(classify_source(url), url, user_id, None, dedup_window, high_water_mark)
                    .await?;
                submission_ids.push(id);
            }
            return Ok(ChatReply::SubmissionCreated { submission_ids });
        }

        if text.trim().is_empty() {
            return Err(ResonanceError::InputInvalid("empty message".into()));
        }

        let request = QueryRequest {
            user_id: user_id.to_string(),
            question: text.to_string(),
            top_k: self.state.config.retrieval.default_top_k,
            variant: None,
            system_prompt: None,
        };
        let response = self.state.retrieval.query(request).await?;
        Ok(ChatReply::QueryAnswered(response))
    }

    /// An inline reply button's rating, tied back to the Query Event it
    /// answers.
    pub async fn handle_feedback(&self, query_event_id: i64, rating: FeedbackRating, comment: Option<&str>) -> Result<()> {
        self.state.store.record_feedback_event(query_event_id, rating, comment).await?;
        Ok(())
    }

    /// The `/verbose` toggle command; returns the new state.
    pub async fn toggle_verbose(&self, user_id: &str) -> Result<bool> {
        let current = self.state.store.is_user_verbose(user_id).await?;
        let next = !current;
        self.state.store.set_user_verbose(user_id, next).await?;
        Ok(next)
    }
}
