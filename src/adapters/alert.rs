//! Default `AlertSink` wiring (spec §4.4, §6): always logs to disk via
//! `resonance_audit::JsonlAlertSink`; additionally posts to a Telegram-style
//! bot chat when `BOT_TOKEN`/`ADMIN_CHAT_ID` are both configured, satisfying
//! "`ADMIN_CHAT_ID` (optional, enables alert dispatch)".

use async_trait::async_trait;
use resonance_audit::sinks::JsonlAlertSink;
use resonance_core::model::SystemAlert;
use resonance_core::ports::AlertSink;
use resonance_core::Result;

pub struct CompositeAlertSink {
    log: JsonlAlertSink,
    chat: Option<ChatAlertSink>,
}

impl CompositeAlertSink {
    pub fn new(log: JsonlAlertSink, chat: Option<ChatAlertSink>) -> Self {
        Self { log, chat }
    }
}

#[async_trait]
impl AlertSink for CompositeAlertSink {
    async fn notify(&self, alert: &SystemAlert) -> Result<()> {
        self.log.notify(alert).await?;
        if let Some(chat) = &self.chat {
            if let Err(e) = chat.notify(alert).await {
                tracing::warn!(error = %e, "chat alert dispatch failed; alert is still on disk");
            }
        }
        Ok(())
    }
}

pub struct ChatAlertSink {
    client: reqwest::Client,
    bot_token: String,
    chat_id: String,
}

impl ChatAlertSink {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), bot_token: bot_token.into(), chat_id: chat_id.into() }
    }
}

#[async_trait]
impl AlertSink for ChatAlertSink {
    async fn notify(&self, alert: &SystemAlert) -> Result<()> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let text = format!("[{:?}] {}: {}", alert.severity, alert.kind, alert.message);
        self.client
            .post(url)
            .json(&serde_json::json!({"chat_id": self.chat_id, "text": text}))
            .send()
            .await
            .map_err(|e| resonance_core::ResonanceError::TransientNetwork(e.to_string()))?;
        Ok(())
    }
}
