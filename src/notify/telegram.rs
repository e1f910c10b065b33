//! Telegram Bot API notifier.
//!
//! Text ads go through `sendMessage`, single-photo ads through `sendPhoto`,
//! and multi-photo ads through `sendMediaGroup` with the caption attached
//! to the first item. HTTP 429 is reported as [`NotifyError::RateLimited`].

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

use super::{Delivery, Notifier, NotifyError};

const API_BASE: &str = "https://api.telegram.org";
const MAX_TEXT_CHARS: usize = 4096;
const MAX_CAPTION_CHARS: usize = 1024;

#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    bot_token: String,
    chat_id: String,
    api_base: String,
    client: Client,
    timeout: Duration,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            bot_token,
            chat_id,
            api_base: API_BASE.to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Point at a Bot API compatible server (local bot API, test double).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.bot_token)
    }
}

/// Bot API method and JSON body for one delivery.
pub fn build_request(chat_id: &str, delivery: &Delivery) -> (&'static str, Value) {
    match delivery {
        Delivery::Text { text } => (
            "sendMessage",
            json!({
                "chat_id": chat_id,
                "text": truncate_chars(text, MAX_TEXT_CHARS),
            }),
        ),
        Delivery::Photo { photo, caption } => (
            "sendPhoto",
            json!({
                "chat_id": chat_id,
                "photo": photo,
                "caption": truncate_chars(caption, MAX_CAPTION_CHARS),
            }),
        ),
        Delivery::MediaGroup { photos, caption } => {
            let media: Vec<Value> = photos
                .iter()
                .enumerate()
                .map(|(i, url)| {
                    let mut item = json!({ "type": "photo", "media": url });
                    if i == 0 {
                        item["caption"] = Value::String(truncate_chars(caption, MAX_CAPTION_CHARS));
                    }
                    item
                })
                .collect();
            (
                "sendMediaGroup",
                json!({ "chat_id": chat_id, "media": media }),
            )
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn deliver(&self, delivery: &Delivery) -> Result<(), NotifyError> {
        let (method, body) = build_request(&self.chat_id, delivery);

        tracing::debug!(
            target: "notify",
            chat_id = %self.chat_id,
            method,
            "sending Telegram message"
        );

        let response = self
            .client
            .post(self.method_url(method))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        // Error bodies are JSON too, but do not rely on it.
        let resp_body: Value = response.json().await.unwrap_or(Value::Null);

        if status.is_success() && resp_body.get("ok") == Some(&Value::Bool(true)) {
            return Ok(());
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp_body
                .get("parameters")
                .and_then(|p| p.get("retry_after"))
                .and_then(Value::as_u64)
                .unwrap_or(60);
            return Err(NotifyError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        let description = resp_body
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("Unknown Telegram API error")
            .to_string();
        Err(NotifyError::Api {
            status: status.as_u16(),
            description,
        })
    }

    fn channel_name(&self) -> &str {
        &self.chat_id
    }
}
