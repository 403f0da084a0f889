//! Telegram notification sink — spec.md §6.4. Unlike the interactive,
//! command-polling bot this crate is adapted from, the daemon never
//! reads messages back from Telegram: it only forwards bus
//! notifications to one configured chat. `chunk_message` and the
//! `sendMessage` plumbing are carried over unchanged from that bot.

use std::time::Duration;

use anyhow::{bail, Result};
use omnibrain_bus::{EventBus, TOPIC_NOTIFICATION};
use omnibrain_store::Store;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// One Telegram chat a [`TelegramSink`] delivers `sendMessage` calls to.
pub struct TelegramSink {
    client: Client,
    base_url: String,
    chat_id: String,
}

impl TelegramSink {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: format!("https://api.telegram.org/bot{}", bot_token.into()),
            chat_id: chat_id.into(),
        }
    }

    /// Sends `text`, splitting it into Telegram's ~4096-char message
    /// limit along line boundaries first.
    pub async fn send(&self, text: &str) -> Result<()> {
        for chunk in chunk_message(text, 3500) {
            self.send_chunk(&chunk).await?;
        }
        Ok(())
    }

    async fn send_chunk(&self, text: &str) -> Result<()> {
        let url = format!("{}/sendMessage", self.base_url);
        let body = SendMessageRequest { chat_id: &self.chat_id, text, disable_web_page_preview: true };
        let response = self.client.post(url).json(&body).send().await?.error_for_status()?;
        let payload: TelegramResponse<serde_json::Value> = response.json().await?;
        if !payload.ok {
            bail!(payload.description.unwrap_or_else(|| "telegram sendMessage failed".to_string()));
        }
        Ok(())
    }
}

/// Notification levels the user can silence independently via the
/// `notify_{silent,fyi,important,critical}` preference keys `routes::settings`
/// reads and writes.
fn preference_key_for_level(level: &str) -> &'static str {
    match level {
        "critical" => "notify_critical",
        "important" => "notify_important",
        "fyi" => "notify_fyi",
        _ => "notify_silent",
    }
}

fn format_notification(payload: &serde_json::Value) -> String {
    let title = payload.get("title").and_then(|v| v.as_str()).unwrap_or("");
    let message = payload.get("message").and_then(|v| v.as_str()).unwrap_or("");
    if title.is_empty() {
        message.to_string()
    } else {
        format!("{title}\n{message}")
    }
}

/// Subscribes to the bus's notification topic and relays every
/// non-silenced event to `sink`, until the bus channel closes. One
/// lagging or disconnected send never stops the loop — it's logged and
/// the next event is still attempted.
pub async fn run_notification_forwarder(bus: Arc<EventBus>, store: Arc<Store>, sink: TelegramSink) {
    let mut rx = bus.subscribe(TOPIC_NOTIFICATION);
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "telegram forwarder lagged behind notification topic");
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        let level = event.payload.get("level").and_then(|v| v.as_str()).unwrap_or("fyi").to_string();
        let key = preference_key_for_level(&level);
        let enabled = store.get_preference(key, serde_json::json!(true)).unwrap_or(serde_json::json!(true));
        if enabled == serde_json::json!(false) {
            continue;
        }

        let text = format_notification(&event.payload);
        if text.trim().is_empty() {
            continue;
        }
        if let Err(err) = sink.send(&text).await {
            tracing::warn!(%err, "telegram sendMessage failed, dropping notification");
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }
}

fn chunk_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.lines() {
        let line_len = line.chars().count() + 1;
        if current_len > 0 && current_len + line_len > max_chars {
            chunks.push(current.trim_end().to_string());
            current.clear();
            current_len = 0;
        }
        current.push_str(line);
        current.push('\n');
        current_len += line_len;
    }

    if !current.trim().is_empty() {
        chunks.push(current.trim_end().to_string());
    }

    if chunks.is_empty() {
        chunks.push(text.to_string());
    }
    chunks
}

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    #[allow(dead_code)]
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_message_is_a_single_chunk() {
        assert_eq!(chunk_message("hello", 3500), vec!["hello".to_string()]);
    }

    #[test]
    fn long_message_splits_on_line_boundaries() {
        let line = "x".repeat(20);
        let text = vec![line.clone(); 10].join("\n");
        let chunks = chunk_message(&text, 50);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 50 + line.chars().count());
        }
    }

    #[test]
    fn preference_key_maps_each_level() {
        assert_eq!(preference_key_for_level("critical"), "notify_critical");
        assert_eq!(preference_key_for_level("important"), "notify_important");
        assert_eq!(preference_key_for_level("fyi"), "notify_fyi");
        assert_eq!(preference_key_for_level("silent"), "notify_silent");
    }

    #[test]
    fn formats_title_and_message() {
        let payload = serde_json::json!({"title": "Morning briefing", "message": "3 events today"});
        assert_eq!(format_notification(&payload), "Morning briefing\n3 events today");
    }

    #[test]
    fn silenced_level_is_respected_via_preference_default() {
        let store = Store::open_in_memory().unwrap();
        store.set_preference("notify_fyi", &serde_json::json!(false), 1.0, "test").unwrap();
        let enabled = store.get_preference(preference_key_for_level("fyi"), serde_json::json!(true)).unwrap();
        assert_eq!(enabled, serde_json::json!(false));
    }
}
