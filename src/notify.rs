//! Outbound webhook notifications.
//!
//! Terminal outcomes are pushed as embed payloads to the task's configured
//! webhook URL. Delivery failures are logged and swallowed; the portal
//! workflows never block or retry on the notification path.

use chrono::Utc;
use serde::Serialize;

use crate::client::SessionClient;

#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload {
    pub username: &'static str,
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub footer: Footer,
    /// ISO-8601 with millisecond precision, UTC
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Footer {
    pub text: &'static str,
}

impl WebhookPayload {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            username: "veil",
            embeds: vec![Embed {
                title: title.into(),
                description: description.into(),
                footer: Footer { text: "Veil" },
                timestamp: Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            }],
        }
    }
}

/// Fire a notification at the task's webhook. Failures are not surfaced.
pub async fn send(client: &SessionClient, webhook_url: &str, title: &str, description: &str) {
    if webhook_url.is_empty() {
        return;
    }
    let payload = WebhookPayload::new(title, description);
    if let Err(e) = client.post_json(webhook_url, &payload).await {
        tracing::warn!("Webhook delivery failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_carries_embed_and_footer() {
        let payload = WebhookPayload::new("MATH 1A", "Registered");
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["username"], "veil");
        assert_eq!(json["embeds"][0]["title"], "MATH 1A");
        assert_eq!(json["embeds"][0]["description"], "Registered");
        assert_eq!(json["embeds"][0]["footer"]["text"], "Veil");
    }

    #[test]
    fn payload_timestamp_is_iso8601_millis_utc() {
        let payload = WebhookPayload::new("t", "d");
        let ts = &payload.embeds[0].timestamp;
        let pattern = regex::Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}Z$").unwrap();
        assert!(pattern.is_match(ts), "bad timestamp: {}", ts);
    }
}
