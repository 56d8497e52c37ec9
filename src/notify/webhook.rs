use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::info;

use crate::notify::{reject_unless_success, Notifier, NotifierDeliveryError};
use crate::strategies::digest::DigestMessage;

/// Chat webhook (Discord, or Slack-compatible) that accepts `{"content": ...}`.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    webhook_url: String,
}

impl WebhookNotifier {
    pub fn new(client: Client, webhook_url: String) -> Self {
        Self {
            client,
            webhook_url,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn channel(&self) -> &'static str {
        "webhook"
    }

    async fn send(&self, message: &DigestMessage) -> Result<(), NotifierDeliveryError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&json!({ "content": message.body() }))
            .send()
            .await?;

        reject_unless_success(self.channel(), response).await?;
        info!(picks = message.picks.len(), "Digest posted to webhook");
        Ok(())
    }
}
