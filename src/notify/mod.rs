//! Delivery channels for the daily digest.
//!
//! The runner only sees [`Notifier`]; swapping email for a chat webhook does
//! not touch selection or formatting.

pub mod gmail;
pub mod webhook;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::info;

use crate::strategies::digest::DigestMessage;

pub use gmail::GmailNotifier;
pub use webhook::WebhookNotifier;

#[derive(Debug, thiserror::Error)]
pub enum NotifierDeliveryError {
    #[error("Missing or unreadable credentials: {0}")]
    Credentials(String),

    #[error("Token refresh failed: {0}")]
    Auth(String),

    #[error("Send request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{channel} rejected the message ({status}): {body}")]
    Rejected {
        channel: &'static str,
        status: StatusCode,
        body: String,
    },
}

/// Anything that can take a finished digest and report whether the send worked.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short channel name for logs
    fn channel(&self) -> &'static str;

    async fn send(&self, message: &DigestMessage) -> Result<(), NotifierDeliveryError>;
}

/// Writes the digest to the log instead of delivering it.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn channel(&self) -> &'static str {
        "log"
    }

    async fn send(&self, message: &DigestMessage) -> Result<(), NotifierDeliveryError> {
        info!(picks = message.picks.len(), "{}", message.header);
        for line in message.lines.iter().chain(message.footer.iter()) {
            info!("  {}", line);
        }
        Ok(())
    }
}

pub(crate) async fn reject_unless_success(
    channel: &'static str,
    response: reqwest::Response,
) -> Result<(), NotifierDeliveryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    Err(NotifierDeliveryError::Rejected {
        channel,
        status,
        body: body.trim().chars().take(200).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_notifier_always_succeeds() {
        let message = DigestMessage {
            header: "MLB favorites".to_string(),
            lines: vec!["Yankees -150 vs Red Sox (fanduel)".to_string()],
            footer: None,
            picks: vec![],
        };

        let notifier: Box<dyn Notifier> = Box::new(LogNotifier);
        assert_eq!(notifier.channel(), "log");
        assert!(notifier.send(&message).await.is_ok());
    }
}
