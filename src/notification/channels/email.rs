use async_trait::async_trait;
use serde_json::json;

use super::{provider_error, ChannelKind, NotificationChannel};
use crate::error::ChannelError;
use crate::notification::notification_models::Notification;

/// Transactional email through the Resend HTTP API.
pub struct EmailChannel {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl EmailChannel {
    pub fn new(client: reqwest::Client, api_url: String, api_key: String, from: String) -> Self {
        Self {
            client,
            api_url,
            api_key,
            from,
        }
    }

    /// The recipient id when it is an email address, else `metadata.email`.
    pub fn address(notification: &Notification) -> Option<String> {
        let recipient = notification.recipient_id.trim();
        if recipient.contains('@') {
            return Some(recipient.to_string());
        }
        notification
            .metadata_str("email")
            .filter(|email| email.contains('@'))
            .map(str::to_string)
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    fn address_for(&self, notification: &Notification) -> Option<String> {
        Self::address(notification)
    }

    async fn send(&self, recipient: &str, notification: &Notification) -> Result<(), ChannelError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": [recipient],
                "subject": notification.title,
                "html": notification.message,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(provider_error(response).await);
        }

        tracing::debug!("Email accepted by provider for {}", recipient);
        Ok(())
    }
}
