use async_trait::async_trait;
use serde_json::json;

use super::{provider_error, ChannelKind, NotificationChannel};
use crate::error::ChannelError;
use crate::notification::notification_models::Notification;

/// SMS / WhatsApp delivery through an HTTP webhook.
pub struct SmsChannel {
    client: reqwest::Client,
    webhook_url: String,
}

impl SmsChannel {
    pub fn new(client: reqwest::Client, webhook_url: String) -> Self {
        Self {
            client,
            webhook_url,
        }
    }

    /// `metadata.phone`, else the recipient id; whichever is used must look
    /// like a phone number.
    pub fn address(notification: &Notification) -> Option<String> {
        notification
            .metadata_str("phone")
            .map(str::trim)
            .filter(|phone| is_phone_number(phone))
            .or_else(|| Some(notification.recipient_id.trim()).filter(|id| is_phone_number(id)))
            .map(str::to_string)
    }
}

fn is_phone_number(value: &str) -> bool {
    let digits = value.strip_prefix('+').unwrap_or(value);
    (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

#[async_trait]
impl NotificationChannel for SmsChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Sms
    }

    fn address_for(&self, notification: &Notification) -> Option<String> {
        Self::address(notification)
    }

    async fn send(&self, recipient: &str, notification: &Notification) -> Result<(), ChannelError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&json!({
                "phone": recipient,
                "message": notification.message,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(provider_error(response).await);
        }

        tracing::debug!("Webhook accepted message for {}", recipient);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::notification_models::sample_notification;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn channel(url: &str) -> SmsChannel {
        let client = crate::notification::channels::http_client(
            Duration::from_millis(500),
            Duration::from_millis(500),
        )
        .unwrap();
        SmsChannel::new(client, url.to_string())
    }

    #[test]
    fn test_address_resolution() {
        let mut n = sample_notification();
        assert_eq!(SmsChannel::address(&n), None);

        n.recipient_id = "+15551234567".to_string();
        assert_eq!(SmsChannel::address(&n).as_deref(), Some("+15551234567"));

        n.recipient_id = "12ab".to_string();
        n.metadata = json!({ "phone": "+447700900123" });
        assert_eq!(SmsChannel::address(&n).as_deref(), Some("+447700900123"));
    }

    #[test]
    fn test_metadata_phone_must_look_like_a_number() {
        let mut n = sample_notification();
        n.metadata = json!({ "phone": "n/a" });
        assert_eq!(SmsChannel::address(&n), None);

        n.recipient_id = "+15551234567".to_string();
        assert_eq!(SmsChannel::address(&n).as_deref(), Some("+15551234567"));

        n.metadata = json!({ "phone": " +447700900123 " });
        assert_eq!(SmsChannel::address(&n).as_deref(), Some("+447700900123"));
    }

    #[tokio::test]
    async fn test_send_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!({
                "phone": "+15551234567",
                "message": "Your ride is booked",
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let channel = channel(&server.uri());
        let result = channel.send("+15551234567", &sample_notification()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_send_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = channel(&server.uri())
            .send("+15551234567", &sample_notification())
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::Provider { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_malformed_endpoint() {
        let err = channel("not a url")
            .send("+15551234567", &sample_notification())
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::InvalidEndpoint(_)));
    }
}
