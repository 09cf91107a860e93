//! Delivery channels.
//!
//! A channel knows how to find its address on a notification and how to hand
//! the message to its provider. Channels whose provider is not configured are
//! never constructed, so the dispatcher only sees enabled ones.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::notification_models::Notification;
use crate::error::ChannelError;
use crate::state::Config;

pub mod email;
pub mod sms;

pub use email::EmailChannel;
pub use sms::SmsChannel;

/// Which delivery flag a channel owns on the notification record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Email,
    Sms,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Email => "email",
            ChannelKind::Sms => "sms",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn kind(&self) -> ChannelKind;

    /// Where this channel would deliver the notification, if it can at all.
    fn address_for(&self, notification: &Notification) -> Option<String>;

    async fn send(&self, recipient: &str, notification: &Notification) -> Result<(), ChannelError>;
}

/// Shared HTTP client for provider callouts; every request is bounded.
pub fn http_client(timeout: Duration, connect_timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(connect_timeout)
        .build()
}

/// Build every channel whose provider is configured.
pub fn from_config(
    config: &Config,
    client: reqwest::Client,
) -> Vec<Arc<dyn NotificationChannel>> {
    let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();

    match &config.resend_api_key {
        Some(api_key) => channels.push(Arc::new(EmailChannel::new(
            client.clone(),
            config.resend_api_url.clone(),
            api_key.clone(),
            config.email_from.clone(),
        ))),
        None => tracing::warn!("RESEND_API_KEY not configured, email channel disabled"),
    }

    match &config.whatsapp_webhook_url {
        Some(url) => channels.push(Arc::new(SmsChannel::new(client, url.clone()))),
        None => tracing::warn!("WHATSAPP_WEBHOOK_URL not configured, SMS channel disabled"),
    }

    channels
}

/// Read the body of a non-success response for the error message.
pub(crate) async fn provider_error(response: reqwest::Response) -> ChannelError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ChannelError::Provider {
        status,
        body: body.chars().take(200).collect(),
    }
}
