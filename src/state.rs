use crate::notification::notification_service::MAX_PURGE_AGE_DAYS;
use crate::notification::NotificationService;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub notification_service: NotificationService,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{0} must be a number")]
    NotANumber(&'static str),

    #[error("{0} is out of range")]
    OutOfRange(&'static str),
}

/// Placeholder shipped in sample env files; treated as "not configured".
const WEBHOOK_PLACEHOLDER: &str = "your-webhook-url-here";

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub resend_api_key: Option<String>,
    pub resend_api_url: String,
    pub email_from: String,
    pub whatsapp_webhook_url: Option<String>,
    pub channel_timeout: Duration,
    pub channel_connect_timeout: Duration,
    pub retry_interval: Duration,
    pub retry_batch_size: i64,
    pub claim_lease: Duration,
    pub default_max_retries: i32,
    pub purge_after_days: i64,
    pub purge_cron: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            database_url: required("DATABASE_URL")?,
            database_max_connections: number("DATABASE_MAX_CONNECTIONS", 5)?,
            host: optional("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: number("PORT", 3000)?,
            jwt_secret: required("JWT_SECRET")?,
            resend_api_key: optional("RESEND_API_KEY"),
            resend_api_url: optional("RESEND_API_URL")
                .unwrap_or_else(|| "https://api.resend.com/emails".to_string()),
            email_from: optional("EMAIL_FROM")
                .unwrap_or_else(|| "Notifications <noreply@example.com>".to_string()),
            whatsapp_webhook_url: optional("WHATSAPP_WEBHOOK_URL")
                .filter(|url| url != WEBHOOK_PLACEHOLDER),
            channel_timeout: Duration::from_secs(number("CHANNEL_TIMEOUT_SECS", 10)?),
            channel_connect_timeout: Duration::from_secs(number(
                "CHANNEL_CONNECT_TIMEOUT_SECS",
                5,
            )?),
            retry_interval: Duration::from_secs(number("RETRY_INTERVAL_SECS", 300)?),
            retry_batch_size: number("RETRY_BATCH_SIZE", 50)?,
            claim_lease: Duration::from_secs(number("CLAIM_LEASE_SECS", 300)?),
            default_max_retries: number("DEFAULT_MAX_RETRIES", 3)?,
            purge_after_days: number("PURGE_AFTER_DAYS", 30)?,
            purge_cron: optional("PURGE_CRON").unwrap_or_else(|| "0 0 3 * * *".to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the scheduler, claim lease or purge cannot work with.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_interval.is_zero() {
            return Err(ConfigError::OutOfRange("RETRY_INTERVAL_SECS"));
        }
        if self.retry_batch_size < 1 {
            return Err(ConfigError::OutOfRange("RETRY_BATCH_SIZE"));
        }
        // A claim must outlive the slowest provider call it guards.
        if self.claim_lease.is_zero() || self.claim_lease <= self.channel_timeout {
            return Err(ConfigError::OutOfRange("CLAIM_LEASE_SECS"));
        }
        if !(0..=MAX_RETRIES_LIMIT).contains(&self.default_max_retries) {
            return Err(ConfigError::OutOfRange("DEFAULT_MAX_RETRIES"));
        }
        if !(1..=MAX_PURGE_AGE_DAYS).contains(&self.purge_after_days) {
            return Err(ConfigError::OutOfRange("PURGE_AFTER_DAYS"));
        }
        Ok(())
    }
}

/// Same ceiling as `max_retries` on a create request.
const MAX_RETRIES_LIMIT: i32 = 10;

/// Empty values count as unset.
fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    optional(key).ok_or(ConfigError::Missing(key))
}

fn number<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(key) {
        Some(value) => value.parse().map_err(|_| ConfigError::NotANumber(key)),
        None => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            database_url: "postgres://localhost/notifications_test".to_string(),
            database_max_connections: 1,
            host: "127.0.0.1".to_string(),
            port: 0,
            jwt_secret: "test-secret".to_string(),
            resend_api_key: None,
            resend_api_url: "http://127.0.0.1:9/emails".to_string(),
            email_from: "Test <noreply@example.com>".to_string(),
            whatsapp_webhook_url: None,
            channel_timeout: Duration::from_secs(2),
            channel_connect_timeout: Duration::from_secs(1),
            retry_interval: Duration::from_millis(50),
            retry_batch_size: 50,
            claim_lease: Duration::from_secs(60),
            default_max_retries: 3,
            purge_after_days: 30,
            purge_cron: "0 0 3 * * *".to_string(),
        }
    }
}
