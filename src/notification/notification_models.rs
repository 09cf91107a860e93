use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
    Cancelled,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Failed => "failed",
            NotificationStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RecipientType {
    Customer,
    Driver,
    Admin,
}

impl std::fmt::Display for RecipientType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecipientType::Customer => write!(f, "customer"),
            RecipientType::Driver => write!(f, "driver"),
            RecipientType::Admin => write!(f, "admin"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: String,
    pub recipient_type: RecipientType,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub status: NotificationStatus,
    pub retry_count: i32,
    pub max_retries: i32,
    pub email_sent: bool,
    pub sms_sent: bool,
    pub push_sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    #[serde(skip)]
    pub locked_by: Option<Uuid>,
    #[serde(skip)]
    pub locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    /// Whether the retry loop may attempt this record (ignoring claims).
    pub fn is_eligible(&self) -> bool {
        match self.status {
            NotificationStatus::Pending => true,
            NotificationStatus::Failed => self.retry_count < self.max_retries,
            NotificationStatus::Sent | NotificationStatus::Cancelled => false,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.status == NotificationStatus::Failed && self.retry_count >= self.max_retries
    }

    pub fn is_claimed(&self, now: DateTime<Utc>) -> bool {
        matches!(self.locked_until, Some(until) if until > now)
    }

    /// String value stored under `key` in the metadata bag, if any.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(|value| value.as_str())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

/// Row about to be inserted; status, counters and timestamps take their defaults.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_id: String,
    pub recipient_type: RecipientType,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub max_retries: i32,
    pub metadata: serde_json::Value,
}

/// Result of one dispatch attempt, written back in a single update.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryOutcome {
    pub status: NotificationStatus,
    pub email_sent: bool,
    pub sms_sent: bool,
    pub push_sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl DeliveryOutcome {
    pub fn failed(error_message: impl Into<String>) -> Self {
        Self {
            status: NotificationStatus::Failed,
            email_sent: false,
            sms_sent: false,
            push_sent: false,
            sent_at: None,
            error_message: Some(error_message.into()),
        }
    }

    /// Failed attempts consume one retry.
    pub fn counts_as_retry(&self) -> bool {
        self.status == NotificationStatus::Failed
    }
}

#[derive(Debug, Clone, Default)]
pub struct NotificationFilter {
    pub status: Option<NotificationStatus>,
    pub recipient_id: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

/// One row of the per-status rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct StatusSummary {
    pub status: NotificationStatus,
    pub count: i64,
    pub avg_retry_count: f64,
    pub max_retry_count: i32,
    pub exceeded_count: i64,
}

#[cfg(test)]
pub(crate) fn sample_notification() -> Notification {
    let now = Utc::now();
    Notification {
        id: Uuid::new_v4(),
        recipient_id: "rider@example.com".to_string(),
        recipient_type: RecipientType::Customer,
        notification_type: "booking_confirmation".to_string(),
        title: "Booking Confirmation".to_string(),
        message: "Your ride is booked".to_string(),
        status: NotificationStatus::Pending,
        retry_count: 0,
        max_retries: 3,
        email_sent: false,
        sms_sent: false,
        push_sent: false,
        sent_at: None,
        error_message: None,
        metadata: serde_json::json!({}),
        locked_by: None,
        locked_until: None,
        created_at: now,
        updated_at: now,
    }
}
