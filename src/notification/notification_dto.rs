use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::notification_models::{NotificationStatus, RecipientType, StatusSummary};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateNotificationRequest {
    /// Account id or a raw contact address.
    #[validate(length(min = 1, max = 255))]
    pub recipient_id: String,
    pub recipient_type: RecipientType,
    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 100))]
    pub notification_type: String,
    #[validate(length(min = 1, max = 500))]
    pub title: String,
    #[validate(length(min = 1))]
    pub message: String,
    #[validate(range(min = 0, max = 10))]
    pub max_retries: Option<i32>,
    /// Extra contact details (`email`, `phone`) and free-form context.
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
    /// Attempt delivery before responding (default true).
    pub dispatch: Option<bool>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListNotificationsQuery {
    pub status: Option<NotificationStatus>,
    pub recipient_id: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatsQuery {
    pub status: Option<NotificationStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExhaustedQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PurgeQuery {
    pub older_than_days: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NotificationStatsResponse {
    pub groups: Vec<StatusSummary>,
    pub total: i64,
    pub exceeded_max_retries: i64,
}

impl From<Vec<StatusSummary>> for NotificationStatsResponse {
    fn from(groups: Vec<StatusSummary>) -> Self {
        let total = groups.iter().map(|group| group.count).sum();
        let exceeded_max_retries = groups.iter().map(|group| group.exceeded_count).sum();
        Self {
            groups,
            total,
            exceeded_max_retries,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PurgeResponse {
    pub deleted: u64,
    pub cutoff: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub service: String,
    pub channels: ChannelsHealth,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChannelsHealth {
    pub email: bool,
    pub sms: bool,
}
