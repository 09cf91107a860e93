use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::channels::ChannelKind;
use super::dispatcher::Dispatcher;
use super::notification_dto::{
    CreateNotificationRequest, ListNotificationsQuery, NotificationStatsResponse, PurgeResponse,
};
use super::notification_models::{NewNotification, Notification, NotificationFilter, NotificationStatus};
use super::notification_store::NotificationStore;
use super::retry_scheduler::{RetryScheduler, RetrySummary};
use crate::error::{AppError, Result};

const MAX_PAGE_SIZE: u32 = 100;

/// Upper bound for a purge age, roughly ten years.
pub const MAX_PURGE_AGE_DAYS: i64 = 3650;

/// Service layer for the notification lifecycle.
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    dispatcher: Dispatcher,
    scheduler: RetryScheduler,
    default_max_retries: i32,
    purge_after_days: i64,
}

impl NotificationService {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        dispatcher: Dispatcher,
        scheduler: RetryScheduler,
        default_max_retries: i32,
        purge_after_days: i64,
    ) -> Self {
        Self {
            store,
            dispatcher,
            scheduler,
            default_max_retries,
            purge_after_days,
        }
    }

    pub fn enabled_channels(&self) -> Vec<ChannelKind> {
        self.dispatcher.channel_kinds()
    }

    pub async fn create(&self, payload: CreateNotificationRequest) -> Result<Notification> {
        let recipient_id = not_blank("recipient_id", &payload.recipient_id)?;
        let notification_type = not_blank("type", &payload.notification_type)?;
        let title = not_blank("title", &payload.title)?;
        let message = not_blank("message", &payload.message)?;

        let metadata = match payload.metadata {
            None | Some(serde_json::Value::Null) => serde_json::json!({}),
            Some(value @ serde_json::Value::Object(_)) => value,
            Some(_) => {
                return Err(AppError::Validation("metadata must be a JSON object".to_string()))
            }
        };

        let new = NewNotification {
            recipient_id,
            recipient_type: payload.recipient_type,
            notification_type,
            title,
            message,
            max_retries: payload.max_retries.unwrap_or(self.default_max_retries),
            metadata,
        };

        self.notify(new, payload.dispatch.unwrap_or(true)).await
    }

    /// Persist a notification and optionally try to deliver it right away.
    ///
    /// Delivery problems are logged, never returned: the record is already
    /// stored and the retry scheduler will pick it up.
    pub async fn notify(&self, new: NewNotification, dispatch: bool) -> Result<Notification> {
        let created = self.store.insert(new).await?;
        tracing::info!(
            "Notification created: {} for {} {}",
            created.notification_type,
            created.recipient_type,
            created.recipient_id
        );

        if !dispatch {
            return Ok(created);
        }

        match self.dispatcher.claim_and_dispatch(created.id).await {
            Ok(Some(updated)) => Ok(updated),
            Ok(None) => Ok(created),
            Err(e) => {
                tracing::error!("Immediate dispatch of notification {} failed: {:?}", created.id, e);
                Ok(created)
            }
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Notification> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))
    }

    pub async fn list(&self, query: ListNotificationsQuery) -> Result<Vec<Notification>> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(20).clamp(1, MAX_PAGE_SIZE);

        let filter = NotificationFilter {
            status: query.status,
            recipient_id: query.recipient_id,
            limit: limit as i64,
            offset: ((page - 1) as i64) * limit as i64,
        };

        self.store.list(&filter).await
    }

    pub async fn cancel(&self, id: Uuid) -> Result<Notification> {
        if let Some(cancelled) = self.store.cancel(id).await? {
            tracing::info!("Notification {} cancelled", id);
            return Ok(cancelled);
        }

        let existing = self.get(id).await?;
        Err(AppError::Conflict(format!(
            "Notification is {} and can no longer be cancelled",
            describe(&existing)
        )))
    }

    /// Operator-requested delivery attempt for a single record.
    pub async fn dispatch_now(&self, id: Uuid) -> Result<Notification> {
        if let Some(updated) = self.dispatcher.claim_and_dispatch(id).await? {
            return Ok(updated);
        }

        let existing = self.get(id).await?;
        if existing.is_eligible() && existing.is_claimed(Utc::now()) {
            Err(AppError::Conflict("Notification is being delivered".to_string()))
        } else if existing.is_eligible() {
            Err(AppError::Conflict("Notification changed during delivery".to_string()))
        } else {
            Err(AppError::Conflict(format!(
                "Notification is {} and will not be retried",
                describe(&existing)
            )))
        }
    }

    /// Out-of-band retry sweep, same as one scheduler pass.
    pub async fn retry_sweep(&self) -> Result<RetrySummary> {
        self.scheduler.run_pass().await
    }

    pub async fn stats(&self, status: Option<NotificationStatus>) -> Result<NotificationStatsResponse> {
        Ok(self.store.stats(status).await?.into())
    }

    pub async fn exhausted(&self, limit: Option<u32>) -> Result<Vec<Notification>> {
        let limit = limit.unwrap_or(50).clamp(1, MAX_PAGE_SIZE);
        self.store.exhausted(limit as i64).await
    }

    pub async fn purge(&self, older_than_days: Option<i64>) -> Result<PurgeResponse> {
        let days = older_than_days.unwrap_or(self.purge_after_days);
        if !(1..=MAX_PURGE_AGE_DAYS).contains(&days) {
            return Err(AppError::BadRequest(format!(
                "older_than_days must be between 1 and {}",
                MAX_PURGE_AGE_DAYS
            )));
        }

        let cutoff = Duration::try_days(days)
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .ok_or_else(|| AppError::BadRequest("older_than_days is too large".to_string()))?;
        let deleted = self.store.purge_older_than(cutoff).await?;
        tracing::info!("Purged {} notifications created before {}", deleted, cutoff);

        Ok(PurgeResponse { deleted, cutoff })
    }
}

fn not_blank(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} must not be blank", field)));
    }
    Ok(trimmed.to_string())
}

fn describe(notification: &Notification) -> String {
    if notification.is_exhausted() {
        "failed with retries exhausted".to_string()
    } else {
        notification.status.to_string()
    }
}

#[cfg(test)]
pub(crate) fn service_with(
    store: Arc<dyn NotificationStore>,
    channels: Vec<Arc<dyn super::channels::NotificationChannel>>,
) -> NotificationService {
    let lease = std::time::Duration::from_secs(60);
    let dispatcher = Dispatcher::new(store.clone(), channels, lease);
    let scheduler = RetryScheduler::new(
        store.clone(),
        dispatcher.clone(),
        std::time::Duration::from_secs(60),
        50,
        tokio_util::sync::CancellationToken::new(),
    );
    NotificationService::new(store, dispatcher, scheduler, 3, 30)
}
