use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use super::notification_models::{
    DeliveryOutcome, NewNotification, Notification, NotificationFilter, NotificationStatus,
    StatusSummary,
};
use super::notification_store::NotificationStore;
use crate::error::Result;

// Kept in sync with `Notification::is_eligible`.
const ELIGIBLE: &str = "(status = 'pending' OR (status = 'failed' AND retry_count < max_retries))";

/// Postgres-backed notification store.
#[derive(Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for NotificationRepository {
    async fn insert(&self, new: NewNotification) -> Result<Notification> {
        let notification = sqlx::query_as::<_, Notification>(
            "INSERT INTO notifications
                (recipient_id, recipient_type, type, title, message, max_retries, metadata)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(&new.recipient_id)
        .bind(new.recipient_type)
        .bind(&new.notification_type)
        .bind(&new.title)
        .bind(&new.message)
        .bind(new.max_retries)
        .bind(&new.metadata)
        .fetch_one(&self.pool)
        .await?;

        Ok(notification)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Notification>> {
        let notification =
            sqlx::query_as::<_, Notification>("SELECT * FROM notifications WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(notification)
    }

    async fn list(&self, filter: &NotificationFilter) -> Result<Vec<Notification>> {
        let mut query = "SELECT * FROM notifications WHERE TRUE".to_string();
        let mut params_count = 0;

        if filter.status.is_some() {
            params_count += 1;
            query.push_str(&format!(" AND status = ${}", params_count));
        }

        if filter.recipient_id.is_some() {
            params_count += 1;
            query.push_str(&format!(" AND recipient_id = ${}", params_count));
        }

        query.push_str(&format!(
            " ORDER BY created_at DESC LIMIT ${} OFFSET ${}",
            params_count + 1,
            params_count + 2
        ));

        let mut db_query = sqlx::query_as::<_, Notification>(&query);

        if let Some(status) = filter.status {
            db_query = db_query.bind(status);
        }

        if let Some(recipient_id) = &filter.recipient_id {
            db_query = db_query.bind(recipient_id);
        }

        let notifications = db_query
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(notifications)
    }

    async fn find_eligible(&self, limit: i64) -> Result<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(&format!(
            "SELECT * FROM notifications
             WHERE {ELIGIBLE}
               AND (locked_until IS NULL OR locked_until < NOW())
             ORDER BY created_at ASC
             LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    async fn claim(
        &self,
        id: Uuid,
        worker: Uuid,
        lease: Duration,
    ) -> Result<Option<Notification>> {
        let notification = sqlx::query_as::<_, Notification>(&format!(
            "UPDATE notifications
             SET locked_by = $2,
                 locked_until = NOW() + make_interval(secs => $3)
             WHERE id = $1
               AND {ELIGIBLE}
               AND (locked_until IS NULL OR locked_until < NOW())
             RETURNING *"
        ))
        .bind(id)
        .bind(worker)
        .bind(lease.as_secs_f64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(notification)
    }

    async fn record_outcome(
        &self,
        id: Uuid,
        worker: Uuid,
        outcome: &DeliveryOutcome,
    ) -> Result<Option<Notification>> {
        let notification = sqlx::query_as::<_, Notification>(
            "UPDATE notifications
             SET status = $3,
                 email_sent = email_sent OR $4,
                 sms_sent = sms_sent OR $5,
                 push_sent = push_sent OR $6,
                 sent_at = COALESCE(sent_at, $7),
                 retry_count = CASE
                     WHEN $8 THEN GREATEST(retry_count, LEAST(retry_count + 1, max_retries))
                     ELSE retry_count
                 END,
                 error_message = $9,
                 locked_by = NULL,
                 locked_until = NULL,
                 updated_at = NOW()
             WHERE id = $1
               AND locked_by = $2
               AND status IN ('pending', 'failed')
             RETURNING *",
        )
        .bind(id)
        .bind(worker)
        .bind(outcome.status)
        .bind(outcome.email_sent)
        .bind(outcome.sms_sent)
        .bind(outcome.push_sent)
        .bind(outcome.sent_at)
        .bind(outcome.counts_as_retry())
        .bind(&outcome.error_message)
        .fetch_optional(&self.pool)
        .await?;

        Ok(notification)
    }

    async fn cancel(&self, id: Uuid) -> Result<Option<Notification>> {
        let notification = sqlx::query_as::<_, Notification>(&format!(
            "UPDATE notifications
             SET status = 'cancelled',
                 locked_by = NULL,
                 locked_until = NULL,
                 updated_at = NOW()
             WHERE id = $1 AND {ELIGIBLE}
             RETURNING *"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(notification)
    }

    async fn stats(&self, status: Option<NotificationStatus>) -> Result<Vec<StatusSummary>> {
        let summaries = sqlx::query_as::<_, StatusSummary>(
            "SELECT status, count, avg_retry_count, max_retry_count, exceeded_count
             FROM notification_status_summary
             WHERE $1::text IS NULL OR status = $1
             ORDER BY status",
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(summaries)
    }

    async fn exhausted(&self, limit: i64) -> Result<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            "SELECT * FROM exhausted_notifications ORDER BY updated_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM notifications
             WHERE status IN ('sent', 'failed') AND created_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
