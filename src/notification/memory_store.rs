use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use super::notification_models::{
    DeliveryOutcome, NewNotification, Notification, NotificationFilter, NotificationStatus,
    StatusSummary,
};
use super::notification_store::{next_retry_count, NotificationStore};
use crate::error::Result;

/// In-process store with the same claim semantics as the Postgres one.
///
/// Conditional updates run under the map's per-entry write lock, which plays
/// the role of the row lock.
#[derive(Default)]
pub struct InMemoryNotificationStore {
    rows: DashMap<Uuid, Notification>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully-formed row, bypassing the defaults applied by `insert`.
    pub fn put(&self, notification: Notification) {
        self.rows.insert(notification.id, notification);
    }

    pub fn get(&self, id: Uuid) -> Option<Notification> {
        self.rows.get(&id).map(|row| row.clone())
    }

    fn sorted<F>(&self, keep: F) -> Vec<Notification>
    where
        F: Fn(&Notification) -> bool,
    {
        let mut rows: Vec<Notification> = self
            .rows
            .iter()
            .filter(|row| keep(row.value()))
            .map(|row| row.value().clone())
            .collect();
        rows.sort_by_key(|row| row.created_at);
        rows
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn insert(&self, new: NewNotification) -> Result<Notification> {
        let now = Utc::now();
        let notification = Notification {
            id: Uuid::new_v4(),
            recipient_id: new.recipient_id,
            recipient_type: new.recipient_type,
            notification_type: new.notification_type,
            title: new.title,
            message: new.message,
            status: NotificationStatus::Pending,
            retry_count: 0,
            max_retries: new.max_retries,
            email_sent: false,
            sms_sent: false,
            push_sent: false,
            sent_at: None,
            error_message: None,
            metadata: new.metadata,
            locked_by: None,
            locked_until: None,
            created_at: now,
            updated_at: now,
        };
        self.rows.insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Notification>> {
        Ok(self.get(id))
    }

    async fn list(&self, filter: &NotificationFilter) -> Result<Vec<Notification>> {
        let mut rows = self.sorted(|row| {
            filter.status.map_or(true, |status| row.status == status)
                && filter
                    .recipient_id
                    .as_ref()
                    .map_or(true, |recipient| &row.recipient_id == recipient)
        });
        rows.reverse();
        Ok(rows
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect())
    }

    async fn find_eligible(&self, limit: i64) -> Result<Vec<Notification>> {
        let now = Utc::now();
        let rows = self.sorted(|row| row.is_eligible() && !row.is_claimed(now));
        Ok(rows.into_iter().take(limit.max(0) as usize).collect())
    }

    async fn claim(
        &self,
        id: Uuid,
        worker: Uuid,
        lease: Duration,
    ) -> Result<Option<Notification>> {
        let now = Utc::now();
        let Some(mut row) = self.rows.get_mut(&id) else {
            return Ok(None);
        };
        if !row.is_eligible() || row.is_claimed(now) {
            return Ok(None);
        }
        row.locked_by = Some(worker);
        let lease = chrono::Duration::from_std(lease).unwrap_or_else(|_| chrono::Duration::zero());
        row.locked_until = Some(now + lease);
        Ok(Some(row.clone()))
    }

    async fn record_outcome(
        &self,
        id: Uuid,
        worker: Uuid,
        outcome: &DeliveryOutcome,
    ) -> Result<Option<Notification>> {
        let Some(mut row) = self.rows.get_mut(&id) else {
            return Ok(None);
        };
        let open = matches!(
            row.status,
            NotificationStatus::Pending | NotificationStatus::Failed
        );
        if row.locked_by != Some(worker) || !open {
            return Ok(None);
        }

        row.status = outcome.status;
        row.email_sent |= outcome.email_sent;
        row.sms_sent |= outcome.sms_sent;
        row.push_sent |= outcome.push_sent;
        row.sent_at = row.sent_at.or(outcome.sent_at);
        row.retry_count = next_retry_count(row.retry_count, row.max_retries, outcome);
        row.error_message = outcome.error_message.clone();
        row.locked_by = None;
        row.locked_until = None;
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn cancel(&self, id: Uuid) -> Result<Option<Notification>> {
        let Some(mut row) = self.rows.get_mut(&id) else {
            return Ok(None);
        };
        if !row.is_eligible() {
            return Ok(None);
        }
        row.status = NotificationStatus::Cancelled;
        row.locked_by = None;
        row.locked_until = None;
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn stats(&self, status: Option<NotificationStatus>) -> Result<Vec<StatusSummary>> {
        let mut groups: HashMap<NotificationStatus, Vec<Notification>> = HashMap::new();
        for row in self.rows.iter() {
            if status.map_or(true, |wanted| row.status == wanted) {
                groups.entry(row.status).or_default().push(row.value().clone());
            }
        }

        let mut summaries: Vec<StatusSummary> = groups
            .into_iter()
            .map(|(status, rows)| {
                let count = rows.len() as i64;
                let total: i64 = rows.iter().map(|row| row.retry_count as i64).sum();
                StatusSummary {
                    status,
                    count,
                    avg_retry_count: total as f64 / count as f64,
                    max_retry_count: rows.iter().map(|row| row.retry_count).max().unwrap_or(0),
                    exceeded_count: rows.iter().filter(|row| row.is_exhausted()).count() as i64,
                }
            })
            .collect();
        summaries.sort_by(|a, b| a.status.as_str().cmp(b.status.as_str()));
        Ok(summaries)
    }

    async fn exhausted(&self, limit: i64) -> Result<Vec<Notification>> {
        let mut rows = self.sorted(Notification::is_exhausted);
        rows.sort_by_key(|row| std::cmp::Reverse(row.updated_at));
        Ok(rows.into_iter().take(limit.max(0) as usize).collect())
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let before = self.rows.len();
        self.rows.retain(|_, row| {
            let purgeable = matches!(
                row.status,
                NotificationStatus::Sent | NotificationStatus::Failed
            );
            !(purgeable && row.created_at < cutoff)
        });
        Ok((before - self.rows.len()) as u64)
    }
}
