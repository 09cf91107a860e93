use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

use super::notification_models::{
    DeliveryOutcome, NewNotification, Notification, NotificationFilter, NotificationStatus,
    StatusSummary,
};
use crate::error::Result;

/// Persistence seam for notification records.
///
/// Every mutation is a single-record atomic update keyed by id. A record is
/// only ever dispatched by the worker that holds its claim, so two workers
/// can never both count a failed attempt against the same record.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(&self, new: NewNotification) -> Result<Notification>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Notification>>;

    /// Newest first.
    async fn list(&self, filter: &NotificationFilter) -> Result<Vec<Notification>>;

    /// Eligible, unclaimed records, oldest `created_at` first.
    async fn find_eligible(&self, limit: i64) -> Result<Vec<Notification>>;

    /// Atomically re-check eligibility and take the claim for `worker`.
    ///
    /// Returns `None` when the record is gone, no longer eligible (sent,
    /// cancelled, exhausted) or currently claimed by someone else.
    async fn claim(&self, id: Uuid, worker: Uuid, lease: Duration)
        -> Result<Option<Notification>>;

    /// Write the outcome of a dispatch and release the claim.
    ///
    /// Returns `None` without writing when `worker` no longer holds the claim
    /// or the record left pending/failed in the meantime (e.g. cancelled).
    async fn record_outcome(
        &self,
        id: Uuid,
        worker: Uuid,
        outcome: &DeliveryOutcome,
    ) -> Result<Option<Notification>>;

    /// Cancel a pending record or a failed one with retries left.
    async fn cancel(&self, id: Uuid) -> Result<Option<Notification>>;

    async fn stats(&self, status: Option<NotificationStatus>) -> Result<Vec<StatusSummary>>;

    async fn exhausted(&self, limit: i64) -> Result<Vec<Notification>>;

    /// Delete sent and failed records created before `cutoff`. Pending and
    /// cancelled records are never touched.
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// New `retry_count` after an outcome: failures add one, capped at `max_retries`.
pub fn next_retry_count(current: i32, max_retries: i32, outcome: &DeliveryOutcome) -> i32 {
    if outcome.counts_as_retry() {
        (current + 1).min(max_retries).max(current)
    } else {
        current
    }
}
