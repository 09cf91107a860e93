use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use utoipa::ToSchema;

use super::dispatcher::Dispatcher;
use super::notification_models::NotificationStatus;
use super::notification_store::NotificationStore;
use crate::error::Result;

/// `tokio::time::interval` rejects a zero period.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct RetrySummary {
    /// Records returned by the eligibility query.
    pub selected: usize,
    pub sent: usize,
    pub failed: usize,
    /// Cancelled, delivered or claimed elsewhere between selection and claim.
    pub skipped: usize,
    pub errors: usize,
}

/// Periodically resubmits eligible notifications to the dispatcher.
#[derive(Clone)]
pub struct RetryScheduler {
    store: Arc<dyn NotificationStore>,
    dispatcher: Dispatcher,
    interval: Duration,
    batch_size: i64,
    cancel: CancellationToken,
}

impl RetryScheduler {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        dispatcher: Dispatcher,
        interval: Duration,
        batch_size: i64,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            dispatcher,
            interval: interval.max(MIN_INTERVAL),
            batch_size: batch_size.max(1),
            cancel,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    /// Scan on a fixed interval until the token is cancelled.
    ///
    /// A pass that is under way when cancellation arrives stops after the
    /// record in flight.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Notification retry scheduler started (every {:?}, batch {})",
            self.interval, self.batch_size
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.run_pass().await {
                error!("Error in notification retry pass: {:?}", e);
            }
        }

        info!("Notification retry scheduler stopped");
    }

    /// One sweep over the eligible records, oldest first.
    pub async fn run_pass(&self) -> Result<RetrySummary> {
        let candidates = self.store.find_eligible(self.batch_size).await?;
        let mut summary = RetrySummary {
            selected: candidates.len(),
            ..RetrySummary::default()
        };

        for candidate in candidates {
            if self.cancel.is_cancelled() {
                break;
            }

            match self.dispatcher.claim_and_dispatch(candidate.id).await {
                Ok(Some(updated)) if updated.status == NotificationStatus::Sent => summary.sent += 1,
                Ok(Some(_)) => summary.failed += 1,
                Ok(None) => summary.skipped += 1,
                Err(e) => {
                    error!("Failed to retry notification {}: {:?}", candidate.id, e);
                    summary.errors += 1;
                }
            }
        }

        if summary.selected > 0 {
            info!(
                "Retry pass: {} selected, {} sent, {} failed, {} skipped, {} errors",
                summary.selected, summary.sent, summary.failed, summary.skipped, summary.errors
            );
        }

        Ok(summary)
    }
}
