use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::channels::{ChannelKind, NotificationChannel};
use super::notification_models::{DeliveryOutcome, Notification, NotificationStatus};
use super::notification_store::NotificationStore;
use crate::error::Result;

pub const NO_CHANNEL_CONFIGURED: &str = "no delivery channel configured";

/// Delivers one claimed notification over every applicable channel.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn NotificationStore>,
    channels: Vec<Arc<dyn NotificationChannel>>,
    lease: Duration,
}

struct Attempt {
    kind: ChannelKind,
    result: std::result::Result<DateTime<Utc>, String>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        channels: Vec<Arc<dyn NotificationChannel>>,
        lease: Duration,
    ) -> Self {
        Self {
            store,
            channels,
            lease,
        }
    }

    pub fn channel_kinds(&self) -> Vec<ChannelKind> {
        self.channels.iter().map(|channel| channel.kind()).collect()
    }

    /// Claim the record and, if that succeeds, dispatch it.
    ///
    /// The claim re-reads the record, so a cancel or a delivery by another
    /// worker since it was selected is honoured. `Ok(None)` means nothing
    /// was attempted or the outcome could not be written.
    pub async fn claim_and_dispatch(&self, id: Uuid) -> Result<Option<Notification>> {
        let worker = Uuid::new_v4();
        match self.store.claim(id, worker, self.lease).await? {
            Some(claimed) => self.dispatch(&claimed, worker).await,
            None => {
                tracing::debug!("Notification {} not claimable, skipping", id);
                Ok(None)
            }
        }
    }

    /// Attempt delivery of a notification already claimed by `worker`.
    ///
    /// Channel failures never surface here: they end up in the returned
    /// record. Only a store failure is an error. `Ok(None)` means the claim
    /// was lost before the outcome could be written (cancelled mid-flight or
    /// lease expired).
    pub async fn dispatch(&self, notification: &Notification, worker: Uuid) -> Result<Option<Notification>> {
        let attempts = self.attempt_channels(notification).await;
        let outcome = summarize(&attempts);

        match outcome.status {
            NotificationStatus::Sent => tracing::info!(
                "Notification {} delivered via {}",
                notification.id,
                attempts
                    .iter()
                    .filter(|attempt| attempt.result.is_ok())
                    .map(|attempt| attempt.kind.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            _ => tracing::warn!(
                "Notification {} delivery failed (attempt {} of {}): {}",
                notification.id,
                notification.retry_count + 1,
                notification.max_retries,
                outcome.error_message.as_deref().unwrap_or_default()
            ),
        }

        let updated = self.store.record_outcome(notification.id, worker, &outcome).await?;
        if updated.is_none() {
            tracing::info!(
                "Outcome for notification {} discarded, claim no longer held",
                notification.id
            );
        }
        Ok(updated)
    }

    async fn attempt_channels(&self, notification: &Notification) -> Vec<Attempt> {
        let sends = self.channels.iter().filter_map(|channel| {
            let recipient = channel.address_for(notification)?;
            Some(async move {
                let result = match channel.send(&recipient, notification).await {
                    Ok(()) => Ok(Utc::now()),
                    Err(e) => Err(e.to_string()),
                };
                Attempt {
                    kind: channel.kind(),
                    result,
                }
            })
        });

        join_all(sends).await
    }
}

fn summarize(attempts: &[Attempt]) -> DeliveryOutcome {
    if attempts.is_empty() {
        return DeliveryOutcome::failed(NO_CHANNEL_CONFIGURED);
    }

    let delivered = |kind: ChannelKind| {
        attempts
            .iter()
            .any(|attempt| attempt.kind == kind && attempt.result.is_ok())
    };
    let first_success = attempts
        .iter()
        .filter_map(|attempt| attempt.result.as_ref().ok().copied())
        .min();

    match first_success {
        Some(sent_at) => DeliveryOutcome {
            status: NotificationStatus::Sent,
            email_sent: delivered(ChannelKind::Email),
            sms_sent: delivered(ChannelKind::Sms),
            push_sent: false,
            sent_at: Some(sent_at),
            error_message: None,
        },
        None => DeliveryOutcome::failed(
            attempts
                .iter()
                .filter_map(|attempt| {
                    attempt
                        .result
                        .as_ref()
                        .err()
                        .map(|e| format!("{}: {}", attempt.kind, e))
                })
                .collect::<Vec<_>>()
                .join("; "),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChannelError;
    use crate::notification::channels::testing::ScriptedChannel;
    use crate::notification::memory_store::InMemoryNotificationStore;
    use crate::notification::notification_models::sample_notification;

    struct Harness {
        store: Arc<InMemoryNotificationStore>,
        dispatcher: Dispatcher,
    }

    fn harness(channels: Vec<Arc<dyn NotificationChannel>>) -> Harness {
        let store = Arc::new(InMemoryNotificationStore::new());
        let dispatcher = Dispatcher::new(store.clone(), channels, Duration::from_secs(60));
        Harness { store, dispatcher }
    }

    async fn claimed(store: &InMemoryNotificationStore, n: Notification, worker: Uuid) -> Notification {
        let id = n.id;
        store.put(n);
        store
            .claim(id, worker, Duration::from_secs(60))
            .await
            .unwrap()
            .expect("record should be claimable")
    }

    #[tokio::test]
    async fn test_email_success_marks_sent() {
        let email = Arc::new(ScriptedChannel::always_ok(ChannelKind::Email));
        let h = harness(vec![email.clone()]);
        let worker = Uuid::new_v4();
        let n = claimed(&h.store, sample_notification(), worker).await;

        let updated = h.dispatcher.dispatch(&n, worker).await.unwrap().unwrap();

        assert_eq!(updated.status, NotificationStatus::Sent);
        assert!(updated.email_sent);
        assert!(!updated.sms_sent);
        assert!(updated.sent_at.is_some());
        assert_eq!(updated.retry_count, 0);
        assert!(updated.error_message.is_none());
        assert!(updated.locked_by.is_none());
        assert_eq!(*email.sent_to.lock().unwrap(), vec!["rider@example.com".to_string()]);
    }

    #[tokio::test]
    async fn test_no_channels_fails_without_panicking() {
        let h = harness(Vec::new());
        let worker = Uuid::new_v4();
        let n = claimed(&h.store, sample_notification(), worker).await;

        let updated = h.dispatcher.dispatch(&n, worker).await.unwrap().unwrap();

        assert_eq!(updated.status, NotificationStatus::Failed);
        assert_eq!(updated.retry_count, 1);
        assert_eq!(updated.error_message.as_deref(), Some(NO_CHANNEL_CONFIGURED));
    }

    #[tokio::test]
    async fn test_channel_without_address_is_not_applicable() {
        // SMS is enabled but the record carries no phone number.
        let sms = Arc::new(ScriptedChannel::always_ok(ChannelKind::Sms));
        let h = harness(vec![sms.clone()]);
        let worker = Uuid::new_v4();
        let n = claimed(&h.store, sample_notification(), worker).await;

        let updated = h.dispatcher.dispatch(&n, worker).await.unwrap().unwrap();

        assert_eq!(updated.status, NotificationStatus::Failed);
        assert_eq!(sms.attempts(), 0);
    }

    #[tokio::test]
    async fn test_partial_success_is_sent() {
        let email = Arc::new(ScriptedChannel::always_failing(ChannelKind::Email));
        let sms = Arc::new(ScriptedChannel::always_ok(ChannelKind::Sms));
        let h = harness(vec![email.clone(), sms.clone()]);
        let worker = Uuid::new_v4();
        let mut n = sample_notification();
        n.metadata = serde_json::json!({ "phone": "+15551234567" });
        let n = claimed(&h.store, n, worker).await;

        let updated = h.dispatcher.dispatch(&n, worker).await.unwrap().unwrap();

        assert_eq!(email.attempts(), 1);
        assert_eq!(sms.attempts(), 1);
        assert_eq!(updated.status, NotificationStatus::Sent);
        assert!(!updated.email_sent);
        assert!(updated.sms_sent);
        assert_eq!(updated.retry_count, 0);
    }

    #[tokio::test]
    async fn test_all_channels_failing_records_every_reason() {
        let email = Arc::new(
            ScriptedChannel::always_failing(ChannelKind::Email).then(Err(ChannelError::Timeout)),
        );
        let sms = Arc::new(ScriptedChannel::always_failing(ChannelKind::Sms).then(Err(
            ChannelError::InvalidEndpoint("relative URL without a base".to_string()),
        )));
        let h = harness(vec![email, sms]);
        let worker = Uuid::new_v4();
        let mut n = sample_notification();
        n.metadata = serde_json::json!({ "phone": "+15551234567" });
        let n = claimed(&h.store, n, worker).await;

        let updated = h.dispatcher.dispatch(&n, worker).await.unwrap().unwrap();

        assert_eq!(updated.status, NotificationStatus::Failed);
        assert_eq!(updated.retry_count, 1);
        assert_eq!(
            updated.error_message.as_deref(),
            Some("email: request timed out; sms: malformed endpoint: relative URL without a base")
        );
        assert!(updated.sent_at.is_none());
    }

    #[tokio::test]
    async fn test_outcome_discarded_after_cancel() {
        let h = harness(vec![Arc::new(ScriptedChannel::always_ok(ChannelKind::Email))]);
        let worker = Uuid::new_v4();
        let n = claimed(&h.store, sample_notification(), worker).await;

        h.store.cancel(n.id).await.unwrap().unwrap();
        let updated = h.dispatcher.dispatch(&n, worker).await.unwrap();

        assert!(updated.is_none());
        let stored = h.store.get(n.id).unwrap();
        assert_eq!(stored.status, NotificationStatus::Cancelled);
        assert!(!stored.email_sent);
    }

    #[tokio::test]
    async fn test_claim_and_dispatch_skips_terminal_records() {
        let email = Arc::new(ScriptedChannel::always_ok(ChannelKind::Email));
        let h = harness(vec![email.clone()]);
        let mut n = sample_notification();
        n.status = NotificationStatus::Failed;
        n.retry_count = 3;
        let id = n.id;
        h.store.put(n);

        assert!(h.dispatcher.claim_and_dispatch(id).await.unwrap().is_none());
        assert_eq!(email.attempts(), 0);
        assert_eq!(h.store.get(id).unwrap().retry_count, 3);
    }

    #[tokio::test]
    async fn test_concurrent_claims_single_winner() {
        let store = Arc::new(InMemoryNotificationStore::new());
        let n = sample_notification();
        let id = n.id;
        store.put(n);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .claim(id, Uuid::new_v4(), Duration::from_secs(60))
                        .await
                        .unwrap()
                        .is_some()
                })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_losing_worker_cannot_count_retry() {
        let h = harness(Vec::new());
        let winner = Uuid::new_v4();
        let loser = Uuid::new_v4();
        let n = claimed(&h.store, sample_notification(), winner).await;

        assert!(h.dispatcher.dispatch(&n, loser).await.unwrap().is_none());
        let updated = h.dispatcher.dispatch(&n, winner).await.unwrap().unwrap();
        assert_eq!(updated.retry_count, 1);
        // Claim released, a second write from the same worker is refused.
        assert!(h.dispatcher.dispatch(&n, winner).await.unwrap().is_none());
        assert_eq!(h.store.get(n.id).unwrap().retry_count, 1);
    }
}
