use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, error, warn};

use db::models::{Channel, OutboxItem};
use db::{OutboxRepository, PushSubscriptionRepository};
use domain::outbox_policy::{next_disposition, AttemptOutcome, Disposition};
use integrations::push::PushResult;
use integrations::sms::SmsResult;
use integrations::{PushError, SmsLogSender, SubscriptionKeys, WebPushSender};

/// Channel adapter contracts the dispatcher routes through. The production
/// impls delegate to the integration senders; tests substitute stubs.
pub trait SmsDelivery {
    async fn send(&self, recipient: &str, message_type: &str, payload: &str) -> SmsResult<()>;
}

impl SmsDelivery for SmsLogSender {
    async fn send(&self, recipient: &str, message_type: &str, payload: &str) -> SmsResult<()> {
        SmsLogSender::send(self, recipient, message_type, payload).await
    }
}

pub trait PushDelivery {
    async fn send(&self, subscription: &SubscriptionKeys, payload: &[u8]) -> PushResult<()>;
}

impl PushDelivery for WebPushSender {
    async fn send(&self, subscription: &SubscriptionKeys, payload: &[u8]) -> PushResult<()> {
        WebPushSender::send(self, subscription, payload).await
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub processed: usize,
    pub errors: usize,
}

/// Drains pending outbox items in batches, routing each by channel and
/// applying the retry policy. One drain runs at a time per instance; the
/// runner serializes invocations.
#[derive(Clone)]
pub struct Dispatcher<S, P> {
    pool: SqlitePool,
    sms: S,
    push: Option<P>,
    batch_size: i64,
    max_retries: i32,
    send_timeout: Duration,
}

impl<S: SmsDelivery, P: PushDelivery> Dispatcher<S, P> {
    pub fn new(pool: SqlitePool, sms: S, push: Option<P>, batch_size: i64, max_retries: i32) -> Self {
        Self {
            pool,
            sms,
            push,
            batch_size,
            max_retries,
            send_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Fetch up to `batch_size` due items and attempt each once. Status
    /// update failures are counted but never halt the loop.
    pub async fn drain(&self) -> DrainSummary {
        let mut summary = DrainSummary::default();

        let items = match OutboxRepository::fetch_due(&self.pool, self.batch_size, Utc::now()).await
        {
            Ok(items) => items,
            Err(e) => {
                error!(error = %e, "outbox fetch failed");
                summary.errors += 1;
                return summary;
            }
        };

        for item in items {
            let outcome = match tokio::time::timeout(self.send_timeout, self.attempt(&item)).await {
                Ok(outcome) => outcome,
                Err(_) => AttemptOutcome::Transient("send timed out".to_string()),
            };

            let disposition =
                next_disposition(outcome, item.retry_count as i32, self.max_retries, Utc::now());

            let update = match &disposition {
                Disposition::Sent => {
                    OutboxRepository::mark_sent(&self.pool, item.id, Utc::now()).await
                }
                Disposition::Retry {
                    retry_count,
                    next_attempt_at,
                    error,
                } => {
                    warn!(item = %item.id, retry_count = *retry_count, error = %error, "delivery failed, will retry");
                    OutboxRepository::mark_retry(
                        &self.pool,
                        item.id,
                        *retry_count as i64,
                        *next_attempt_at,
                        error,
                    )
                    .await
                }
                Disposition::GiveUp { error } => {
                    warn!(item = %item.id, error = %error, "delivery failed permanently");
                    OutboxRepository::mark_permanently_failed(&self.pool, item.id, error).await
                }
            };

            match (update, &disposition) {
                (Ok(()), Disposition::Sent) => summary.processed += 1,
                (Ok(()), _) => summary.errors += 1,
                (Err(e), _) => {
                    error!(item = %item.id, error = %e, "outbox status update failed");
                    summary.errors += 1;
                }
            }
        }

        debug!(processed = summary.processed, errors = summary.errors, "outbox drained");
        summary
    }

    async fn attempt(&self, item: &OutboxItem) -> AttemptOutcome {
        match item.channel {
            Channel::Sms => {
                let payload = String::from_utf8_lossy(&item.payload);
                match self.sms.send(&item.recipient, &item.message_type, &payload).await {
                    Ok(()) => AttemptOutcome::Delivered,
                    Err(e) if e.is_retryable() => AttemptOutcome::Transient(e.to_string()),
                    Err(e) => AttemptOutcome::Permanent(e.to_string()),
                }
            }
            Channel::Push => self.attempt_push(item).await,
        }
    }

    /// Fan a push payload out to every subscription the user currently holds.
    /// 404/410 endpoints are deleted on the spot; the item counts as sent if
    /// any endpoint accepted it.
    async fn attempt_push(&self, item: &OutboxItem) -> AttemptOutcome {
        let Some(user_id) = item.user_id else {
            return AttemptOutcome::Permanent("push item without user".to_string());
        };
        let Some(push) = &self.push else {
            return AttemptOutcome::Permanent("push sender not configured".to_string());
        };

        let subscriptions = match PushSubscriptionRepository::list_by_user(&self.pool, user_id).await
        {
            Ok(subs) => subs,
            Err(e) => return AttemptOutcome::Transient(format!("subscription lookup failed: {e}")),
        };
        if subscriptions.is_empty() {
            return AttemptOutcome::Permanent("user has no push subscriptions".to_string());
        }

        let mut delivered = false;
        let mut transient = false;
        let mut last_error = String::new();

        for sub in subscriptions {
            let keys = SubscriptionKeys {
                endpoint: sub.endpoint.clone(),
                p256dh: sub.p256dh_key.clone(),
                auth: sub.auth_key.clone(),
            };

            match push.send(&keys, &item.payload).await {
                Ok(()) => delivered = true,
                Err(PushError::EndpointGone) => {
                    debug!(endpoint = %sub.endpoint, "pruning dead push endpoint");
                    if let Err(e) =
                        PushSubscriptionRepository::delete_by_endpoint(&self.pool, &sub.endpoint)
                            .await
                    {
                        error!(error = %e, "failed to delete dead subscription");
                    }
                    last_error = "endpoint gone".to_string();
                }
                Err(e) => {
                    if e.is_retryable() {
                        transient = true;
                    }
                    last_error = e.to_string();
                }
            }
        }

        if delivered {
            AttemptOutcome::Delivered
        } else if transient {
            AttemptOutcome::Transient(last_error)
        } else {
            AttemptOutcome::Permanent(last_error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use db::models::{
        CreatePushSubscription, CreateUser, NewOutboxItem, OutboxStatus, UserRole,
    };
    use db::{test_support, UserRepository};
    use shared::types::UserId;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakySms {
        calls: AtomicUsize,
    }

    impl SmsDelivery for FlakySms {
        async fn send(&self, _recipient: &str, _t: &str, _p: &str) -> SmsResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(integrations::SmsError::Io(io::Error::new(
                io::ErrorKind::Interrupted,
                "disk busy",
            )))
        }
    }

    struct NoopPush;

    impl PushDelivery for NoopPush {
        async fn send(&self, _s: &SubscriptionKeys, _p: &[u8]) -> PushResult<()> {
            Ok(())
        }
    }

    /// 410 for endpoints containing "dead", success otherwise.
    struct SelectivePush;

    impl PushDelivery for SelectivePush {
        async fn send(&self, sub: &SubscriptionKeys, _p: &[u8]) -> PushResult<()> {
            if sub.endpoint.contains("dead") {
                Err(PushError::EndpointGone)
            } else {
                Ok(())
            }
        }
    }

    struct OkSms;

    impl SmsDelivery for OkSms {
        async fn send(&self, _r: &str, _t: &str, _p: &str) -> SmsResult<()> {
            Ok(())
        }
    }

    async fn seed_user(pool: &SqlitePool) -> UserId {
        UserRepository::create(
            pool,
            CreateUser {
                phone: "+27820000001".to_string(),
                name: None,
                role: UserRole::Owl,
            },
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn test_retry_exhaustion_walks_the_status_dag() {
        let pool = test_support::pool().await;
        let user_id = seed_user(&pool).await;

        let item = NewOutboxItem::sms(user_id, "+27820000001", "booking_confirmation", "hello");
        OutboxRepository::insert(&pool, &item).await.unwrap();
        let id = OutboxRepository::fetch_due(&pool, 10, Utc::now()).await.unwrap()[0].id;

        let sms = FlakySms { calls: AtomicUsize::new(0) };
        let dispatcher = Dispatcher::new(pool.clone(), sms, None::<NoopPush>, 10, 2);

        // First drain: failed, retry 1. Backoff makes the item invisible to
        // later drains, so re-arm it manually the way elapsed time would.
        let first = dispatcher.drain().await;
        assert_eq!(first, DrainSummary { processed: 0, errors: 1 });
        let after_first = OutboxRepository::find_by_id(&pool, id).await.unwrap().unwrap();
        assert_eq!(after_first.status, OutboxStatus::Failed);
        assert_eq!(after_first.retry_count, 1);

        OutboxRepository::mark_retry(&pool, id, 1, Utc::now(), "disk busy").await.unwrap();
        let second = dispatcher.drain().await;
        assert_eq!(second, DrainSummary { processed: 0, errors: 1 });
        let after_second = OutboxRepository::find_by_id(&pool, id).await.unwrap().unwrap();
        assert_eq!(after_second.status, OutboxStatus::Failed);
        assert_eq!(after_second.retry_count, 2);

        OutboxRepository::mark_retry(&pool, id, 2, Utc::now(), "disk busy").await.unwrap();
        let third = dispatcher.drain().await;
        assert_eq!(third, DrainSummary { processed: 0, errors: 1 });
        let after_third = OutboxRepository::find_by_id(&pool, id).await.unwrap().unwrap();
        assert_eq!(after_third.status, OutboxStatus::PermanentlyFailed);

        // Terminal: nothing further is attempted
        let fourth = dispatcher.drain().await;
        assert_eq!(fourth, DrainSummary::default());
    }

    #[tokio::test]
    async fn test_dead_endpoint_pruned_while_item_sends() {
        let pool = test_support::pool().await;
        let user_id = seed_user(&pool).await;

        for endpoint in ["https://push.example.org/dead-1", "https://push.example.org/live-2"] {
            db::PushSubscriptionRepository::upsert(
                &pool,
                CreatePushSubscription {
                    user_id,
                    endpoint: endpoint.to_string(),
                    p256dh_key: "p256dh".to_string(),
                    auth_key: "auth".to_string(),
                },
            )
            .await
            .unwrap();
        }

        let item = NewOutboxItem::push(user_id, "+27820000001", "booking_confirmation", b"{}".to_vec());
        OutboxRepository::insert(&pool, &item).await.unwrap();

        let dispatcher = Dispatcher::new(pool.clone(), OkSms, Some(SelectivePush), 10, 3);
        let summary = dispatcher.drain().await;
        assert_eq!(summary, DrainSummary { processed: 1, errors: 0 });

        let items = sqlx::query_as::<_, db::models::OutboxItem>(
            "SELECT id, user_id, recipient, channel, message_type, payload, status, retry_count, \
             next_attempt_at, broadcast_id, created_at, sent_at, last_error FROM outbox_items",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(items[0].status, OutboxStatus::Sent);
        assert!(items[0].sent_at.is_some());

        let subs = db::PushSubscriptionRepository::list_by_user(&pool, user_id).await.unwrap();
        assert_eq!(subs.len(), 1);
        assert!(subs[0].endpoint.contains("live-2"));
    }

    #[tokio::test]
    async fn test_push_without_user_fails_permanently() {
        let pool = test_support::pool().await;

        let item = NewOutboxItem {
            user_id: None,
            recipient: "nobody".to_string(),
            channel: Channel::Push,
            message_type: "broadcast".to_string(),
            payload: b"{}".to_vec(),
            broadcast_id: None,
        };
        OutboxRepository::insert(&pool, &item).await.unwrap();

        let dispatcher = Dispatcher::new(pool.clone(), OkSms, Some(NoopPush), 10, 3);
        let summary = dispatcher.drain().await;
        assert_eq!(summary, DrainSummary { processed: 0, errors: 1 });

        let remaining = OutboxRepository::fetch_due(&pool, 10, Utc::now()).await.unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn test_successful_sms_marks_sent() {
        let pool = test_support::pool().await;
        let user_id = seed_user(&pool).await;

        let item = NewOutboxItem::sms(user_id, "+27820000001", "broadcast", "patrol tonight");
        OutboxRepository::insert(&pool, &item).await.unwrap();

        let dispatcher = Dispatcher::new(pool.clone(), OkSms, None::<NoopPush>, 10, 3);
        let summary = dispatcher.drain().await;
        assert_eq!(summary, DrainSummary { processed: 1, errors: 0 });
    }
}
