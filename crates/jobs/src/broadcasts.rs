use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use tracing::{info, warn};

use db::models::{Audience, Broadcast, NewOutboxItem, User};
use db::{BroadcastRepository, OutboxRepository, PushSubscriptionRepository, UserRepository};
use shared::AppError;

/// How far back a booking or report keeps a user in the `active` audience.
const ACTIVE_WINDOW_DAYS: i64 = 30;

/// Expands unprocessed broadcasts into outbox items, one per recipient.
#[derive(Clone)]
pub struct BroadcastEngine {
    pool: SqlitePool,
}

impl BroadcastEngine {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Process every broadcast with `processed_at IS NULL`. Returns the number
    /// of broadcasts processed. Each broadcast's fan-out and its processed
    /// mark commit in one transaction, so a crash mid-way re-selects it whole
    /// on the next run; the per-recipient dedup tag absorbs any overlap.
    pub async fn process_pending(&self) -> Result<usize, AppError> {
        let pending = BroadcastRepository::list_unprocessed(&self.pool).await?;
        let mut processed = 0;

        for broadcast in pending {
            match self.expand(&broadcast).await {
                Ok(recipients) => {
                    info!(broadcast = %broadcast.id, recipients, "broadcast expanded");
                    processed += 1;
                }
                Err(e) => {
                    warn!(broadcast = %broadcast.id, error = %e, "broadcast expansion failed");
                }
            }
        }

        Ok(processed)
    }

    async fn resolve_audience(&self, audience: Audience) -> Result<Vec<User>, sqlx::Error> {
        match audience {
            Audience::All => UserRepository::list_all(&self.pool).await,
            Audience::Admins => {
                UserRepository::list_by_role(&self.pool, db::models::UserRole::Admin).await
            }
            Audience::Owls => {
                UserRepository::list_by_role(&self.pool, db::models::UserRole::Owl).await
            }
            Audience::Active => {
                let cutoff = Utc::now() - Duration::days(ACTIVE_WINDOW_DAYS);
                UserRepository::list_active_since(&self.pool, cutoff).await
            }
        }
    }

    async fn expand(&self, broadcast: &Broadcast) -> Result<usize, AppError> {
        let recipients = self.resolve_audience(broadcast.audience).await?;

        let push_payload = serde_json::json!({
            "title": broadcast.subject.as_deref().unwrap_or("Announcement"),
            "body": broadcast.body,
        })
        .to_string()
        .into_bytes();

        // Resolve subscription state before the transaction takes a
        // connection from the pool.
        let mut subscribed = Vec::with_capacity(recipients.len());
        for user in &recipients {
            let has_subscriptions = broadcast.push_enabled
                && !PushSubscriptionRepository::list_by_user(&self.pool, user.id)
                    .await
                    .map_err(AppError::from)?
                    .is_empty();
            subscribed.push(has_subscriptions);
        }

        let mut tx = self.pool.begin().await.map_err(AppError::from)?;
        for (user, has_subscriptions) in recipients.iter().zip(&subscribed) {
            let sms = NewOutboxItem::sms(user.id, &user.phone, "broadcast", &broadcast.body)
                .for_broadcast(broadcast.id);
            OutboxRepository::insert_in_tx(&mut tx, &sms)
                .await
                .map_err(AppError::from)?;

            if *has_subscriptions {
                let push =
                    NewOutboxItem::push(user.id, &user.phone, "broadcast", push_payload.clone())
                        .for_broadcast(broadcast.id);
                OutboxRepository::insert_in_tx(&mut tx, &push)
                    .await
                    .map_err(AppError::from)?;
            }
        }

        BroadcastRepository::mark_processed_in_tx(&mut tx, broadcast.id, Utc::now())
            .await
            .map_err(AppError::from)?;
        tx.commit().await.map_err(AppError::from)?;

        Ok(recipients.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use db::models::{Channel, CreateBroadcast, CreateUser, UserRole};
    use db::test_support;

    async fn seed_user(pool: &SqlitePool, phone: &str, role: UserRole) -> User {
        UserRepository::create(
            pool,
            CreateUser {
                phone: phone.to_string(),
                name: None,
                role,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_owls_audience_gets_exactly_the_owls() {
        let pool = test_support::pool().await;
        seed_user(&pool, "+27820000001", UserRole::Owl).await;
        seed_user(&pool, "+27820000002", UserRole::Owl).await;
        seed_user(&pool, "+27820000003", UserRole::Owl).await;
        let admin = seed_user(&pool, "+27820000004", UserRole::Admin).await;
        seed_user(&pool, "+27820000005", UserRole::Guest).await;

        let broadcast = BroadcastRepository::create(
            &pool,
            CreateBroadcast {
                author_user_id: admin.id,
                audience: Audience::Owls,
                subject: None,
                body: "Patrol briefing at 18:00".to_string(),
                push_enabled: false,
            },
        )
        .await
        .unwrap();

        let engine = BroadcastEngine::new(pool.clone());
        assert_eq!(engine.process_pending().await.unwrap(), 1);

        let due = OutboxRepository::fetch_due(&pool, 50, Utc::now()).await.unwrap();
        assert_eq!(due.len(), 3);
        assert!(due.iter().all(|i| i.channel == Channel::Sms));
        assert!(due.iter().all(|i| i.broadcast_id == Some(broadcast.id)));

        let marked = BroadcastRepository::find_by_id(&pool, broadcast.id)
            .await
            .unwrap()
            .unwrap();
        assert!(marked.processed_at.is_some());

        // Re-running picks up nothing
        assert_eq!(engine.process_pending().await.unwrap(), 0);
        let due_again = OutboxRepository::fetch_due(&pool, 50, Utc::now()).await.unwrap();
        assert_eq!(due_again.len(), 3);
    }

    #[tokio::test]
    async fn test_active_audience_uses_thirty_day_window() {
        let pool = test_support::pool().await;
        let recent = seed_user(&pool, "+27820000001", UserRole::Owl).await;
        let stale = seed_user(&pool, "+27820000002", UserRole::Owl).await;
        let admin = seed_user(&pool, "+27820000003", UserRole::Admin).await;

        for user in [&recent, &stale] {
            db::ReportRepository::create(
                &pool,
                db::models::CreateReport {
                    booking_id: None,
                    user_id: user.id,
                    severity: db::models::Severity::Normal,
                    message: "all quiet".to_string(),
                    latitude: None,
                    longitude: None,
                    accuracy: None,
                    location_ts: None,
                },
            )
            .await
            .unwrap();
        }

        // Backdate the stale user's report past the window
        sqlx::query("UPDATE reports SET created_at = ? WHERE user_id = ?")
            .bind(Utc::now() - Duration::days(45))
            .bind(stale.id)
            .execute(&pool)
            .await
            .unwrap();

        BroadcastRepository::create(
            &pool,
            CreateBroadcast {
                author_user_id: admin.id,
                audience: Audience::Active,
                subject: None,
                body: "Thanks for staying involved".to_string(),
                push_enabled: false,
            },
        )
        .await
        .unwrap();

        let engine = BroadcastEngine::new(pool.clone());
        engine.process_pending().await.unwrap();

        let due = OutboxRepository::fetch_due(&pool, 50, Utc::now()).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].recipient, recent.phone);
    }

    #[tokio::test]
    async fn test_push_enabled_adds_one_item_per_subscribed_user() {
        let pool = test_support::pool().await;
        let owl = seed_user(&pool, "+27820000001", UserRole::Owl).await;
        seed_user(&pool, "+27820000002", UserRole::Owl).await;

        db::PushSubscriptionRepository::upsert(
            &pool,
            db::models::CreatePushSubscription {
                user_id: owl.id,
                endpoint: "https://push.example.org/abc".to_string(),
                p256dh_key: "p".to_string(),
                auth_key: "a".to_string(),
            },
        )
        .await
        .unwrap();

        BroadcastRepository::create(
            &pool,
            CreateBroadcast {
                author_user_id: owl.id,
                audience: Audience::Owls,
                subject: Some("Heads up".to_string()),
                body: "Route change tonight".to_string(),
                push_enabled: true,
            },
        )
        .await
        .unwrap();

        let engine = BroadcastEngine::new(pool.clone());
        engine.process_pending().await.unwrap();

        let due = OutboxRepository::fetch_due(&pool, 50, Utc::now()).await.unwrap();
        // 2 sms + 1 push for the subscribed owl
        assert_eq!(due.len(), 3);
        assert_eq!(due.iter().filter(|i| i.channel == Channel::Push).count(), 1);
    }
}
