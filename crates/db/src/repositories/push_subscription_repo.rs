use chrono::Utc;
use shared::types::{SubscriptionId, UserId};
use sqlx::SqlitePool;

use crate::models::{CreatePushSubscription, PushSubscription};

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, endpoint, p256dh_key, auth_key, created_at";

pub struct PushSubscriptionRepository;

impl PushSubscriptionRepository {
    /// Register a subscription. A re-subscribe for an existing endpoint
    /// refreshes the keys and owner instead of conflicting.
    pub async fn upsert(
        pool: &SqlitePool,
        input: CreatePushSubscription,
    ) -> Result<PushSubscription, sqlx::Error> {
        let id = SubscriptionId::new();

        sqlx::query_as::<_, PushSubscription>(&format!(
            "INSERT INTO push_subscriptions (id, user_id, endpoint, p256dh_key, auth_key, created_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT (endpoint) DO UPDATE \
             SET user_id = excluded.user_id, p256dh_key = excluded.p256dh_key, auth_key = excluded.auth_key \
             RETURNING {SUBSCRIPTION_COLUMNS}"
        ))
        .bind(id)
        .bind(input.user_id)
        .bind(&input.endpoint)
        .bind(&input.p256dh_key)
        .bind(&input.auth_key)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn list_by_user(
        pool: &SqlitePool,
        user_id: UserId,
    ) -> Result<Vec<PushSubscription>, sqlx::Error> {
        sqlx::query_as::<_, PushSubscription>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM push_subscriptions WHERE user_id = ? ORDER BY created_at"
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Dispatcher cleanup of a dead endpoint, whoever owns it.
    pub async fn delete_by_endpoint(pool: &SqlitePool, endpoint: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM push_subscriptions WHERE endpoint = ?")
            .bind(endpoint)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Unsubscribe an endpoint owned by the caller.
    pub async fn delete_for_user(
        pool: &SqlitePool,
        user_id: UserId,
        endpoint: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM push_subscriptions WHERE endpoint = ? AND user_id = ?")
            .bind(endpoint)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
