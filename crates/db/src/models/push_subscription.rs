use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::types::{SubscriptionId, UserId};
use sqlx::FromRow;

/// Web-push subscription database model. One row per browser endpoint; dead
/// endpoints (404/410 from the push service) are deleted by the dispatcher.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PushSubscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub endpoint: String,
    pub p256dh_key: String,
    pub auth_key: String,
    pub created_at: DateTime<Utc>,
}

/// Input for registering a push subscription
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePushSubscription {
    pub user_id: UserId,
    pub endpoint: String,
    pub p256dh_key: String,
    pub auth_key: String,
}
