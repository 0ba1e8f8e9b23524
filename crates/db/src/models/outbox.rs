use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::types::{BroadcastId, OutboxItemId, UserId};
use sqlx::FromRow;

/// Delivery channel enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Sms,
    Push,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Sms => write!(f, "sms"),
            Channel::Push => write!(f, "push"),
        }
    }
}

/// Outbox item status enum. `failed` items are re-fetched once their
/// `next_attempt_at` passes; `sent` and `permanently_failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    Pending,
    Sent,
    Failed,
    PermanentlyFailed,
}

impl std::fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutboxStatus::Pending => write!(f, "pending"),
            OutboxStatus::Sent => write!(f, "sent"),
            OutboxStatus::Failed => write!(f, "failed"),
            OutboxStatus::PermanentlyFailed => write!(f, "permanently_failed"),
        }
    }
}

/// Outbox item database model. Inserted by producers in the same transaction
/// as their own state; mutated only by the dispatcher.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OutboxItem {
    pub id: OutboxItemId,
    pub user_id: Option<UserId>,
    pub recipient: String,
    pub channel: Channel,
    pub message_type: String,
    pub payload: Vec<u8>,
    pub status: OutboxStatus,
    pub retry_count: i64,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub broadcast_id: Option<BroadcastId>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Input for enqueuing an outbox item
#[derive(Debug, Clone)]
pub struct NewOutboxItem {
    pub user_id: Option<UserId>,
    pub recipient: String,
    pub channel: Channel,
    pub message_type: String,
    pub payload: Vec<u8>,
    pub broadcast_id: Option<BroadcastId>,
}

impl NewOutboxItem {
    pub fn sms(user_id: UserId, phone: &str, message_type: &str, body: &str) -> Self {
        Self {
            user_id: Some(user_id),
            recipient: phone.to_string(),
            channel: Channel::Sms,
            message_type: message_type.to_string(),
            payload: body.as_bytes().to_vec(),
            broadcast_id: None,
        }
    }

    /// Push items address a user, not an endpoint: the dispatcher fans the
    /// payload out to whatever subscriptions the user holds at drain time.
    pub fn push(user_id: UserId, phone: &str, message_type: &str, payload: Vec<u8>) -> Self {
        Self {
            user_id: Some(user_id),
            recipient: phone.to_string(),
            channel: Channel::Push,
            message_type: message_type.to_string(),
            payload,
            broadcast_id: None,
        }
    }

    pub fn for_broadcast(mut self, broadcast_id: BroadcastId) -> Self {
        self.broadcast_id = Some(broadcast_id);
        self
    }
}
