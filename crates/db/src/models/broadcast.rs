use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::types::{BroadcastId, UserId};
use sqlx::FromRow;

/// Broadcast audience enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    /// Every user.
    All,
    /// Users with role `admin`.
    Admins,
    /// Users with role `owl`.
    Owls,
    /// Users with a booking or report in the last 30 days.
    Active,
}

impl std::fmt::Display for Audience {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Audience::All => write!(f, "all"),
            Audience::Admins => write!(f, "admins"),
            Audience::Owls => write!(f, "owls"),
            Audience::Active => write!(f, "active"),
        }
    }
}

/// Broadcast database model. `processed_at` is set once the fan-out into
/// outbox items has committed.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Broadcast {
    pub id: BroadcastId,
    pub author_user_id: UserId,
    pub audience: Audience,
    pub subject: Option<String>,
    pub body: String,
    pub push_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Input for creating a broadcast
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBroadcast {
    pub author_user_id: UserId,
    pub audience: Audience,
    pub subject: Option<String>,
    pub body: String,
    pub push_enabled: bool,
}
