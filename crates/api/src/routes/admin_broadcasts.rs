use axum::{extract::State, Json};
use db::models::{Audience, Broadcast, CreateBroadcast};
use db::BroadcastRepository;
use serde::{Deserialize, Serialize};
use shared::AppError;

use crate::auth::AdminUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    pub audience: Audience,
    pub subject: Option<String>,
    pub body: String,
    #[serde(default)]
    pub push_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct BroadcastResponse {
    pub id: String,
    pub audience: String,
    pub subject: Option<String>,
    pub body: String,
    pub push_enabled: bool,
    pub created_at: String,
    pub processed_at: Option<String>,
}

impl From<&Broadcast> for BroadcastResponse {
    fn from(b: &Broadcast) -> Self {
        Self {
            id: b.id.to_string(),
            audience: b.audience.to_string(),
            subject: b.subject.clone(),
            body: b.body.clone(),
            push_enabled: b.push_enabled,
            created_at: b.created_at.to_rfc3339(),
            processed_at: b.processed_at.map(|t| t.to_rfc3339()),
        }
    }
}

pub async fn list_broadcasts(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<BroadcastResponse>>> {
    let broadcasts = BroadcastRepository::list_all(&state.pool).await?;
    Ok(Json(broadcasts.iter().map(BroadcastResponse::from).collect()))
}

/// Queue a broadcast; the fan-out into outbox items happens on the next
/// broadcast job tick.
pub async fn create_broadcast(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(req): Json<BroadcastRequest>,
) -> ApiResult<Json<BroadcastResponse>> {
    if req.body.trim().is_empty() {
        return Err(ApiError::from(AppError::Validation(
            "Broadcast body must not be empty".to_string(),
        )));
    }

    let broadcast = BroadcastRepository::create(
        &state.pool,
        CreateBroadcast {
            author_user_id: admin.user_id,
            audience: req.audience,
            subject: req.subject,
            body: req.body,
            push_enabled: req.push_enabled,
        },
    )
    .await?;

    Ok(Json(BroadcastResponse::from(&broadcast)))
}
