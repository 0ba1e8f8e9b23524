use axum::{
    extract::{Path, State},
    Json,
};
use db::models::CreatePushSubscription;
use db::PushSubscriptionRepository;
use serde::{Deserialize, Serialize};
use shared::{AppError, DomainError};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubscriptionKeysRequest {
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub endpoint: String,
    pub keys: SubscriptionKeysRequest,
}

#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    pub id: String,
    pub endpoint: String,
}

#[derive(Debug, Serialize)]
pub struct VapidKeyResponse {
    pub public_key: String,
}

/// Register (or refresh) a browser push subscription for the caller.
pub async fn subscribe(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<SubscribeRequest>,
) -> ApiResult<Json<SubscribeResponse>> {
    if req.endpoint.is_empty() || !req.endpoint.starts_with("https://") {
        return Err(ApiError::from(AppError::Validation(
            "Invalid subscription endpoint".to_string(),
        )));
    }

    let subscription = PushSubscriptionRepository::upsert(
        &state.pool,
        CreatePushSubscription {
            user_id: auth.user_id,
            endpoint: req.endpoint,
            p256dh_key: req.keys.p256dh,
            auth_key: req.keys.auth,
        },
    )
    .await?;

    Ok(Json(SubscribeResponse {
        id: subscription.id.to_string(),
        endpoint: subscription.endpoint,
    }))
}

/// Remove one of the caller's subscriptions by its (URL-encoded) endpoint.
pub async fn unsubscribe(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(endpoint): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let deleted =
        PushSubscriptionRepository::delete_for_user(&state.pool, auth.user_id, &endpoint).await?;
    if !deleted {
        return Err(ApiError::from(DomainError::SubscriptionNotFound));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// The VAPID public key clients need to subscribe.
pub async fn vapid_public_key(State(state): State<AppState>) -> ApiResult<Json<VapidKeyResponse>> {
    let key = state
        .config
        .vapid_public_key
        .clone()
        .ok_or_else(|| ApiError::from(AppError::NotFound("push is not configured".to_string())))?;
    Ok(Json(VapidKeyResponse { public_key: key }))
}
