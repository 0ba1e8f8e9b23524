use axum::{extract::State, Json};
use db::models::{NewOutboxItem, User};
use db::{OutboxRepository, UserRepository};
use serde::{Deserialize, Serialize};
use shared::AppError;

use crate::auth::create_token;
use crate::error::{ApiError, ApiResult};
use crate::routes::validate_phone_number;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub phone: String,
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub phone: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct DevLoginRequest {
    pub phone: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub phone: String,
    pub name: Option<String>,
    pub role: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            phone: user.phone.clone(),
            name: user.name.clone(),
            role: user.role.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

/// Begin phone verification: issue a one-time code and queue it for SMS
/// delivery. The response never reveals whether the phone is known or
/// rate-limited.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Json<RegisterResponse>> {
    let phone = validate_phone_number(&req.phone)?;

    if let Some(code) = state.otp_store.issue(&phone, req.name.as_deref()) {
        let user_id = UserRepository::find_by_phone(&state.pool, &phone)
            .await?
            .map(|u| u.id);

        let body = format!(
            "Your Night Watch verification code is {}. It expires in {} minutes.",
            code, state.config.otp_ttl_minutes
        );
        let item = NewOutboxItem {
            user_id,
            recipient: phone.clone(),
            channel: db::models::Channel::Sms,
            message_type: "verification_code".to_string(),
            payload: body.into_bytes(),
            broadcast_id: None,
        };
        OutboxRepository::insert(&state.pool, &item).await?;
        tracing::info!(phone = %phone, "verification code queued");
    }

    Ok(Json(RegisterResponse {
        success: true,
        message: "If this phone number is valid, you will receive a code shortly.".to_string(),
    }))
}

/// Verify the code; creates the user on first success.
pub async fn verify(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let phone = validate_phone_number(&req.phone)?;

    let pending_name = state.otp_store.verify(&phone, &req.code)?;

    let user =
        UserRepository::find_or_create_by_phone(&state.pool, &phone, pending_name.as_deref())
            .await?;

    let token = create_token(
        user.id,
        user.role,
        &state.config.jwt_secret,
        state.config.jwt_expiry_hours,
    )
    .map_err(|_| ApiError::from(AppError::Internal("Token creation failed".to_string())))?;

    Ok(Json(AuthResponse {
        user: UserResponse::from(&user),
        token,
    }))
}

/// Development-only login that skips OTP. Available when `DEV_MODE` is set.
pub async fn dev_login(
    State(state): State<AppState>,
    Json(req): Json<DevLoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    if !state.config.dev_mode {
        return Err(ApiError::from(AppError::NotFound("dev login".to_string())));
    }

    let phone = validate_phone_number(&req.phone)?;
    let user = UserRepository::find_or_create_by_phone(&state.pool, &phone, None).await?;

    let token = create_token(
        user.id,
        user.role,
        &state.config.jwt_secret,
        state.config.jwt_expiry_hours,
    )
    .map_err(|_| ApiError::from(AppError::Internal("Token creation failed".to_string())))?;

    Ok(Json(AuthResponse {
        user: UserResponse::from(&user),
        token,
    }))
}
