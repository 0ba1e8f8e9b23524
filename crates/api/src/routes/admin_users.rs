use axum::{
    extract::{Path, State},
    Json,
};
use db::models::{CreateUser, UserRole};
use db::UserRepository;
use serde::Deserialize;
use shared::types::UserId;
use shared::{AppError, DomainError};

use crate::auth::AdminUser;
use crate::error::{ApiError, ApiResult};
use crate::routes::auth::UserResponse;
use crate::routes::{parse_id, validate_phone_number};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub phone: String,
    pub name: Option<String>,
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub role: UserRole,
}

pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<UserResponse>>> {
    let users = UserRepository::list_all(&state.pool).await?;
    Ok(Json(users.iter().map(UserResponse::from).collect()))
}

pub async fn create_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    let phone = validate_phone_number(&req.phone)?;
    let user = UserRepository::create(
        &state.pool,
        CreateUser {
            phone,
            name: req.name,
            role: req.role,
        },
    )
    .await
    .map_err(ApiError::from)?;
    Ok(Json(UserResponse::from(&user)))
}

pub async fn get_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<UserResponse>> {
    let user_id: UserId = parse_id("user ID", &id)?;
    let user = UserRepository::find_by_id(&state.pool, user_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::UserNotFound(id)))?;
    Ok(Json(UserResponse::from(&user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    let user_id: UserId = parse_id("user ID", &id)?;
    let user = UserRepository::update(&state.pool, user_id, req.name, req.role)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::UserNotFound(id)))?;
    Ok(Json(UserResponse::from(&user)))
}

/// Delete a user. Cascades remove their bookings and subscriptions; their
/// reports survive with the user link intact until the row goes.
pub async fn delete_user(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let user_id: UserId = parse_id("user ID", &id)?;
    if user_id == admin.user_id {
        return Err(ApiError::from(AppError::Validation(
            "Admins cannot delete their own account".to_string(),
        )));
    }
    if !UserRepository::delete(&state.pool, user_id).await? {
        return Err(ApiError::from(DomainError::UserNotFound(id)));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}
