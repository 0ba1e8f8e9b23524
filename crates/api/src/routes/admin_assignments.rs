use axum::{
    extract::{Path, State},
    Json,
};
use db::models::{CreateAssignment, RecurringAssignment};
use db::{AssignmentRepository, ScheduleRepository, UserRepository};
use domain::assignment::DaySlot;
use serde::{Deserialize, Serialize};
use shared::types::{AssignmentId, ScheduleId, UserId};
use shared::{AppError, DomainError};

use crate::auth::AdminUser;
use crate::error::{ApiError, ApiResult};
use crate::routes::parse_id;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AssignmentRequest {
    pub user_id: String,
    pub schedule_id: String,
    pub day_of_week: i64,
    pub time_slot: String,
    pub buddy_name: Option<String>,
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
pub struct AssignmentResponse {
    pub id: String,
    pub user_id: String,
    pub schedule_id: String,
    pub day_of_week: i64,
    pub time_slot: String,
    pub buddy_name: Option<String>,
    pub description: Option<String>,
    pub is_active: bool,
}

impl From<&RecurringAssignment> for AssignmentResponse {
    fn from(a: &RecurringAssignment) -> Self {
        Self {
            id: a.id.to_string(),
            user_id: a.user_id.to_string(),
            schedule_id: a.schedule_id.to_string(),
            day_of_week: a.day_of_week,
            time_slot: a.time_slot.clone(),
            buddy_name: a.buddy_name.clone(),
            description: a.description.clone(),
            is_active: a.is_active,
        }
    }
}

pub async fn list_assignments(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<AssignmentResponse>>> {
    let assignments = AssignmentRepository::list_all(&state.pool).await?;
    Ok(Json(assignments.iter().map(AssignmentResponse::from).collect()))
}

pub async fn create_assignment(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(req): Json<AssignmentRequest>,
) -> ApiResult<Json<AssignmentResponse>> {
    let user_id: UserId = parse_id("user ID", &req.user_id)?;
    let schedule_id: ScheduleId = parse_id("schedule ID", &req.schedule_id)?;

    if !(0..=6).contains(&req.day_of_week) {
        return Err(ApiError::from(AppError::Validation(
            "day_of_week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
        )));
    }
    // Normalizes spacing and rejects malformed slots
    let day_slot: DaySlot = req.time_slot.parse().map_err(ApiError::from)?;

    UserRepository::find_by_id(&state.pool, user_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::UserNotFound(req.user_id.clone())))?;
    ScheduleRepository::find_by_id(&state.pool, schedule_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::ScheduleNotFound(req.schedule_id.clone())))?;

    let assignment = AssignmentRepository::create(
        &state.pool,
        CreateAssignment {
            user_id,
            schedule_id,
            day_of_week: req.day_of_week,
            time_slot: day_slot.to_string(),
            buddy_name: req.buddy_name,
            description: req.description,
            is_active: req.is_active,
        },
    )
    .await
    .map_err(ApiError::from)?;

    Ok(Json(AssignmentResponse::from(&assignment)))
}

pub async fn set_assignment_active(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(req): Json<SetActiveRequest>,
) -> ApiResult<Json<AssignmentResponse>> {
    let assignment_id: AssignmentId = parse_id("assignment ID", &id)?;
    if !AssignmentRepository::set_active(&state.pool, assignment_id, req.is_active).await? {
        return Err(ApiError::from(DomainError::AssignmentNotFound(id.clone())));
    }
    let assignment = AssignmentRepository::find_by_id(&state.pool, assignment_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::AssignmentNotFound(id)))?;
    Ok(Json(AssignmentResponse::from(&assignment)))
}

pub async fn delete_assignment(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let assignment_id: AssignmentId = parse_id("assignment ID", &id)?;
    if !AssignmentRepository::delete(&state.pool, assignment_id).await? {
        return Err(ApiError::from(DomainError::AssignmentNotFound(id)));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}
