use axum::{
    extract::{Path, State},
    Json,
};
use chrono::NaiveDate;
use db::models::CreateSchedule;
use db::ScheduleRepository;
use domain::CronExpr;
use serde::Deserialize;
use shared::types::ScheduleId;
use shared::{AppError, DomainError};

use crate::auth::AdminUser;
use crate::error::{ApiError, ApiResult};
use crate::routes::parse_id;
use crate::routes::schedules::ScheduleResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    pub name: String,
    pub cron_expr: String,
    pub start_date: Option<String>, // YYYY-MM-DD
    pub end_date: Option<String>,
    pub duration_minutes: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

fn parse_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    value
        .map(|raw| {
            raw.parse().map_err(|_| {
                ApiError::from(AppError::Validation(format!("Invalid {field} date")))
            })
        })
        .transpose()
}

fn validated_input(req: ScheduleRequest) -> Result<CreateSchedule, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::from(AppError::Validation(
            "Schedule name must not be empty".to_string(),
        )));
    }
    if req.duration_minutes <= 0 {
        return Err(ApiError::from(AppError::Validation(
            "duration_minutes must be positive".to_string(),
        )));
    }
    // Reject bad cron at write time so reads never fail to parse
    CronExpr::parse(&req.cron_expr).map_err(ApiError::from)?;

    let start_date = parse_date("start_date", req.start_date.as_deref())?;
    let end_date = parse_date("end_date", req.end_date.as_deref())?;
    if let (Some(start), Some(end)) = (start_date, end_date) {
        if end < start {
            return Err(ApiError::from(AppError::Validation(
                "end_date must not precede start_date".to_string(),
            )));
        }
    }

    Ok(CreateSchedule {
        name: req.name,
        cron_expr: req.cron_expr,
        start_date,
        end_date,
        duration_minutes: req.duration_minutes,
        is_active: req.is_active,
    })
}

pub async fn list_schedules(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<ScheduleResponse>>> {
    let schedules = ScheduleRepository::list_all(&state.pool).await?;
    Ok(Json(schedules.iter().map(ScheduleResponse::from).collect()))
}

pub async fn create_schedule(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(req): Json<ScheduleRequest>,
) -> ApiResult<Json<ScheduleResponse>> {
    let input = validated_input(req)?;
    let schedule = ScheduleRepository::create(&state.pool, input).await?;
    Ok(Json(ScheduleResponse::from(&schedule)))
}

pub async fn get_schedule(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ScheduleResponse>> {
    let schedule_id: ScheduleId = parse_id("schedule ID", &id)?;
    let schedule = ScheduleRepository::find_by_id(&state.pool, schedule_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::ScheduleNotFound(id)))?;
    Ok(Json(ScheduleResponse::from(&schedule)))
}

pub async fn update_schedule(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(req): Json<ScheduleRequest>,
) -> ApiResult<Json<ScheduleResponse>> {
    let schedule_id: ScheduleId = parse_id("schedule ID", &id)?;
    let input = validated_input(req)?;
    let schedule = ScheduleRepository::update(&state.pool, schedule_id, input)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::ScheduleNotFound(id)))?;
    Ok(Json(ScheduleResponse::from(&schedule)))
}

pub async fn delete_schedule(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let schedule_id: ScheduleId = parse_id("schedule ID", &id)?;
    if !ScheduleRepository::delete(&state.pool, schedule_id).await? {
        return Err(ApiError::from(DomainError::ScheduleNotFound(id)));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}
