use axum::{extract::State, Json};
use db::models::Schedule;
use db::ScheduleRepository;
use serde::Serialize;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    pub id: String,
    pub name: String,
    pub cron_expr: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub duration_minutes: i32,
    pub is_active: bool,
}

impl From<&Schedule> for ScheduleResponse {
    fn from(s: &Schedule) -> Self {
        Self {
            id: s.id.to_string(),
            name: s.name.clone(),
            cron_expr: s.cron_expr.clone(),
            start_date: s.start_date.map(|d| d.to_string()),
            end_date: s.end_date.map(|d| d.to_string()),
            duration_minutes: s.duration_minutes,
            is_active: s.is_active,
        }
    }
}

/// Public listing of active schedules.
pub async fn list_schedules(State(state): State<AppState>) -> ApiResult<Json<Vec<ScheduleResponse>>> {
    let schedules = ScheduleRepository::list_active(&state.pool).await?;
    Ok(Json(schedules.iter().map(ScheduleResponse::from).collect()))
}
