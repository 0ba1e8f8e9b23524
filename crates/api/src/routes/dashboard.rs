use axum::{extract::State, Json};
use chrono::Utc;
use db::{BookingRepository, OutboxRepository, ReportRepository, UserRepository};
use serde::Serialize;

use crate::auth::AdminUser;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub users: i64,
    pub upcoming_bookings: i64,
    pub unarchived_reports: i64,
    pub pending_outbox: i64,
}

pub async fn get_metrics(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<DashboardResponse>> {
    let users = UserRepository::count(&state.pool).await?;
    let upcoming_bookings = BookingRepository::count_upcoming(&state.pool, Utc::now()).await?;
    let unarchived_reports = ReportRepository::count_unarchived(&state.pool).await?;
    let pending_outbox = OutboxRepository::count_pending(&state.pool).await?;

    Ok(Json(DashboardResponse {
        users,
        upcoming_bookings,
        unarchived_reports,
        pending_outbox,
    }))
}
