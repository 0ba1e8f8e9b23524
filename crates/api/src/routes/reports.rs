use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use db::models::{CreateReport, Report, Severity};
use db::{BookingRepository, ReportRepository};
use serde::{Deserialize, Serialize};
use shared::types::BookingId;
use shared::{AppError, DomainError};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::routes::{parse_id, parse_rfc3339};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub severity: Severity,
    pub message: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
    pub location_ts: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub id: String,
    pub booking_id: Option<String>,
    pub severity: String,
    pub message: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
    pub created_at: String,
    pub archived_at: Option<String>,
}

impl From<&Report> for ReportResponse {
    fn from(r: &Report) -> Self {
        Self {
            id: r.id.to_string(),
            booking_id: r.booking_id.map(|id| id.to_string()),
            severity: r.severity.to_string(),
            message: r.message.clone(),
            latitude: r.latitude,
            longitude: r.longitude,
            accuracy: r.accuracy,
            created_at: r.created_at.to_rfc3339(),
            archived_at: r.archived_at.map(|t| t.to_rfc3339()),
        }
    }
}

fn location_ts(req: &ReportRequest) -> Result<Option<DateTime<Utc>>, ApiError> {
    req.location_ts
        .as_deref()
        .map(|raw| parse_rfc3339("location_ts", raw))
        .transpose()
}

fn validate_message(message: &str) -> Result<(), ApiError> {
    if message.trim().is_empty() {
        return Err(ApiError::from(AppError::Validation(
            "Report message must not be empty".to_string(),
        )));
    }
    Ok(())
}

/// File a report against one of the caller's bookings.
pub async fn create_shift_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<ReportRequest>,
) -> ApiResult<Json<ReportResponse>> {
    validate_message(&req.message)?;
    let booking_id: BookingId = parse_id("booking ID", &id)?;

    let booking = BookingRepository::find_by_id(&state.pool, booking_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::BookingNotFound(id)))?;
    if booking.user_id != auth.user_id && !auth.is_admin() {
        return Err(ApiError::from(AppError::Forbidden));
    }

    let report = ReportRepository::create(
        &state.pool,
        CreateReport {
            booking_id: Some(booking.id),
            user_id: auth.user_id,
            severity: req.severity,
            message: req.message.clone(),
            latitude: req.latitude,
            longitude: req.longitude,
            accuracy: req.accuracy,
            location_ts: location_ts(&req)?,
        },
    )
    .await?;

    Ok(Json(ReportResponse::from(&report)))
}

/// File a report while not on shift.
pub async fn create_off_shift_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<ReportRequest>,
) -> ApiResult<Json<ReportResponse>> {
    validate_message(&req.message)?;

    let report = ReportRepository::create(
        &state.pool,
        CreateReport {
            booking_id: None,
            user_id: auth.user_id,
            severity: req.severity,
            message: req.message.clone(),
            latitude: req.latitude,
            longitude: req.longitude,
            accuracy: req.accuracy,
            location_ts: location_ts(&req)?,
        },
    )
    .await?;

    Ok(Json(ReportResponse::from(&report)))
}
