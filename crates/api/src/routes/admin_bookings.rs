use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use db::models::{BookingWithNames, CreateBooking};
use db::{BookingRepository, PushSubscriptionRepository, ScheduleRepository, UserRepository};
use serde::{Deserialize, Serialize};
use shared::types::{BookingId, ScheduleId, UserId};
use shared::DomainError;

use crate::auth::AdminUser;
use crate::error::{ApiError, ApiResult};
use crate::routes::bookings::booking_notifications;
use crate::routes::{parse_id, parse_rfc3339};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BookingListQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignBookingRequest {
    pub user_id: String,
    pub schedule_id: String,
    pub start_time: String,
    pub buddy_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AdminBookingResponse {
    pub id: String,
    pub user_id: String,
    pub user_phone: String,
    pub user_name: Option<String>,
    pub schedule_id: String,
    pub schedule_name: String,
    pub start_time: String,
    pub end_time: String,
    pub buddy_name: Option<String>,
    pub checked_in_at: Option<String>,
    pub attended: Option<bool>,
    pub is_recurring: bool,
}

impl From<&BookingWithNames> for AdminBookingResponse {
    fn from(b: &BookingWithNames) -> Self {
        let end = b.start_time + Duration::minutes(b.duration_minutes as i64);
        Self {
            id: b.id.to_string(),
            user_id: b.user_id.to_string(),
            user_phone: b.user_phone.clone(),
            user_name: b.user_name.clone(),
            schedule_id: b.schedule_id.to_string(),
            schedule_name: b.schedule_name.clone(),
            start_time: b.start_time.to_rfc3339(),
            end_time: end.to_rfc3339(),
            buddy_name: b.buddy_name.clone(),
            checked_in_at: b.checked_in_at.map(|t| t.to_rfc3339()),
            attended: b.attended,
            is_recurring: b.is_recurring,
        }
    }
}

pub async fn list_bookings(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<BookingListQuery>,
) -> ApiResult<Json<Vec<AdminBookingResponse>>> {
    let from: DateTime<Utc> = match &query.from {
        Some(raw) => parse_rfc3339("from", raw)?,
        None => Utc::now() - Duration::days(30),
    };
    let to: DateTime<Utc> = match &query.to {
        Some(raw) => parse_rfc3339("to", raw)?,
        None => Utc::now() + Duration::days(30),
    };

    let bookings = BookingRepository::list_in_range_with_names(&state.pool, from, to).await?;
    Ok(Json(bookings.iter().map(AdminBookingResponse::from).collect()))
}

/// Assign any user to a slot. Slot validity is still enforced; lead time and
/// the booking horizon are not.
pub async fn assign_booking(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(req): Json<AssignBookingRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let user_id: UserId = parse_id("user ID", &req.user_id)?;
    let schedule_id: ScheduleId = parse_id("schedule ID", &req.schedule_id)?;
    let start_time = parse_rfc3339("start_time", &req.start_time)?;

    let schedule = ScheduleRepository::find_by_id(&state.pool, schedule_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::ScheduleNotFound(req.schedule_id.clone())))?;
    let rule = schedule.recurrence_rule().map_err(ApiError::from)?;
    if !rule.fires_at(start_time) {
        return Err(ApiError::from(DomainError::InvalidSlot));
    }

    let user = UserRepository::find_by_id(&state.pool, user_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::UserNotFound(req.user_id.clone())))?;
    let has_push = !PushSubscriptionRepository::list_by_user(&state.pool, user.id)
        .await?
        .is_empty();

    let body = format!(
        "You have been assigned the shift '{}' on {}.",
        schedule.name,
        start_time.format("%a %d %b %H:%M UTC")
    );
    let notifications = booking_notifications(
        &user,
        &schedule.name,
        start_time,
        "booking_confirmation",
        body,
        has_push,
    );

    let booking = BookingRepository::create(
        &state.pool,
        CreateBooking {
            user_id,
            schedule_id,
            start_time,
            buddy_name: req.buddy_name,
            is_recurring: false,
        },
        &notifications,
    )
    .await
    .map_err(ApiError::from)?;

    Ok(Json(serde_json::json!({ "booking_id": booking.id.to_string() })))
}

/// Admin cancellation: no cutoff, the owner is notified.
pub async fn cancel_booking(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let booking_id: BookingId = parse_id("booking ID", &id)?;
    let booking = BookingRepository::find_by_id(&state.pool, booking_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::BookingNotFound(id.clone())))?;
    let schedule = ScheduleRepository::find_by_id(&state.pool, booking.schedule_id)
        .await?
        .ok_or_else(|| {
            ApiError::from(DomainError::ScheduleNotFound(booking.schedule_id.to_string()))
        })?;

    crate::routes::bookings::cancel_with_notifications(&state, &booking, &schedule).await?;
    Ok(Json(serde_json::json!({ "cancelled": true })))
}
