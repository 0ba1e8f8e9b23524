use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use db::models::{Booking, CreateBooking, NewOutboxItem, Schedule, User};
use db::{BookingRepository, PushSubscriptionRepository, ScheduleRepository, UserRepository};
use serde::{Deserialize, Serialize};
use shared::types::{BookingId, ScheduleId};
use shared::{AppError, DomainError};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::routes::{parse_id, parse_rfc3339};
use crate::state::AppState;

/// Window before shift start in which check-in opens.
const CHECK_IN_EARLY_MINUTES: i64 = 30;

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub schedule_id: String,
    pub start_time: String, // ISO 8601
    pub buddy_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AttendanceRequest {
    pub attended: bool,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub id: String,
    pub schedule_id: String,
    pub schedule_name: String,
    pub start_time: String,
    pub end_time: String,
    pub buddy_name: Option<String>,
    pub checked_in_at: Option<String>,
    pub attended: Option<bool>,
    pub is_recurring: bool,
}

impl BookingResponse {
    fn new(booking: &Booking, schedule: &Schedule) -> Self {
        let end = booking.start_time + Duration::minutes(schedule.duration_minutes as i64);
        Self {
            id: booking.id.to_string(),
            schedule_id: booking.schedule_id.to_string(),
            schedule_name: schedule.name.clone(),
            start_time: booking.start_time.to_rfc3339(),
            end_time: end.to_rfc3339(),
            buddy_name: booking.buddy_name.clone(),
            checked_in_at: booking.checked_in_at.map(|t| t.to_rfc3339()),
            attended: booking.attended,
            is_recurring: booking.is_recurring,
        }
    }
}

/// Confirmation and cancellation messages queued alongside booking writes.
pub(crate) fn booking_notifications(
    user: &User,
    schedule_name: &str,
    start_time: DateTime<Utc>,
    message_type: &str,
    body: String,
    has_push: bool,
) -> Vec<NewOutboxItem> {
    let mut items = vec![NewOutboxItem::sms(
        user.id,
        &user.phone,
        message_type,
        &body,
    )];
    if has_push {
        let payload = serde_json::json!({
            "title": format!("{} ({})", schedule_name, start_time.format("%a %d %b %H:%M UTC")),
            "body": body,
        })
        .to_string()
        .into_bytes();
        items.push(NewOutboxItem::push(user.id, &user.phone, message_type, payload));
    }
    items
}

pub(crate) async fn load_booking_for_caller(
    state: &AppState,
    booking_id: BookingId,
    caller: &AuthUser,
) -> Result<(Booking, Schedule), ApiError> {
    let booking = BookingRepository::find_by_id(&state.pool, booking_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::BookingNotFound(booking_id.to_string())))?;

    if booking.user_id != caller.user_id && !caller.is_admin() {
        return Err(ApiError::from(AppError::Forbidden));
    }

    let schedule = ScheduleRepository::find_by_id(&state.pool, booking.schedule_id)
        .await?
        .ok_or_else(|| {
            ApiError::from(DomainError::ScheduleNotFound(booking.schedule_id.to_string()))
        })?;

    Ok((booking, schedule))
}

/// Book a slot. The slot must be a real cron firing of an active schedule,
/// inside the booking horizon, and still free.
pub async fn create_booking(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateBookingRequest>,
) -> ApiResult<Json<BookingResponse>> {
    let schedule_id: ScheduleId = parse_id("schedule ID", &req.schedule_id)?;
    let start_time = parse_rfc3339("start_time", &req.start_time)?;

    let schedule = ScheduleRepository::find_by_id(&state.pool, schedule_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::ScheduleNotFound(req.schedule_id.clone())))?;
    if !schedule.is_active {
        return Err(ApiError::from(DomainError::InvalidSlot));
    }

    let now = Utc::now();
    let horizon = Duration::days(state.config.recurring_horizon_days);
    if start_time > now + horizon {
        return Err(ApiError::from(DomainError::InvalidSlot));
    }

    let rule = schedule.recurrence_rule().map_err(ApiError::from)?;
    if !rule.fires_at(start_time) {
        return Err(ApiError::from(DomainError::InvalidSlot));
    }

    let min_lead = Duration::minutes(state.config.booking_min_lead_minutes);
    if start_time <= now + min_lead {
        return Err(ApiError::from(DomainError::BookingLeadTime {
            min_minutes: state.config.booking_min_lead_minutes as i32,
        }));
    }

    let user = UserRepository::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::UserNotFound(auth.user_id.to_string())))?;
    let has_push = !PushSubscriptionRepository::list_by_user(&state.pool, user.id)
        .await?
        .is_empty();

    let body = format!(
        "Your shift '{}' on {} is booked.",
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
            user_id: auth.user_id,
            schedule_id,
            start_time,
            buddy_name: req.buddy_name,
            is_recurring: false,
        },
        &notifications,
    )
    .await
    .map_err(ApiError::from)?;

    Ok(Json(BookingResponse::new(&booking, &schedule)))
}

/// The caller's bookings, newest first.
pub async fn my_bookings(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<BookingResponse>>> {
    let bookings = BookingRepository::list_by_user(&state.pool, auth.user_id).await?;
    let schedules: HashMap<ScheduleId, Schedule> = ScheduleRepository::list_all(&state.pool)
        .await?
        .into_iter()
        .map(|s| (s.id, s))
        .collect();

    Ok(Json(
        bookings
            .iter()
            .filter_map(|b| schedules.get(&b.schedule_id).map(|s| BookingResponse::new(b, s)))
            .collect(),
    ))
}

/// Check in to a shift; open from 30 minutes before start until the end.
pub async fn check_in(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<BookingResponse>> {
    let booking_id: BookingId = parse_id("booking ID", &id)?;
    let (booking, schedule) = load_booking_for_caller(&state, booking_id, &auth).await?;

    let now = Utc::now();
    let end = booking.start_time + Duration::minutes(schedule.duration_minutes as i64);
    let window_open = booking.start_time - Duration::minutes(CHECK_IN_EARLY_MINUTES);
    if now < window_open || now > end {
        return Err(ApiError::from(DomainError::CheckInWindowClosed));
    }

    BookingRepository::set_checked_in(&state.pool, booking.id, now).await?;
    let refreshed = BookingRepository::find_by_id(&state.pool, booking.id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::BookingNotFound(id)))?;
    Ok(Json(BookingResponse::new(&refreshed, &schedule)))
}

/// Mark whether the shift was attended; only meaningful after it ended.
pub async fn mark_attendance(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<AttendanceRequest>,
) -> ApiResult<Json<BookingResponse>> {
    let booking_id: BookingId = parse_id("booking ID", &id)?;
    let (booking, schedule) = load_booking_for_caller(&state, booking_id, &auth).await?;

    let end = booking.start_time + Duration::minutes(schedule.duration_minutes as i64);
    if Utc::now() <= end {
        return Err(ApiError::from(DomainError::AttendanceBeforeShiftEnd));
    }

    BookingRepository::set_attendance(&state.pool, booking.id, req.attended).await?;
    let refreshed = BookingRepository::find_by_id(&state.pool, booking.id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::BookingNotFound(id)))?;
    Ok(Json(BookingResponse::new(&refreshed, &schedule)))
}

/// Cancel a booking. Owners may cancel up to the cutoff; admins any time.
pub async fn cancel_booking(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let booking_id: BookingId = parse_id("booking ID", &id)?;
    let (booking, schedule) = load_booking_for_caller(&state, booking_id, &auth).await?;

    if !auth.is_admin() {
        let cutoff = Duration::hours(state.config.cancel_cutoff_hours);
        if booking.start_time <= Utc::now() + cutoff {
            return Err(ApiError::from(DomainError::CancellationTooLate {
                cutoff_hours: state.config.cancel_cutoff_hours as i32,
            }));
        }
    }

    cancel_with_notifications(&state, &booking, &schedule).await?;
    Ok(Json(serde_json::json!({ "cancelled": true })))
}

pub(crate) async fn cancel_with_notifications(
    state: &AppState,
    booking: &Booking,
    schedule: &Schedule,
) -> Result<(), ApiError> {
    let owner = UserRepository::find_by_id(&state.pool, booking.user_id).await?;
    let notifications = match owner {
        Some(user) => {
            let has_push = !PushSubscriptionRepository::list_by_user(&state.pool, user.id)
                .await?
                .is_empty();
            let body = format!(
                "Your shift '{}' on {} was cancelled.",
                schedule.name,
                booking.start_time.format("%a %d %b %H:%M UTC")
            );
            booking_notifications(
                &user,
                &schedule.name,
                booking.start_time,
                "booking_cancellation",
                body,
                has_push,
            )
        }
        None => Vec::new(),
    };

    BookingRepository::delete_with_notifications(&state.pool, booking.id, &notifications)
        .await
        .map_err(ApiError::from)
}
