use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use db::models::{BookingWithNames, Schedule};
use db::{BookingRepository, ScheduleRepository};
use domain::{merge_slots, RecurrenceRule};
use serde::{Deserialize, Serialize};
use shared::types::ScheduleId;
use shared::AppError;
use tracing::warn;

use crate::auth::AdminUser;
use crate::error::{ApiError, ApiResult};
use crate::routes::parse_rfc3339;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SlotWindowQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct BookingSummary {
    pub booking_id: String,
    pub user_name: Option<String>,
    pub buddy_name: Option<String>,
    pub is_recurring: bool,
}

#[derive(Debug, Serialize)]
pub struct ShiftSlotResponse {
    pub schedule_id: String,
    pub schedule_name: String,
    pub start_time: String,
    pub end_time: String,
    pub is_booked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking: Option<BookingSummary>,
}

fn resolve_window(query: &SlotWindowQuery) -> Result<(DateTime<Utc>, DateTime<Utc>), ApiError> {
    let from = match &query.from {
        Some(raw) => parse_rfc3339("from", raw)?,
        None => Utc::now(),
    };
    let to = match &query.to {
        Some(raw) => parse_rfc3339("to", raw)?,
        None => from + Duration::days(14),
    };
    if to <= from {
        return Err(ApiError::from(AppError::Validation(
            "'to' must be after 'from'".to_string(),
        )));
    }
    Ok((from, to))
}

fn rules_of(schedules: &[Schedule]) -> Vec<RecurrenceRule> {
    schedules
        .iter()
        .filter_map(|s| match s.recurrence_rule() {
            Ok(rule) => Some(rule),
            Err(e) => {
                warn!(schedule = %s.id, error = %e, "skipping schedule with unparseable cron");
                None
            }
        })
        .collect()
}

async fn annotated_slots(
    state: &AppState,
    schedules: Vec<Schedule>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    limit: Option<usize>,
) -> ApiResult<Vec<ShiftSlotResponse>> {
    let names: HashMap<ScheduleId, String> =
        schedules.iter().map(|s| (s.id, s.name.clone())).collect();
    let rules = rules_of(&schedules);
    let slots = merge_slots(&rules, from, to, limit);

    let bookings: HashMap<(ScheduleId, DateTime<Utc>), BookingWithNames> =
        BookingRepository::list_in_range_with_names(&state.pool, from, to)
            .await?
            .into_iter()
            .map(|b| ((b.schedule_id, b.start_time), b))
            .collect();

    Ok(slots
        .into_iter()
        .map(|slot| {
            let booking = bookings.get(&(slot.schedule_id, slot.window.start));
            ShiftSlotResponse {
                schedule_id: slot.schedule_id.to_string(),
                schedule_name: names.get(&slot.schedule_id).cloned().unwrap_or_default(),
                start_time: slot.window.start.to_rfc3339(),
                end_time: slot.window.end.to_rfc3339(),
                is_booked: booking.is_some(),
                booking: booking.map(|b| BookingSummary {
                    booking_id: b.id.to_string(),
                    user_name: b.user_name.clone(),
                    buddy_name: b.buddy_name.clone(),
                    is_recurring: b.is_recurring,
                }),
            }
        })
        .collect())
}

/// Public: the merged slot stream of all active schedules, annotated with
/// booking state.
pub async fn list_available(
    State(state): State<AppState>,
    Query(query): Query<SlotWindowQuery>,
) -> ApiResult<Json<Vec<ShiftSlotResponse>>> {
    let (from, to) = resolve_window(&query)?;
    let schedules = ScheduleRepository::list_active(&state.pool).await?;
    let slots = annotated_slots(&state, schedules, from, to, query.limit).await?;
    Ok(Json(slots))
}

/// Admin: same stream without the active filter.
pub async fn list_all_admin(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<SlotWindowQuery>,
) -> ApiResult<Json<Vec<ShiftSlotResponse>>> {
    let (from, to) = resolve_window(&query)?;
    let schedules = ScheduleRepository::list_all(&state.pool).await?;
    let slots = annotated_slots(&state, schedules, from, to, query.limit).await?;
    Ok(Json(slots))
}
