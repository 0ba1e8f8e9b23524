use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::types::{BookingId, ScheduleId, UserId};
use sqlx::FromRow;

/// Booking database model: a user's claim on a `(schedule, start_time)` slot.
/// Cancellation deletes the row, so every row here is a live claim.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub user_id: UserId,
    pub schedule_id: ScheduleId,
    pub start_time: DateTime<Utc>,
    pub buddy_name: Option<String>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub attended: Option<bool>,
    pub is_recurring: bool,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn is_checked_in(&self) -> bool {
        self.checked_in_at.is_some()
    }
}

/// Input for creating a new booking
#[derive(Debug, Clone)]
pub struct CreateBooking {
    pub user_id: UserId,
    pub schedule_id: ScheduleId,
    pub start_time: DateTime<Utc>,
    pub buddy_name: Option<String>,
    pub is_recurring: bool,
}

/// Booking joined with user and schedule names, for admin listings
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BookingWithNames {
    pub id: BookingId,
    pub user_id: UserId,
    pub user_phone: String,
    pub user_name: Option<String>,
    pub schedule_id: ScheduleId,
    pub schedule_name: String,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub buddy_name: Option<String>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub attended: Option<bool>,
    pub is_recurring: bool,
    pub created_at: DateTime<Utc>,
}
