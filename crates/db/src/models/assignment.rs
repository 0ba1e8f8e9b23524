use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::types::{AssignmentId, ScheduleId, UserId};
use sqlx::FromRow;

/// Recurring assignment database model: a standing claim on every future slot
/// of a schedule matching `(day_of_week, time_slot)`. `day_of_week` uses
/// 0 = Sunday … 6 = Saturday; `time_slot` is `HH:MM-HH:MM`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RecurringAssignment {
    pub id: AssignmentId,
    pub user_id: UserId,
    pub schedule_id: ScheduleId,
    pub day_of_week: i64,
    pub time_slot: String,
    pub buddy_name: Option<String>,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a recurring assignment
#[derive(Debug, Clone)]
pub struct CreateAssignment {
    pub user_id: UserId,
    pub schedule_id: ScheduleId,
    pub day_of_week: i64,
    pub time_slot: String,
    pub buddy_name: Option<String>,
    pub description: Option<String>,
    pub is_active: bool,
}
