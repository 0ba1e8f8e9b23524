use chrono::{DateTime, NaiveDate, Utc};
use domain::{CronExpr, RecurrenceRule};
use serde::{Deserialize, Serialize};
use shared::types::{DurationMinutes, ScheduleId};
use shared::DomainError;
use sqlx::FromRow;

/// Shift schedule database model. The cron expression plus the optional date
/// window define a virtual sequence of slot start times; slots themselves are
/// never stored.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    pub name: String,
    pub cron_expr: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub duration_minutes: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Schedule {
    /// Parse the stored cron expression into a recurrence rule. A row that
    /// fails to parse was corrupted after validation at write time.
    pub fn recurrence_rule(&self) -> Result<RecurrenceRule, DomainError> {
        Ok(RecurrenceRule {
            schedule_id: self.id,
            cron: CronExpr::parse(&self.cron_expr)?,
            start_date: self.start_date,
            end_date: self.end_date,
            duration: DurationMinutes::new(self.duration_minutes),
        })
    }
}

/// Input for creating a schedule
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSchedule {
    pub name: String,
    pub cron_expr: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub duration_minutes: i32,
    pub is_active: bool,
}
