use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::types::{BookingId, ReportId, UserId};
use sqlx::FromRow;

/// Report severity enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Normal,
    Suspicion,
    Incident,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Normal => write!(f, "normal"),
            Severity::Suspicion => write!(f, "suspicion"),
            Severity::Incident => write!(f, "incident"),
        }
    }
}

/// Shift report database model. `booking_id` is null for off-shift reports
/// and for reports whose booking was later removed.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub booking_id: Option<BookingId>,
    pub user_id: UserId,
    pub severity: Severity,
    pub message: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
    pub location_ts: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
}

/// Input for creating a report
#[derive(Debug, Clone)]
pub struct CreateReport {
    pub booking_id: Option<BookingId>,
    pub user_id: UserId,
    pub severity: Severity,
    pub message: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
    pub location_ts: Option<DateTime<Utc>>,
}

/// Report counts by severity and archival state
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportStats {
    pub normal: i64,
    pub suspicion: i64,
    pub incident: i64,
    pub active: i64,
    pub archived: i64,
}
