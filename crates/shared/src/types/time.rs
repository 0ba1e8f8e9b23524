use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Duration in minutes (shift durations, lead times, cutoffs)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct DurationMinutes(i32);

impl DurationMinutes {
    pub fn new(minutes: i32) -> Self {
        Self(minutes.max(0))
    }

    pub fn as_minutes(&self) -> i32 {
        self.0
    }

    pub fn as_chrono_duration(&self) -> Duration {
        Duration::minutes(self.0 as i64)
    }

    pub fn zero() -> Self {
        Self(0)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl From<i32> for DurationMinutes {
    fn from(minutes: i32) -> Self {
        Self::new(minutes)
    }
}

impl fmt::Display for DurationMinutes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= 60 {
            let hours = self.0 / 60;
            let mins = self.0 % 60;
            if mins == 0 {
                write!(f, "{}h", hours)
            } else {
                write!(f, "{}h {}m", hours, mins)
            }
        } else {
            write!(f, "{}m", self.0)
        }
    }
}

/// A time slot with start and end times in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeSlot {
    /// Create a new time slot, validating that end is after start
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, TimeSlotError> {
        if end <= start {
            return Err(TimeSlotError::EndBeforeStart { start, end });
        }
        Ok(Self { start, end })
    }

    /// Create a time slot from a start time and duration
    pub fn from_start_and_duration(start: DateTime<Utc>, duration: DurationMinutes) -> Self {
        Self {
            start,
            end: start + duration.as_chrono_duration(),
        }
    }

    /// Get the duration of this time slot in minutes
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Check if this time slot overlaps with another
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Check if this time slot contains a specific instant
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TimeSlotError {
    #[error("time slot end {end} is not after start {start}")]
    EndBeforeStart {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// First instant of a calendar date, as UTC
pub fn start_of_day_utc(date: NaiveDate) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(date.and_hms_opt(0, 0, 0).unwrap(), Utc)
}

/// First instant of the *following* date, as UTC. Used as the exclusive end of
/// an inclusive date window.
pub fn end_of_day_utc(date: NaiveDate) -> DateTime<Utc> {
    start_of_day_utc(date) + Duration::days(1)
}
