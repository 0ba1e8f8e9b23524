use chrono::{Datelike, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use shared::types::TimeSlot;
use shared::DomainError;

/// A wall-clock slot of day in `HH:MM-HH:MM` form, as stored on recurring
/// assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DaySlot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl DaySlot {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Whether a concrete slot's start and end fall on these wall-clock times.
    pub fn matches(&self, slot: &TimeSlot) -> bool {
        slot.start.time().with_nanosecond(0) == Some(self.start)
            && slot.end.time().with_nanosecond(0) == Some(self.end)
    }
}

impl FromStr for DaySlot {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| DomainError::InvalidTimeSlotFormat(s.to_string()))?;
        let start = NaiveTime::parse_from_str(start.trim(), "%H:%M")
            .map_err(|_| DomainError::InvalidTimeSlotFormat(s.to_string()))?;
        let end = NaiveTime::parse_from_str(end.trim(), "%H:%M")
            .map_err(|_| DomainError::InvalidTimeSlotFormat(s.to_string()))?;
        Ok(Self { start, end })
    }
}

impl fmt::Display for DaySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

impl TryFrom<String> for DaySlot {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DaySlot> for String {
    fn from(slot: DaySlot) -> Self {
        slot.to_string()
    }
}

/// The recurring part of a standing assignment: a weekday (0 = Sunday … 6 =
/// Saturday) and a wall-clock day slot. Matching is against concrete slots
/// produced by schedule expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignmentPattern {
    pub day_of_week: u8,
    pub day_slot: DaySlot,
}

impl AssignmentPattern {
    pub fn matches(&self, slot: &TimeSlot) -> bool {
        slot.start.weekday().num_days_from_sunday() == self.day_of_week as u32
            && self.day_slot.matches(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use shared::types::DurationMinutes;

    fn utc(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, d, h, m, 0).unwrap()
    }

    #[test]
    fn test_day_slot_parse_roundtrip() {
        let slot: DaySlot = "18:00-20:00".parse().unwrap();
        assert_eq!(slot.start, NaiveTime::from_hms_opt(18, 0, 0).unwrap());
        assert_eq!(slot.end, NaiveTime::from_hms_opt(20, 0, 0).unwrap());
        assert_eq!(slot.to_string(), "18:00-20:00");
    }

    #[test]
    fn test_day_slot_parse_rejects_garbage() {
        assert!("18:00".parse::<DaySlot>().is_err());
        assert!("18:00-25:00".parse::<DaySlot>().is_err());
        assert!("six-eight".parse::<DaySlot>().is_err());
        assert!("".parse::<DaySlot>().is_err());
    }

    #[test]
    fn test_pattern_matches_friday_evening() {
        // 2025-01-03 is a Friday
        let pattern = AssignmentPattern {
            day_of_week: 5,
            day_slot: "18:00-20:00".parse().unwrap(),
        };
        let friday = TimeSlot::from_start_and_duration(utc(3, 18, 0), DurationMinutes::new(120));
        let saturday = TimeSlot::from_start_and_duration(utc(4, 18, 0), DurationMinutes::new(120));
        let wrong_time = TimeSlot::from_start_and_duration(utc(3, 19, 0), DurationMinutes::new(120));

        assert!(pattern.matches(&friday));
        assert!(!pattern.matches(&saturday));
        assert!(!pattern.matches(&wrong_time));
    }

    #[test]
    fn test_pattern_sunday_is_zero() {
        // 2025-01-05 is a Sunday
        let pattern = AssignmentPattern {
            day_of_week: 0,
            day_slot: "09:00-11:00".parse().unwrap(),
        };
        let sunday = TimeSlot::from_start_and_duration(utc(5, 9, 0), DurationMinutes::new(120));
        assert!(pattern.matches(&sunday));
    }

    #[test]
    fn test_pattern_duration_mismatch_rejected() {
        let pattern = AssignmentPattern {
            day_of_week: 5,
            day_slot: "18:00-20:00".parse().unwrap(),
        };
        let shorter = TimeSlot::from_start_and_duration(utc(3, 18, 0), DurationMinutes::new(60));
        assert!(!pattern.matches(&shorter));
    }
}
