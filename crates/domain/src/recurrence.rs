use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;

use shared::types::{end_of_day_utc, start_of_day_utc, DurationMinutes, ScheduleId, TimeSlot};
use shared::DomainError;

/// A validated standard 5-field cron expression
/// (`minute hour day-of-month month day-of-week`), evaluated in UTC.
///
/// The underlying `cron` crate expects 7 fields (seconds first, year last) and
/// numbers days of week 1-7 starting at Sunday, so parsing normalizes both:
/// seconds are pinned to `0`, the year is `*`, and numeric day-of-week tokens
/// are shifted from the Unix convention (0-6, Sunday = 0, with 7 as an alias
/// for Sunday).
#[derive(Debug, Clone)]
pub struct CronExpr {
    schedule: cron::Schedule,
    source: String,
}

impl CronExpr {
    pub fn parse(expr: &str) -> Result<Self, DomainError> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(DomainError::InvalidCronExpression(format!(
                "'{}': expected 5 fields, got {}",
                expr,
                fields.len()
            )));
        }

        let dow = normalize_dow_field(fields[4])
            .ok_or_else(|| DomainError::InvalidCronExpression(expr.to_string()))?;

        let seven = format!(
            "0 {} {} {} {} {} *",
            fields[0], fields[1], fields[2], fields[3], dow
        );
        let schedule = cron::Schedule::from_str(&seven)
            .map_err(|e| DomainError::InvalidCronExpression(format!("'{}': {}", expr, e)))?;

        Ok(Self {
            schedule,
            source: expr.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Lazily expand firings within `[window_start, window_end)` into slots of
    /// the given duration. A firing at exactly `window_start` is included; one
    /// at exactly `window_end` is excluded. Output is ordered by start time.
    pub fn expand(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        duration: DurationMinutes,
    ) -> impl Iterator<Item = TimeSlot> + '_ {
        // `after` is exclusive of its argument; back up one second so a firing
        // at exactly window_start is included.
        let from = window_start - Duration::seconds(1);
        self.schedule
            .after(&from)
            .take_while(move |start| *start < window_end)
            .map(move |start| TimeSlot::from_start_and_duration(start, duration))
    }

    /// Whether the expression fires at exactly `instant`.
    pub fn fires_at(&self, instant: DateTime<Utc>) -> bool {
        self.expand(instant, instant + Duration::seconds(1), DurationMinutes::new(1))
            .next()
            .map(|slot| slot.start == instant)
            .unwrap_or(false)
    }
}

impl fmt::Display for CronExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// Shift Unix day-of-week ordinals (0-6, Sunday = 0; 7 accepted as Sunday)
/// to the cron crate's 1-7 Sunday-first numbering. Name tokens, `*` and `?`
/// pass through; ranges, lists and steps are handled per token.
fn normalize_dow_field(field: &str) -> Option<String> {
    let mut parts = Vec::new();
    for entry in field.split(',') {
        let (base, step) = match entry.split_once('/') {
            Some((base, step)) => (base, Some(step)),
            None => (entry, None),
        };

        let mapped = if let Some((lo, hi)) = base.split_once('-') {
            format!("{}-{}", shift_dow_token(lo)?, shift_dow_token(hi)?)
        } else {
            shift_dow_token(base)?
        };

        match step {
            Some(step) => parts.push(format!("{}/{}", mapped, step)),
            None => parts.push(mapped),
        }
    }
    Some(parts.join(","))
}

fn shift_dow_token(token: &str) -> Option<String> {
    if token.is_empty() {
        return None;
    }
    if token == "*" || token == "?" {
        return Some(token.to_string());
    }
    match token.parse::<u8>() {
        Ok(n) if n <= 7 => {
            let shifted = if n == 7 { 1 } else { n + 1 };
            Some(shifted.to_string())
        }
        Ok(_) => None,
        // Names like MON, FRI are understood by the cron crate as-is.
        Err(_) => Some(token.to_string()),
    }
}

/// A schedule's recurrence rule: cron expression plus optional date window and
/// the slot duration. The source of truth for which slots exist.
#[derive(Debug, Clone)]
pub struct RecurrenceRule {
    pub schedule_id: ScheduleId,
    pub cron: CronExpr,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub duration: DurationMinutes,
}

impl RecurrenceRule {
    /// Intersect `[from, to)` with the rule's `[start_date, end_date]` window.
    /// `end_date` is inclusive as a whole UTC day.
    pub fn effective_window(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let lo = match self.start_date {
            Some(d) => from.max(start_of_day_utc(d)),
            None => from,
        };
        let hi = match self.end_date {
            Some(d) => to.min(end_of_day_utc(d)),
            None => to,
        };
        (lo < hi).then_some((lo, hi))
    }

    /// Expand the rule's slots within `[from, to)`, clipped to the date window.
    pub fn expand(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Iterator<Item = TimeSlot> + '_ {
        self.effective_window(from, to)
            .into_iter()
            .flat_map(move |(lo, hi)| self.cron.expand(lo, hi, self.duration))
    }

    /// Whether `start` is a valid slot start for this rule.
    pub fn fires_at(&self, start: DateTime<Utc>) -> bool {
        self.expand(start, start + Duration::seconds(1))
            .next()
            .map(|slot| slot.start == start)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Weekday};
    use proptest::prelude::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_daily_midnight_expansion() {
        let cron = CronExpr::parse("0 0 * * *").unwrap();
        let slots: Vec<_> = cron
            .expand(
                utc(2025, 1, 1, 0, 0),
                utc(2025, 1, 4, 0, 0),
                DurationMinutes::new(120),
            )
            .collect();

        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0].start, utc(2025, 1, 1, 0, 0));
        assert_eq!(slots[0].end, utc(2025, 1, 1, 2, 0));
        assert_eq!(slots[1].start, utc(2025, 1, 2, 0, 0));
        assert_eq!(slots[2].start, utc(2025, 1, 3, 0, 0));
    }

    #[test]
    fn test_window_start_inclusive_end_exclusive() {
        let cron = CronExpr::parse("0 0 * * *").unwrap();
        let slots: Vec<_> = cron
            .expand(
                utc(2025, 1, 1, 0, 0),
                utc(2025, 1, 2, 0, 0),
                DurationMinutes::new(60),
            )
            .collect();

        // Firing at window_start included, firing at window_end excluded
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].start, utc(2025, 1, 1, 0, 0));
    }

    #[test]
    fn test_numeric_day_of_week_is_unix_convention() {
        // 5 = Friday in standard cron
        let cron = CronExpr::parse("0 18 * * 5").unwrap();
        let slots: Vec<_> = cron
            .expand(
                utc(2025, 1, 1, 0, 0),
                utc(2025, 1, 18, 0, 0),
                DurationMinutes::new(120),
            )
            .collect();

        assert_eq!(slots.len(), 3);
        for slot in &slots {
            assert_eq!(slot.start.weekday(), Weekday::Fri);
        }
        assert_eq!(slots[0].start, utc(2025, 1, 3, 18, 0));
        assert_eq!(slots[1].start, utc(2025, 1, 10, 18, 0));
        assert_eq!(slots[2].start, utc(2025, 1, 17, 18, 0));
    }

    #[test]
    fn test_sunday_aliases() {
        let by_zero = CronExpr::parse("0 9 * * 0").unwrap();
        let by_seven = CronExpr::parse("0 9 * * 7").unwrap();
        let window_end = utc(2025, 1, 15, 0, 0);
        let a: Vec<_> = by_zero
            .expand(utc(2025, 1, 1, 0, 0), window_end, DurationMinutes::new(60))
            .collect();
        let b: Vec<_> = by_seven
            .expand(utc(2025, 1, 1, 0, 0), window_end, DurationMinutes::new(60))
            .collect();
        assert_eq!(a, b);
        assert!(a.iter().all(|s| s.start.weekday() == Weekday::Sun));
    }

    #[test]
    fn test_dow_ranges_and_lists() {
        // Weekdays only
        let cron = CronExpr::parse("0 8 * * 1-5").unwrap();
        let slots: Vec<_> = cron
            .expand(utc(2025, 1, 6, 0, 0), utc(2025, 1, 13, 0, 0), DurationMinutes::new(30))
            .collect();
        assert_eq!(slots.len(), 5);
        assert!(slots
            .iter()
            .all(|s| s.start.weekday().num_days_from_monday() < 5));
    }

    #[test]
    fn test_invalid_expressions_rejected() {
        assert!(matches!(
            CronExpr::parse("0 0 * *"),
            Err(DomainError::InvalidCronExpression(_))
        ));
        assert!(matches!(
            CronExpr::parse("0 0 * * * *"),
            Err(DomainError::InvalidCronExpression(_))
        ));
        assert!(matches!(
            CronExpr::parse("61 0 * * *"),
            Err(DomainError::InvalidCronExpression(_))
        ));
        assert!(matches!(
            CronExpr::parse("0 0 * * 8"),
            Err(DomainError::InvalidCronExpression(_))
        ));
    }

    #[test]
    fn test_fires_at() {
        let cron = CronExpr::parse("30 6 * * *").unwrap();
        assert!(cron.fires_at(utc(2025, 3, 10, 6, 30)));
        assert!(!cron.fires_at(utc(2025, 3, 10, 6, 31)));
        assert!(!cron.fires_at(utc(2025, 3, 10, 7, 30)));
    }

    fn daily_rule(start: Option<NaiveDate>, end: Option<NaiveDate>) -> RecurrenceRule {
        RecurrenceRule {
            schedule_id: ScheduleId::new(),
            cron: CronExpr::parse("0 0 * * *").unwrap(),
            start_date: start,
            end_date: end,
            duration: DurationMinutes::new(120),
        }
    }

    #[test]
    fn test_rule_clips_to_date_window() {
        let rule = daily_rule(
            NaiveDate::from_ymd_opt(2025, 1, 2),
            NaiveDate::from_ymd_opt(2025, 1, 3),
        );
        let slots: Vec<_> = rule
            .expand(utc(2025, 1, 1, 0, 0), utc(2025, 1, 10, 0, 0))
            .collect();

        // end_date inclusive: firings on Jan 2 and Jan 3
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].start, utc(2025, 1, 2, 0, 0));
        assert_eq!(slots[1].start, utc(2025, 1, 3, 0, 0));
    }

    #[test]
    fn test_rule_empty_when_window_disjoint() {
        let rule = daily_rule(None, NaiveDate::from_ymd_opt(2024, 12, 1));
        let slots: Vec<_> = rule
            .expand(utc(2025, 1, 1, 0, 0), utc(2025, 1, 10, 0, 0))
            .collect();
        assert!(slots.is_empty());
    }

    #[test]
    fn test_rule_fires_at_respects_dates() {
        let rule = daily_rule(None, NaiveDate::from_ymd_opt(2025, 1, 2));
        assert!(rule.fires_at(utc(2025, 1, 2, 0, 0)));
        assert!(!rule.fires_at(utc(2025, 1, 3, 0, 0)));
        assert!(!rule.fires_at(utc(2025, 1, 2, 0, 1)));
    }

    proptest! {
        // Expand(a, b) == Expand(a, m) ++ Expand(m, b) for any split point m
        #[test]
        fn expansion_concatenates_across_any_split(offset_hours in 0i64..=72) {
            let cron = CronExpr::parse("0 */3 * * *").unwrap();
            let duration = DurationMinutes::new(60);
            let a = utc(2025, 1, 1, 0, 0);
            let b = a + Duration::hours(72);
            let m = a + Duration::hours(offset_hours);

            let whole: Vec<_> = cron.expand(a, b, duration).collect();
            let split: Vec<_> = cron
                .expand(a, m, duration)
                .chain(cron.expand(m, b, duration))
                .collect();

            prop_assert_eq!(whole, split);
        }

        #[test]
        fn expansion_is_sorted_and_in_window(offset_hours in 1i64..=240) {
            let cron = CronExpr::parse("15 */2 * * *").unwrap();
            let duration = DurationMinutes::new(45);
            let a = utc(2025, 6, 1, 0, 0);
            let b = a + Duration::hours(offset_hours);

            let slots: Vec<_> = cron.expand(a, b, duration).collect();
            for pair in slots.windows(2) {
                prop_assert!(pair[0].start <= pair[1].start);
            }
            for slot in &slots {
                prop_assert!(slot.start >= a && slot.start < b);
            }
        }
    }
}
