use chrono::{DateTime, Duration, Utc};

/// Result of a single delivery attempt, as reported by a sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Delivered,
    /// Worth retrying (timeouts, 429/5xx, disk pressure).
    Transient(String),
    /// Retrying cannot help (dead endpoint, malformed recipient).
    Permanent(String),
}

/// What the dispatcher should do with an outbox item after an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Sent,
    Retry {
        retry_count: i32,
        next_attempt_at: DateTime<Utc>,
        error: String,
    },
    GiveUp {
        error: String,
    },
}

/// Exponential backoff before the next attempt: 2^n minutes, capped so the
/// shift never overflows.
pub fn backoff_delay(retry_count: i32) -> Duration {
    Duration::minutes(1 << retry_count.clamp(0, 10) as i64)
}

/// Decide the next state for an item whose attempt produced `outcome`.
///
/// An item is allowed `max_retries` re-attempts after its first failure: a
/// transient failure while `retry_count` has already reached `max_retries`
/// gives up permanently.
pub fn next_disposition(
    outcome: AttemptOutcome,
    retry_count: i32,
    max_retries: i32,
    now: DateTime<Utc>,
) -> Disposition {
    match outcome {
        AttemptOutcome::Delivered => Disposition::Sent,
        AttemptOutcome::Permanent(error) => Disposition::GiveUp { error },
        AttemptOutcome::Transient(error) => {
            if retry_count >= max_retries {
                Disposition::GiveUp { error }
            } else {
                let next = retry_count + 1;
                Disposition::Retry {
                    retry_count: next,
                    next_attempt_at: now + backoff_delay(next),
                    error,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_delivered_is_sent() {
        assert_eq!(
            next_disposition(AttemptOutcome::Delivered, 0, 3, now()),
            Disposition::Sent
        );
    }

    #[test]
    fn test_permanent_gives_up_immediately() {
        let d = next_disposition(AttemptOutcome::Permanent("410 Gone".into()), 0, 3, now());
        assert!(matches!(d, Disposition::GiveUp { .. }));
    }

    #[test]
    fn test_transient_sequence_exhausts_after_max_retries() {
        // max_retries = 2: two retryable failures, then give up on the third
        let max = 2;
        let transient = || AttemptOutcome::Transient("timeout".into());

        let first = next_disposition(transient(), 0, max, now());
        let Disposition::Retry { retry_count: c1, .. } = first else {
            panic!("expected retry, got {first:?}");
        };
        assert_eq!(c1, 1);

        let second = next_disposition(transient(), c1, max, now());
        let Disposition::Retry { retry_count: c2, .. } = second else {
            panic!("expected retry, got {second:?}");
        };
        assert_eq!(c2, 2);

        let third = next_disposition(transient(), c2, max, now());
        assert!(matches!(third, Disposition::GiveUp { .. }));
    }

    #[test]
    fn test_backoff_grows_exponentially() {
        assert_eq!(backoff_delay(1), Duration::minutes(2));
        assert_eq!(backoff_delay(2), Duration::minutes(4));
        assert_eq!(backoff_delay(3), Duration::minutes(8));
        // Capped, never overflows
        assert_eq!(backoff_delay(64), Duration::minutes(1024));
    }

    #[test]
    fn test_retry_schedules_future_attempt() {
        let d = next_disposition(AttemptOutcome::Transient("busy".into()), 0, 3, now());
        let Disposition::Retry { next_attempt_at, .. } = d else {
            panic!("expected retry");
        };
        assert!(next_attempt_at > now());
    }
}
