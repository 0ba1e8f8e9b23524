use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use shared::DomainError;
use subtle::ConstantTimeEq;

const MAX_CODES_PER_HOUR: usize = 3;
const MAX_VERIFICATION_ATTEMPTS: u32 = 5;

struct OtpEntry {
    code: String,
    expires_at: DateTime<Utc>,
    attempts: u32,
    issued_at: Vec<DateTime<Utc>>,
    /// Display name supplied at registration, applied once verified.
    pending_name: Option<String>,
}

/// In-memory one-time-code store keyed by phone number. Entries expire after
/// the configured TTL; a restart forgets pending codes, which callers treat
/// as a fresh registration attempt.
pub struct OtpStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, OtpEntry>>,
}

impl OtpStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Issue a fresh code for `phone`. Returns `None` when the per-phone rate
    /// limit (3 codes per hour) is hit; callers answer with the same generic
    /// success message either way, so phone numbers cannot be enumerated.
    pub fn issue(&self, phone: &str, name: Option<&str>) -> Option<String> {
        let now = Utc::now();
        let code = generate_code();

        let mut entries = self.entries.lock().unwrap();
        // Drop entries that are both expired and outside the rate window
        let hour_ago = now - Duration::hours(1);
        entries.retain(|_, e| e.expires_at > now || e.issued_at.iter().any(|t| *t > hour_ago));

        let entry = entries.entry(phone.to_string()).or_insert_with(|| OtpEntry {
            code: String::new(),
            expires_at: now,
            attempts: 0,
            issued_at: Vec::new(),
            pending_name: None,
        });

        entry.issued_at.retain(|t| *t > hour_ago);
        if entry.issued_at.len() >= MAX_CODES_PER_HOUR {
            return None;
        }

        entry.issued_at.push(now);
        entry.code = code.clone();
        entry.expires_at = now + self.ttl;
        entry.attempts = 0;
        if let Some(name) = name {
            entry.pending_name = Some(name.to_string());
        }

        Some(code)
    }

    /// Verify a code. Consumes the entry on success and returns the pending
    /// registration name, if any; too many failed attempts invalidate the
    /// code outright.
    pub fn verify(&self, phone: &str, code: &str) -> Result<Option<String>, DomainError> {
        let now = Utc::now();
        let mut entries = self.entries.lock().unwrap();

        let Some(entry) = entries.get_mut(phone) else {
            return Err(DomainError::InvalidCredentials);
        };

        if entry.expires_at <= now || entry.code.is_empty() {
            return Err(DomainError::InvalidCredentials);
        }

        if entry.attempts >= MAX_VERIFICATION_ATTEMPTS {
            entry.code.clear();
            return Err(DomainError::InvalidCredentials);
        }

        let matches: bool = entry.code.as_bytes().ct_eq(code.as_bytes()).into();
        if !matches {
            entry.attempts += 1;
            return Err(DomainError::InvalidCredentials);
        }

        // Consumed; keep the issue history for rate limiting
        entry.code.clear();
        entry.attempts = 0;
        Ok(entry.pending_name.take())
    }
}

fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    format!("{:06}", rng.gen_range(0..1_000_000))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> OtpStore {
        OtpStore::new(Duration::minutes(10))
    }

    #[test]
    fn test_issue_verify_consumes_code() {
        let store = store();
        let code = store.issue("+27821234567", None).unwrap();
        assert_eq!(code.len(), 6);

        store.verify("+27821234567", &code).unwrap();
        // Consumed: the same code no longer verifies
        assert!(store.verify("+27821234567", &code).is_err());
    }

    #[test]
    fn test_wrong_code_rejected() {
        let store = store();
        let code = store.issue("+27821234567", None).unwrap();
        let wrong = if code == "000000" { "000001" } else { "000000" };
        assert!(store.verify("+27821234567", wrong).is_err());
        // Right code still works after one bad attempt
        store.verify("+27821234567", &code).unwrap();
    }

    #[test]
    fn test_attempt_lockout_invalidates_code() {
        let store = store();
        let code = store.issue("+27821234567", None).unwrap();
        let wrong = if code == "000000" { "000001" } else { "000000" };
        for _ in 0..MAX_VERIFICATION_ATTEMPTS {
            assert!(store.verify("+27821234567", wrong).is_err());
        }
        // Locked out: even the right code is refused now
        assert!(store.verify("+27821234567", &code).is_err());
    }

    #[test]
    fn test_rate_limit_three_codes_per_hour() {
        let store = store();
        for _ in 0..MAX_CODES_PER_HOUR {
            assert!(store.issue("+27821234567", None).is_some());
        }
        assert!(store.issue("+27821234567", None).is_none());
        // Another phone is unaffected
        assert!(store.issue("+27829999999", None).is_some());
    }

    #[test]
    fn test_unknown_phone_rejected() {
        assert!(store().verify("+27820000000", "123456").is_err());
    }

    #[test]
    fn test_expired_code_rejected() {
        let store = OtpStore::new(Duration::minutes(-1));
        let code = store.issue("+27821234567", None).unwrap();
        assert!(store.verify("+27821234567", &code).is_err());
    }
}
