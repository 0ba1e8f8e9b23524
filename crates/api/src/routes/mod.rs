pub mod admin_assignments;
pub mod admin_bookings;
pub mod admin_broadcasts;
pub mod admin_reports;
pub mod admin_schedules;
pub mod admin_users;
pub mod auth;
pub mod bookings;
pub mod dashboard;
pub mod health;
pub mod push;
pub mod reports;
pub mod schedules;
pub mod shifts;

use chrono::{DateTime, Utc};
use shared::AppError;

use crate::error::ApiError;

/// Parse an RFC 3339 timestamp from a request field.
pub(crate) fn parse_rfc3339(field: &str, value: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ApiError::from(AppError::Validation(format!("Invalid {field} timestamp"))))
}

/// Parse a UUID-shaped path or body id.
pub(crate) fn parse_id<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, ApiError> {
    value
        .parse()
        .map_err(|_| ApiError::from(AppError::Validation(format!("Invalid {field}"))))
}

/// Validate phone number is in E.164 format
pub(crate) fn validate_phone_number(phone: &str) -> Result<String, ApiError> {
    let cleaned: String = phone
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();

    if !cleaned.starts_with('+') {
        return Err(ApiError::from(shared::DomainError::ValidationError(
            "Phone number must start with country code (e.g., +27)".to_string(),
        )));
    }

    let digits: String = cleaned.chars().skip(1).collect();
    if digits.len() < 10 || digits.len() > 15 {
        return Err(ApiError::from(shared::DomainError::ValidationError(
            "Invalid phone number format".to_string(),
        )));
    }

    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_phone_number() {
        assert_eq!(validate_phone_number("+27 82 123 4567").unwrap(), "+27821234567");
        assert!(validate_phone_number("0821234567").is_err());
        assert!(validate_phone_number("+123").is_err());
    }
}
