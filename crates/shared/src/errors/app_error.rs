use super::DomainError;
use thiserror::Error;

/// Application-level errors (includes infrastructure)
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Backend temporarily unavailable: {0}")]
    TransientBackend(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Permission denied")]
    Forbidden,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Request timeout")]
    Timeout,
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Domain(e) => match e {
                DomainError::SlotAlreadyBooked
                | DomainError::AlreadyBookedByUser
                | DomainError::AssignmentConflict
                | DomainError::PhoneAlreadyExists => 409, // Conflict
                DomainError::BookingLeadTime { .. }
                | DomainError::CancellationTooLate { .. }
                | DomainError::CheckInWindowClosed
                | DomainError::AttendanceBeforeShiftEnd => 412, // Precondition Failed
                DomainError::ScheduleNotFound(_)
                | DomainError::UserNotFound(_)
                | DomainError::BookingNotFound(_)
                | DomainError::ReportNotFound(_)
                | DomainError::AssignmentNotFound(_)
                | DomainError::BroadcastNotFound(_)
                | DomainError::SubscriptionNotFound => 404, // Not Found
                DomainError::InvalidCredentials
                | DomainError::InvalidToken
                | DomainError::TokenExpired => 401, // Unauthorized
                _ => 400, // Bad Request
            },
            AppError::Database(_) | AppError::Internal(_) => 500,
            AppError::TransientBackend(_) => 503,
            AppError::Unauthorized => 401,
            AppError::Forbidden => 403,
            AppError::NotFound(_) => 404,
            AppError::Validation(_) => 400,
            AppError::Timeout => 504,
        }
    }

    /// Get a machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Domain(e) => match e {
                DomainError::InvalidCronExpression(_) => "INVALID_CRON_EXPRESSION",
                DomainError::InvalidSlot => "INVALID_SLOT",
                DomainError::SlotAlreadyBooked => "SLOT_ALREADY_BOOKED",
                DomainError::AlreadyBookedByUser => "ALREADY_BOOKED_BY_USER",
                DomainError::BookingLeadTime { .. } => "BOOKING_LEAD_TIME",
                DomainError::CancellationTooLate { .. } => "CANCELLATION_TOO_LATE",
                DomainError::CheckInWindowClosed => "CHECKIN_WINDOW_CLOSED",
                DomainError::AttendanceBeforeShiftEnd => "ATTENDANCE_BEFORE_SHIFT_END",
                DomainError::InvalidTimeSlotFormat(_) => "INVALID_TIME_SLOT",
                DomainError::ScheduleNotFound(_) => "SCHEDULE_NOT_FOUND",
                DomainError::UserNotFound(_) => "USER_NOT_FOUND",
                DomainError::BookingNotFound(_) => "BOOKING_NOT_FOUND",
                DomainError::ReportNotFound(_) => "REPORT_NOT_FOUND",
                DomainError::AssignmentNotFound(_) => "ASSIGNMENT_NOT_FOUND",
                DomainError::BroadcastNotFound(_) => "BROADCAST_NOT_FOUND",
                DomainError::SubscriptionNotFound => "SUBSCRIPTION_NOT_FOUND",
                DomainError::AssignmentConflict => "ASSIGNMENT_CONFLICT",
                DomainError::PhoneAlreadyExists => "PHONE_EXISTS",
                DomainError::InvalidCredentials => "INVALID_CREDENTIALS",
                DomainError::InvalidToken => "INVALID_TOKEN",
                DomainError::TokenExpired => "TOKEN_EXPIRED",
                DomainError::ValidationError(_) => "VALIDATION_ERROR",
            },
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::TransientBackend(_) => "BACKEND_UNAVAILABLE",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Forbidden => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::Timeout => "TIMEOUT",
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        // Log the actual error but don't expose details
        tracing::error!("Database error: {:?}", err);
        AppError::Database(err.to_string())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_status_codes() {
        assert_eq!(AppError::from(DomainError::SlotAlreadyBooked).status_code(), 409);
        assert_eq!(AppError::from(DomainError::AlreadyBookedByUser).status_code(), 409);
    }

    #[test]
    fn test_precondition_status_codes() {
        assert_eq!(
            AppError::from(DomainError::CancellationTooLate { cutoff_hours: 2 }).status_code(),
            412
        );
        assert_eq!(AppError::from(DomainError::CheckInWindowClosed).status_code(), 412);
    }

    #[test]
    fn test_infra_status_codes() {
        assert_eq!(AppError::TransientBackend("busy".into()).status_code(), 503);
        assert_eq!(AppError::Unauthorized.status_code(), 401);
        assert_eq!(AppError::Forbidden.status_code(), 403);
    }
}
