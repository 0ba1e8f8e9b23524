use thiserror::Error;

/// Domain-level errors representing business logic violations
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid cron expression: {0}")]
    InvalidCronExpression(String),

    #[error("Requested time is not a valid slot for this schedule")]
    InvalidSlot,

    #[error("Slot is already booked")]
    SlotAlreadyBooked,

    #[error("You already have a booking for this slot")]
    AlreadyBookedByUser,

    #[error("Booking requires at least {min_minutes} minutes of lead time")]
    BookingLeadTime { min_minutes: i32 },

    #[error("Bookings can only be cancelled up to {cutoff_hours} hours before the shift")]
    CancellationTooLate { cutoff_hours: i32 },

    #[error("Check-in window is closed")]
    CheckInWindowClosed,

    #[error("Attendance can only be marked after the shift has ended")]
    AttendanceBeforeShiftEnd,

    #[error("Invalid time slot format: {0}")]
    InvalidTimeSlotFormat(String),

    #[error("Schedule not found: {0}")]
    ScheduleNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Booking not found: {0}")]
    BookingNotFound(String),

    #[error("Report not found: {0}")]
    ReportNotFound(String),

    #[error("Recurring assignment not found: {0}")]
    AssignmentNotFound(String),

    #[error("Broadcast not found: {0}")]
    BroadcastNotFound(String),

    #[error("Push subscription not found")]
    SubscriptionNotFound,

    #[error("An active assignment already exists for this slot")]
    AssignmentConflict,

    #[error("Phone number already registered")]
    PhoneAlreadyExists,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Validation error: {0}")]
    ValidationError(String),
}
