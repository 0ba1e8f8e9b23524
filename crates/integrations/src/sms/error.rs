use thiserror::Error;

pub type SmsResult<T> = Result<T, SmsError>;

#[derive(Debug, Error)]
pub enum SmsError {
    #[error("SMS log write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl SmsError {
    /// Whether a later attempt could succeed. A missing or unwritable log
    /// path stays broken; most other I/O failures (disk pressure,
    /// interruptions) are worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            SmsError::Io(e) => !matches!(
                e.kind(),
                std::io::ErrorKind::NotFound
                    | std::io::ErrorKind::PermissionDenied
                    | std::io::ErrorKind::InvalidInput
            ),
        }
    }
}
