use thiserror::Error;

pub type PushResult<T> = Result<T, PushError>;

#[derive(Debug, Error)]
pub enum PushError {
    /// The push service answered 404/410: the subscription is dead and should
    /// be deleted. Other endpoints of the same user may still work.
    #[error("push endpoint is gone")]
    EndpointGone,

    #[error("push service error: {message}")]
    Upstream { message: String, retryable: bool },

    #[error("push configuration error: {0}")]
    Config(String),
}

impl PushError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PushError::EndpointGone => false,
            PushError::Upstream { retryable, .. } => *retryable,
            PushError::Config(_) => false,
        }
    }
}

impl From<web_push::WebPushError> for PushError {
    fn from(err: web_push::WebPushError) -> Self {
        use web_push::WebPushError;

        match err {
            WebPushError::EndpointNotFound(_) | WebPushError::EndpointNotValid(_) => {
                PushError::EndpointGone
            }
            // Covers 429 and 5xx answers from the push service
            WebPushError::ServerError { retry_after, info } => PushError::Upstream {
                message: format!("server error (retry after {retry_after:?}): {info:?}"),
                retryable: true,
            },
            WebPushError::Unauthorized(info) => PushError::Upstream {
                message: format!("unauthorized: {info:?}"),
                retryable: false,
            },
            WebPushError::InvalidCryptoKeys => {
                PushError::Config("invalid subscription crypto keys".to_string())
            }
            other => PushError::Upstream {
                message: other.to_string(),
                retryable: false,
            },
        }
    }
}
