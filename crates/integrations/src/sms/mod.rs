mod error;

pub use error::{SmsError, SmsResult};

use std::path::PathBuf;

use chrono::Utc;
use tokio::io::AsyncWriteExt;

/// Development/staging SMS sender that appends each message to a log file.
/// A production gateway adapter exposes the same `send` shape.
///
/// The file is opened with O_APPEND per write, so concurrent writers are safe
/// at POSIX semantics; readers must tolerate interleaved lines.
#[derive(Debug, Clone)]
pub struct SmsLogSender {
    path: PathBuf,
}

impl SmsLogSender {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn send(&self, recipient: &str, message_type: &str, payload: &str) -> SmsResult<()> {
        let line = format!(
            "[{}] To: {}, Type: {}, Payload: {}\n",
            Utc::now().to_rfc3339(),
            recipient,
            message_type,
            payload
        );

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        tracing::debug!(recipient, message_type, "SMS appended to outbox log");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_appends_formatted_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outbox.log");
        let sender = SmsLogSender::new(&path);

        sender
            .send("+27821234567", "booking_confirmation", "Shift booked for Friday")
            .await
            .unwrap();
        sender
            .send("+27829876543", "verification_code", "Your code is 123456")
            .await
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("To: +27821234567, Type: booking_confirmation, Payload: Shift booked for Friday"));
        assert!(lines[1].contains("Type: verification_code"));
        assert!(lines[0].starts_with('['));
    }

    #[tokio::test]
    async fn test_send_to_bad_path_is_permanent() {
        let sender = SmsLogSender::new("/nonexistent-root-dir/outbox.log");
        let err = sender.send("+27820000000", "test", "hello").await.unwrap_err();
        assert!(!err.is_retryable());
    }
}
