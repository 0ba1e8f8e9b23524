use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

/// How log lines are formatted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => bail!("invalid LOG_FORMAT '{other}': expected 'text' or 'json'"),
        }
    }
}

/// Service configuration, loaded from the environment (a `.env` file is
/// honored in development). `JWT_SECRET` is the only hard requirement; push
/// is disabled when the VAPID keys are absent.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub server_port: u16,
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub otp_ttl_minutes: i64,
    pub otp_log_path: PathBuf,
    pub outbox_batch_size: i64,
    pub outbox_max_retries: i32,
    pub vapid_public_key: Option<String>,
    pub vapid_private_key: Option<String>,
    pub vapid_subject: Option<String>,
    pub push_ttl_secs: u32,
    pub booking_min_lead_minutes: i64,
    pub cancel_cutoff_hours: i64,
    pub recurring_horizon_days: i64,
    pub report_retention_days: i64,
    pub dev_mode: bool,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if jwt_secret.is_empty() {
            bail!("JWT_SECRET must not be empty");
        }

        let vapid_public_key = optional("VAPID_PUBLIC_KEY");
        let vapid_private_key = optional("VAPID_PRIVATE_KEY");
        let vapid_subject = optional("VAPID_SUBJECT");
        if vapid_private_key.is_some() != vapid_public_key.is_some() {
            bail!("VAPID_PUBLIC_KEY and VAPID_PRIVATE_KEY must be set together");
        }

        Ok(Self {
            database_path: parsed("DATABASE_PATH", PathBuf::from("nightwatch.db"))?,
            server_port: parsed("SERVER_PORT", 8080)?,
            jwt_secret,
            jwt_expiry_hours: parsed("JWT_EXPIRY_HOURS", 168)?,
            otp_ttl_minutes: parsed("OTP_TTL_MINUTES", 10)?,
            otp_log_path: parsed("OTP_LOG_PATH", PathBuf::from("outbox.log"))?,
            outbox_batch_size: parsed("OUTBOX_BATCH_SIZE", 10)?,
            outbox_max_retries: parsed("OUTBOX_MAX_RETRIES", 3)?,
            vapid_public_key,
            vapid_private_key,
            vapid_subject,
            push_ttl_secs: parsed("PUSH_TTL_SECS", 600)?,
            booking_min_lead_minutes: parsed("BOOKING_MIN_LEAD_MINUTES", 0)?,
            cancel_cutoff_hours: parsed("CANCEL_CUTOFF_HOURS", 2)?,
            recurring_horizon_days: parsed("RECURRING_HORIZON_DAYS", 14)?,
            report_retention_days: parsed("REPORT_RETENTION_DAYS", 365)?,
            dev_mode: parsed("DEV_MODE", false)?,
            log_format: parsed("LOG_FORMAT", LogFormat::Text)?,
        })
    }

    pub fn push_configured(&self) -> bool {
        self.vapid_private_key.is_some() && self.vapid_subject.is_some()
    }
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn parsed<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.is_empty() => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key} '{raw}': {e}")),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("yaml".parse::<LogFormat>().is_err());
    }
}
