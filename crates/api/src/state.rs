use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::otp::OtpStore;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<Config>,
    pub otp_store: Arc<OtpStore>,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        let otp_store = Arc::new(OtpStore::new(chrono::Duration::minutes(
            config.otp_ttl_minutes,
        )));
        Self {
            pool,
            config: Arc::new(config),
            otp_store,
        }
    }
}
