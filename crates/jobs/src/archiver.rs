use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::info;

use db::models::ReportStats;
use db::ReportRepository;

/// Moves reports past the retention threshold into archived state.
#[derive(Clone)]
pub struct ReportArchiver {
    pool: SqlitePool,
    retention_days: i64,
}

impl ReportArchiver {
    pub fn new(pool: SqlitePool, retention_days: i64) -> Self {
        Self {
            pool,
            retention_days,
        }
    }

    /// Archive everything older than the retention window. Idempotent;
    /// `archived_at` only ever transitions null → timestamp.
    pub async fn archive(&self, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let count = ReportRepository::archive_older_than(&self.pool, now, self.retention_days).await?;
        if count > 0 {
            info!(count, retention_days = self.retention_days, "reports archived");
        }
        Ok(count)
    }

    pub async fn stats(&self) -> Result<ReportStats, sqlx::Error> {
        ReportRepository::stats(&self.pool).await
    }
}
