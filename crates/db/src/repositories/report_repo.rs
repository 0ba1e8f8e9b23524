use chrono::{DateTime, Duration, Utc};
use shared::types::{ReportId, UserId};
use sqlx::SqlitePool;

use crate::models::{CreateReport, Report, ReportStats};

const REPORT_COLUMNS: &str = "id, booking_id, user_id, severity, message, latitude, longitude, \
     accuracy, location_ts, created_at, archived_at";

pub struct ReportRepository;

impl ReportRepository {
    pub async fn create(pool: &SqlitePool, input: CreateReport) -> Result<Report, sqlx::Error> {
        let id = ReportId::new();

        sqlx::query_as::<_, Report>(&format!(
            "INSERT INTO reports \
             (id, booking_id, user_id, severity, message, latitude, longitude, accuracy, location_ts, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             RETURNING {REPORT_COLUMNS}"
        ))
        .bind(id)
        .bind(input.booking_id)
        .bind(input.user_id)
        .bind(input.severity)
        .bind(&input.message)
        .bind(input.latitude)
        .bind(input.longitude)
        .bind(input.accuracy)
        .bind(input.location_ts)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: ReportId) -> Result<Option<Report>, sqlx::Error> {
        sqlx::query_as::<_, Report>(&format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &SqlitePool, include_archived: bool) -> Result<Vec<Report>, sqlx::Error> {
        let sql = if include_archived {
            format!("SELECT {REPORT_COLUMNS} FROM reports ORDER BY created_at DESC")
        } else {
            format!(
                "SELECT {REPORT_COLUMNS} FROM reports WHERE archived_at IS NULL ORDER BY created_at DESC"
            )
        };
        sqlx::query_as::<_, Report>(&sql).fetch_all(pool).await
    }

    pub async fn list_by_user(pool: &SqlitePool, user_id: UserId) -> Result<Vec<Report>, sqlx::Error> {
        sqlx::query_as::<_, Report>(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE user_id = ? ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Archive reports older than the retention window. Already-archived rows
    /// are untouched, so re-running is a no-op.
    pub async fn archive_older_than(
        pool: &SqlitePool,
        now: DateTime<Utc>,
        retention_days: i64,
    ) -> Result<u64, sqlx::Error> {
        let cutoff = now - Duration::days(retention_days);
        let result = sqlx::query(
            "UPDATE reports SET archived_at = ? WHERE created_at < ? AND archived_at IS NULL",
        )
        .bind(now)
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn set_archived(
        pool: &SqlitePool,
        id: ReportId,
        archived_at: Option<DateTime<Utc>>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE reports SET archived_at = ? WHERE id = ?")
            .bind(archived_at)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn stats(pool: &SqlitePool) -> Result<ReportStats, sqlx::Error> {
        let row: (i64, i64, i64, i64, i64) = sqlx::query_as(
            "SELECT \
                COALESCE(SUM(CASE WHEN severity = 'normal' THEN 1 ELSE 0 END), 0), \
                COALESCE(SUM(CASE WHEN severity = 'suspicion' THEN 1 ELSE 0 END), 0), \
                COALESCE(SUM(CASE WHEN severity = 'incident' THEN 1 ELSE 0 END), 0), \
                COALESCE(SUM(CASE WHEN archived_at IS NULL THEN 1 ELSE 0 END), 0), \
                COALESCE(SUM(CASE WHEN archived_at IS NOT NULL THEN 1 ELSE 0 END), 0) \
             FROM reports",
        )
        .fetch_one(pool)
        .await?;

        Ok(ReportStats {
            normal: row.0,
            suspicion: row.1,
            incident: row.2,
            active: row.3,
            archived: row.4,
        })
    }

    pub async fn count_unarchived(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM reports WHERE archived_at IS NULL")
                .fetch_one(pool)
                .await?;
        Ok(row.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateUser, Severity, UserRole};
    use crate::repositories::UserRepository;
    use crate::test_support::pool as test_pool;

    async fn seed_report(pool: &SqlitePool, user_id: UserId, severity: Severity) -> Report {
        ReportRepository::create(
            pool,
            CreateReport {
                booking_id: None,
                user_id,
                severity,
                message: "all quiet".to_string(),
                latitude: None,
                longitude: None,
                accuracy: None,
                location_ts: None,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_archival_is_idempotent_and_monotone() {
        let pool = test_pool().await;
        let user = UserRepository::create(
            &pool,
            CreateUser {
                phone: "+27820000001".to_string(),
                name: None,
                role: UserRole::Owl,
            },
        )
        .await
        .unwrap();

        let report = seed_report(&pool, user.id, Severity::Normal).await;

        // A "now" one year past creation pushes the report over retention
        let future = report.created_at + Duration::days(366);
        let first = ReportRepository::archive_older_than(&pool, future, 365).await.unwrap();
        assert_eq!(first, 1);

        let archived_at = ReportRepository::find_by_id(&pool, report.id)
            .await
            .unwrap()
            .unwrap()
            .archived_at
            .expect("archived");

        // Second run changes nothing, including the original timestamp
        let second = ReportRepository::archive_older_than(&pool, future + Duration::days(1), 365)
            .await
            .unwrap();
        assert_eq!(second, 0);
        let still = ReportRepository::find_by_id(&pool, report.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(still.archived_at, Some(archived_at));
    }

    #[tokio::test]
    async fn test_stats_counts_by_severity_and_state() {
        let pool = test_pool().await;
        let user = UserRepository::create(
            &pool,
            CreateUser {
                phone: "+27820000001".to_string(),
                name: None,
                role: UserRole::Owl,
            },
        )
        .await
        .unwrap();

        seed_report(&pool, user.id, Severity::Normal).await;
        seed_report(&pool, user.id, Severity::Suspicion).await;
        let incident = seed_report(&pool, user.id, Severity::Incident).await;
        ReportRepository::set_archived(&pool, incident.id, Some(Utc::now()))
            .await
            .unwrap();

        let stats = ReportRepository::stats(&pool).await.unwrap();
        assert_eq!(stats.normal, 1);
        assert_eq!(stats.suspicion, 1);
        assert_eq!(stats.incident, 1);
        assert_eq!(stats.active, 2);
        assert_eq!(stats.archived, 1);
    }
}
