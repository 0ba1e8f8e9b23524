use chrono::Utc;
use shared::types::ScheduleId;
use sqlx::SqlitePool;

use crate::models::{CreateSchedule, Schedule};

const SCHEDULE_COLUMNS: &str =
    "id, name, cron_expr, start_date, end_date, duration_minutes, is_active, created_at";

pub struct ScheduleRepository;

impl ScheduleRepository {
    pub async fn create(pool: &SqlitePool, input: CreateSchedule) -> Result<Schedule, sqlx::Error> {
        let id = ScheduleId::new();

        sqlx::query_as::<_, Schedule>(&format!(
            "INSERT INTO schedules (id, name, cron_expr, start_date, end_date, duration_minutes, is_active, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
             RETURNING {SCHEDULE_COLUMNS}"
        ))
        .bind(id)
        .bind(&input.name)
        .bind(&input.cron_expr)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.duration_minutes)
        .bind(input.is_active)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &SqlitePool,
        id: ScheduleId,
    ) -> Result<Option<Schedule>, sqlx::Error> {
        sqlx::query_as::<_, Schedule>(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Schedule>, sqlx::Error> {
        sqlx::query_as::<_, Schedule>(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules ORDER BY name"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn list_active(pool: &SqlitePool) -> Result<Vec<Schedule>, sqlx::Error> {
        sqlx::query_as::<_, Schedule>(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE is_active = 1 ORDER BY name"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: ScheduleId,
        input: CreateSchedule,
    ) -> Result<Option<Schedule>, sqlx::Error> {
        sqlx::query_as::<_, Schedule>(&format!(
            "UPDATE schedules \
             SET name = ?, cron_expr = ?, start_date = ?, end_date = ?, duration_minutes = ?, is_active = ? \
             WHERE id = ? \
             RETURNING {SCHEDULE_COLUMNS}"
        ))
        .bind(&input.name)
        .bind(&input.cron_expr)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.duration_minutes)
        .bind(input.is_active)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: ScheduleId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM schedules WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
