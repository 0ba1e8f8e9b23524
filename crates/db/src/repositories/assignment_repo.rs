use chrono::Utc;
use shared::types::AssignmentId;
use shared::{AppError, DomainError};
use sqlx::SqlitePool;

use crate::models::{CreateAssignment, RecurringAssignment};

const ASSIGNMENT_COLUMNS: &str = "id, user_id, schedule_id, day_of_week, time_slot, buddy_name, \
     description, is_active, created_at";

pub struct AssignmentRepository;

impl AssignmentRepository {
    pub async fn create(
        pool: &SqlitePool,
        input: CreateAssignment,
    ) -> Result<RecurringAssignment, AppError> {
        let id = AssignmentId::new();

        sqlx::query_as::<_, RecurringAssignment>(&format!(
            "INSERT INTO recurring_assignments \
             (id, user_id, schedule_id, day_of_week, time_slot, buddy_name, description, is_active, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
             RETURNING {ASSIGNMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(input.user_id)
        .bind(input.schedule_id)
        .bind(input.day_of_week)
        .bind(&input.time_slot)
        .bind(&input.buddy_name)
        .bind(&input.description)
        .bind(input.is_active)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DomainError::AssignmentConflict.into()
            }
            other => other.into(),
        })
    }

    pub async fn find_by_id(
        pool: &SqlitePool,
        id: AssignmentId,
    ) -> Result<Option<RecurringAssignment>, sqlx::Error> {
        sqlx::query_as::<_, RecurringAssignment>(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM recurring_assignments WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<RecurringAssignment>, sqlx::Error> {
        sqlx::query_as::<_, RecurringAssignment>(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM recurring_assignments ORDER BY created_at"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn list_active(pool: &SqlitePool) -> Result<Vec<RecurringAssignment>, sqlx::Error> {
        sqlx::query_as::<_, RecurringAssignment>(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM recurring_assignments WHERE is_active = 1 ORDER BY created_at"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn set_active(
        pool: &SqlitePool,
        id: AssignmentId,
        is_active: bool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE recurring_assignments SET is_active = ? WHERE id = ?")
            .bind(is_active)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(pool: &SqlitePool, id: AssignmentId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM recurring_assignments WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
