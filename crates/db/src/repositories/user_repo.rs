use chrono::{DateTime, Utc};
use shared::types::UserId;
use shared::{AppError, DomainError};
use sqlx::SqlitePool;

use crate::models::{CreateUser, User, UserRole};

const USER_COLUMNS: &str = "id, phone, name, role, created_at";

pub struct UserRepository;

impl UserRepository {
    pub async fn create(pool: &SqlitePool, input: CreateUser) -> Result<User, AppError> {
        let id = UserId::new();

        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, phone, name, role, created_at) \
             VALUES (?, ?, ?, ?, ?) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(&input.phone)
        .bind(&input.name)
        .bind(input.role)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DomainError::PhoneAlreadyExists.into()
            }
            other => other.into(),
        })
    }

    /// Look up a user by phone, creating a guest account on first contact.
    pub async fn find_or_create_by_phone(
        pool: &SqlitePool,
        phone: &str,
        name: Option<&str>,
    ) -> Result<User, AppError> {
        if let Some(user) = Self::find_by_phone(pool, phone).await? {
            return Ok(user);
        }

        match Self::create(
            pool,
            CreateUser {
                phone: phone.to_string(),
                name: name.map(|n| n.to_string()),
                role: UserRole::Guest,
            },
        )
        .await
        {
            Ok(user) => Ok(user),
            // Lost a registration race; the row exists now
            Err(AppError::Domain(DomainError::PhoneAlreadyExists)) => {
                Self::find_by_phone(pool, phone)
                    .await?
                    .ok_or_else(|| AppError::Internal("user vanished after conflict".to_string()))
            }
            Err(other) => Err(other),
        }
    }

    pub async fn find_by_id(pool: &SqlitePool, id: UserId) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_phone(pool: &SqlitePool, phone: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE phone = ?"))
            .bind(phone)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn list_by_role(pool: &SqlitePool, role: UserRole) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role = ? ORDER BY created_at"
        ))
        .bind(role)
        .fetch_all(pool)
        .await
    }

    /// Users with any booking or report created since `cutoff`.
    pub async fn list_active_since(
        pool: &SqlitePool,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users u \
             WHERE EXISTS (SELECT 1 FROM bookings b WHERE b.user_id = u.id AND b.created_at >= ?) \
                OR EXISTS (SELECT 1 FROM reports r WHERE r.user_id = u.id AND r.created_at >= ?) \
             ORDER BY u.created_at"
        ))
        .bind(cutoff)
        .bind(cutoff)
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: UserId,
        name: Option<String>,
        role: UserRole,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET name = ?, role = ? WHERE id = ? RETURNING {USER_COLUMNS}"
        ))
        .bind(&name)
        .bind(role)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Delete a user. Dependent bookings, reports' user link, assignments and
    /// subscriptions go with it via foreign key cascades.
    pub async fn delete(pool: &SqlitePool, id: UserId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }
}
