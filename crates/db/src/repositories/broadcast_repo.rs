use chrono::{DateTime, Utc};
use shared::types::BroadcastId;
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::models::{Broadcast, CreateBroadcast};

const BROADCAST_COLUMNS: &str =
    "id, author_user_id, audience, subject, body, push_enabled, created_at, processed_at";

pub struct BroadcastRepository;

impl BroadcastRepository {
    pub async fn create(pool: &SqlitePool, input: CreateBroadcast) -> Result<Broadcast, sqlx::Error> {
        let id = BroadcastId::new();

        sqlx::query_as::<_, Broadcast>(&format!(
            "INSERT INTO broadcasts (id, author_user_id, audience, subject, body, push_enabled, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             RETURNING {BROADCAST_COLUMNS}"
        ))
        .bind(id)
        .bind(input.author_user_id)
        .bind(input.audience)
        .bind(&input.subject)
        .bind(&input.body)
        .bind(input.push_enabled)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &SqlitePool,
        id: BroadcastId,
    ) -> Result<Option<Broadcast>, sqlx::Error> {
        sqlx::query_as::<_, Broadcast>(&format!(
            "SELECT {BROADCAST_COLUMNS} FROM broadcasts WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Broadcast>, sqlx::Error> {
        sqlx::query_as::<_, Broadcast>(&format!(
            "SELECT {BROADCAST_COLUMNS} FROM broadcasts ORDER BY created_at DESC"
        ))
        .fetch_all(pool)
        .await
    }

    /// Broadcasts not yet fanned out, oldest first.
    pub async fn list_unprocessed(pool: &SqlitePool) -> Result<Vec<Broadcast>, sqlx::Error> {
        sqlx::query_as::<_, Broadcast>(&format!(
            "SELECT {BROADCAST_COLUMNS} FROM broadcasts WHERE processed_at IS NULL ORDER BY created_at"
        ))
        .fetch_all(pool)
        .await
    }

    /// Mark processed inside the same transaction as the fan-out inserts.
    pub async fn mark_processed_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        id: BroadcastId,
        processed_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE broadcasts SET processed_at = ? WHERE id = ?")
            .bind(processed_at)
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}
