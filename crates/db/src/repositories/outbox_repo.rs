use chrono::{DateTime, Utc};
use shared::types::OutboxItemId;
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::models::{NewOutboxItem, OutboxItem};

const OUTBOX_COLUMNS: &str = "id, user_id, recipient, channel, message_type, payload, status, \
     retry_count, next_attempt_at, broadcast_id, created_at, sent_at, last_error";

pub struct OutboxRepository;

impl OutboxRepository {
    pub async fn insert(pool: &SqlitePool, item: &NewOutboxItem) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;
        Self::insert_in_tx(&mut tx, item).await?;
        tx.commit().await
    }

    /// Insert inside a producer's transaction. Broadcast-tagged rows collide
    /// with the fan-out dedup index instead of duplicating.
    pub async fn insert_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        item: &NewOutboxItem,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO outbox_items \
             (id, user_id, recipient, channel, message_type, payload, status, retry_count, broadcast_id, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, 'pending', 0, ?, ?) \
             ON CONFLICT (broadcast_id, user_id, channel, recipient) WHERE broadcast_id IS NOT NULL \
             DO NOTHING",
        )
        .bind(OutboxItemId::new())
        .bind(item.user_id)
        .bind(&item.recipient)
        .bind(item.channel)
        .bind(&item.message_type)
        .bind(&item.payload)
        .bind(item.broadcast_id)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Items due for a delivery attempt: pending rows, plus failed rows whose
    /// backoff window has passed. Ordered oldest-first.
    pub async fn fetch_due(
        pool: &SqlitePool,
        batch_size: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<OutboxItem>, sqlx::Error> {
        sqlx::query_as::<_, OutboxItem>(&format!(
            "SELECT {OUTBOX_COLUMNS} FROM outbox_items \
             WHERE status = 'pending' OR (status = 'failed' AND next_attempt_at <= ?) \
             ORDER BY created_at \
             LIMIT ?"
        ))
        .bind(now)
        .bind(batch_size)
        .fetch_all(pool)
        .await
    }

    pub async fn mark_sent(
        pool: &SqlitePool,
        id: OutboxItemId,
        sent_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE outbox_items SET status = 'sent', sent_at = ?, last_error = NULL WHERE id = ?",
        )
        .bind(sent_at)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn mark_retry(
        pool: &SqlitePool,
        id: OutboxItemId,
        retry_count: i64,
        next_attempt_at: DateTime<Utc>,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE outbox_items \
             SET status = 'failed', retry_count = ?, next_attempt_at = ?, last_error = ? \
             WHERE id = ?",
        )
        .bind(retry_count)
        .bind(next_attempt_at)
        .bind(error)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn mark_permanently_failed(
        pool: &SqlitePool,
        id: OutboxItemId,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE outbox_items SET status = 'permanently_failed', last_error = ? WHERE id = ?",
        )
        .bind(error)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(
        pool: &SqlitePool,
        id: OutboxItemId,
    ) -> Result<Option<OutboxItem>, sqlx::Error> {
        sqlx::query_as::<_, OutboxItem>(&format!(
            "SELECT {OUTBOX_COLUMNS} FROM outbox_items WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn count_pending(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM outbox_items WHERE status = 'pending'")
                .fetch_one(pool)
                .await?;
        Ok(row.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Channel, OutboxStatus};
    use crate::test_support::pool as test_pool;
    use chrono::Duration;

    fn item(recipient: &str) -> NewOutboxItem {
        NewOutboxItem {
            user_id: None,
            recipient: recipient.to_string(),
            channel: Channel::Sms,
            message_type: "verification_code".to_string(),
            payload: b"Your code is 123456".to_vec(),
            broadcast_id: None,
        }
    }

    #[tokio::test]
    async fn test_fetch_due_returns_oldest_first() {
        let pool = test_pool().await;
        OutboxRepository::insert(&pool, &item("+27820000001")).await.unwrap();
        OutboxRepository::insert(&pool, &item("+27820000002")).await.unwrap();

        let due = OutboxRepository::fetch_due(&pool, 10, Utc::now()).await.unwrap();
        assert_eq!(due.len(), 2);
        assert!(due[0].created_at <= due[1].created_at);
        assert!(due.iter().all(|i| i.status == OutboxStatus::Pending));
    }

    #[tokio::test]
    async fn test_fetch_due_skips_terminal_and_backing_off_items() {
        let pool = test_pool().await;
        OutboxRepository::insert(&pool, &item("+27820000001")).await.unwrap();
        OutboxRepository::insert(&pool, &item("+27820000002")).await.unwrap();
        OutboxRepository::insert(&pool, &item("+27820000003")).await.unwrap();

        let now = Utc::now();
        let all = OutboxRepository::fetch_due(&pool, 10, now).await.unwrap();

        OutboxRepository::mark_sent(&pool, all[0].id, now).await.unwrap();
        OutboxRepository::mark_permanently_failed(&pool, all[1].id, "dead endpoint")
            .await
            .unwrap();
        OutboxRepository::mark_retry(&pool, all[2].id, 1, now + Duration::minutes(2), "timeout")
            .await
            .unwrap();

        // Nothing due right now
        assert!(OutboxRepository::fetch_due(&pool, 10, now).await.unwrap().is_empty());

        // The failed item becomes due once its backoff passes
        let later = now + Duration::minutes(5);
        let due = OutboxRepository::fetch_due(&pool, 10, later).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, all[2].id);
        assert_eq!(due[0].status, OutboxStatus::Failed);
        assert_eq!(due[0].retry_count, 1);
    }

    #[tokio::test]
    async fn test_fetch_due_honors_batch_size() {
        let pool = test_pool().await;
        for i in 0..5 {
            OutboxRepository::insert(&pool, &item(&format!("+2782000000{i}"))).await.unwrap();
        }
        let due = OutboxRepository::fetch_due(&pool, 3, Utc::now()).await.unwrap();
        assert_eq!(due.len(), 3);
    }
}
