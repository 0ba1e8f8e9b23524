use chrono::{DateTime, Utc};
use shared::types::{BookingId, ScheduleId, UserId};
use shared::{AppError, DomainError};
use sqlx::SqlitePool;

use crate::models::{Booking, BookingWithNames, CreateBooking, NewOutboxItem};
use crate::repositories::OutboxRepository;

const BOOKING_COLUMNS: &str = "id, user_id, schedule_id, start_time, buddy_name, checked_in_at, \
     attended, is_recurring, created_at";

pub struct BookingRepository;

impl BookingRepository {
    /// Create a booking, enqueuing its notifications in the same transaction.
    ///
    /// The `(schedule_id, start_time)` unique index arbitrates concurrent
    /// attempts: exactly one insert wins, losers get `SlotAlreadyBooked`. A
    /// duplicate by the same user is reported as `AlreadyBookedByUser`.
    pub async fn create(
        pool: &SqlitePool,
        input: CreateBooking,
        notifications: &[NewOutboxItem],
    ) -> Result<Booking, AppError> {
        let mut tx = pool.begin().await.map_err(AppError::from)?;

        // The insert leads the transaction so the write lock is taken up
        // front; contenders then queue on the busy timeout instead of racing
        // a read snapshot.
        let id = BookingId::new();
        let inserted = sqlx::query_as::<_, Booking>(&format!(
            "INSERT INTO bookings (id, user_id, schedule_id, start_time, buddy_name, is_recurring, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (schedule_id, start_time) DO NOTHING \
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(id)
        .bind(input.user_id)
        .bind(input.schedule_id)
        .bind(input.start_time)
        .bind(&input.buddy_name)
        .bind(input.is_recurring)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::from)?;

        let Some(booking) = inserted else {
            let owner: Option<(UserId,)> = sqlx::query_as(
                "SELECT user_id FROM bookings WHERE schedule_id = ? AND start_time = ?",
            )
            .bind(input.schedule_id)
            .bind(input.start_time)
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::from)?;

            return Err(match owner {
                Some((user,)) if user == input.user_id => DomainError::AlreadyBookedByUser.into(),
                _ => DomainError::SlotAlreadyBooked.into(),
            });
        };

        for item in notifications {
            OutboxRepository::insert_in_tx(&mut tx, item)
                .await
                .map_err(AppError::from)?;
        }

        tx.commit().await.map_err(AppError::from)?;
        Ok(booking)
    }

    /// Materializer insert: takes the slot if free, skips silently otherwise.
    pub async fn create_if_slot_free(
        pool: &SqlitePool,
        input: CreateBooking,
    ) -> Result<Option<Booking>, sqlx::Error> {
        let id = BookingId::new();
        sqlx::query_as::<_, Booking>(&format!(
            "INSERT INTO bookings (id, user_id, schedule_id, start_time, buddy_name, is_recurring, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (schedule_id, start_time) DO NOTHING \
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(id)
        .bind(input.user_id)
        .bind(input.schedule_id)
        .bind(input.start_time)
        .bind(&input.buddy_name)
        .bind(input.is_recurring)
        .bind(Utc::now())
        .fetch_optional(pool)
        .await
    }

    /// Delete a booking (cancellation), enqueuing the cancellation
    /// notifications in the same transaction.
    pub async fn delete_with_notifications(
        pool: &SqlitePool,
        id: BookingId,
        notifications: &[NewOutboxItem],
    ) -> Result<(), AppError> {
        let mut tx = pool.begin().await.map_err(AppError::from)?;

        let result = sqlx::query("DELETE FROM bookings WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::BookingNotFound(id.to_string()).into());
        }

        for item in notifications {
            OutboxRepository::insert_in_tx(&mut tx, item)
                .await
                .map_err(AppError::from)?;
        }

        tx.commit().await.map_err(AppError::from)?;
        Ok(())
    }

    pub async fn find_by_id(
        pool: &SqlitePool,
        id: BookingId,
    ) -> Result<Option<Booking>, sqlx::Error> {
        sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_slot(
        pool: &SqlitePool,
        schedule_id: ScheduleId,
        start_time: DateTime<Utc>,
    ) -> Result<Option<Booking>, sqlx::Error> {
        sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE schedule_id = ? AND start_time = ?"
        ))
        .bind(schedule_id)
        .bind(start_time)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_by_user(pool: &SqlitePool, user_id: UserId) -> Result<Vec<Booking>, sqlx::Error> {
        sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = ? ORDER BY start_time DESC"
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Bookings whose start time falls in `[from, to)`, for slot annotation.
    pub async fn list_in_range(
        pool: &SqlitePool,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Booking>, sqlx::Error> {
        sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE start_time >= ? AND start_time < ? \
             ORDER BY start_time"
        ))
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await
    }

    /// Admin listing with user and schedule names resolved.
    pub async fn list_in_range_with_names(
        pool: &SqlitePool,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BookingWithNames>, sqlx::Error> {
        sqlx::query_as::<_, BookingWithNames>(
            "SELECT b.id, b.user_id, u.phone AS user_phone, u.name AS user_name, \
                    b.schedule_id, s.name AS schedule_name, b.start_time, s.duration_minutes, \
                    b.buddy_name, b.checked_in_at, b.attended, b.is_recurring, b.created_at \
             FROM bookings b \
             JOIN users u ON u.id = b.user_id \
             JOIN schedules s ON s.id = b.schedule_id \
             WHERE b.start_time >= ? AND b.start_time < ? \
             ORDER BY b.start_time",
        )
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await
    }

    pub async fn set_checked_in(
        pool: &SqlitePool,
        id: BookingId,
        at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE bookings SET checked_in_at = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_attendance(
        pool: &SqlitePool,
        id: BookingId,
        attended: bool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE bookings SET attended = ? WHERE id = ?")
            .bind(attended)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_upcoming(pool: &SqlitePool, now: DateTime<Utc>) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bookings WHERE start_time > ?")
            .bind(now)
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Channel, CreateSchedule, CreateUser, UserRole};
    use crate::repositories::{ScheduleRepository, UserRepository};
    use crate::test_support::pool as test_pool;
    use chrono::TimeZone;

    async fn seed_user(pool: &SqlitePool, phone: &str) -> UserId {
        UserRepository::create(
            pool,
            CreateUser {
                phone: phone.to_string(),
                name: None,
                role: UserRole::Owl,
            },
        )
        .await
        .unwrap()
        .id
    }

    async fn seed_schedule(pool: &SqlitePool) -> ScheduleId {
        ScheduleRepository::create(
            pool,
            CreateSchedule {
                name: "Evening patrol".to_string(),
                cron_expr: "0 18 * * *".to_string(),
                start_date: None,
                end_date: None,
                duration_minutes: 120,
                is_active: true,
            },
        )
        .await
        .unwrap()
        .id
    }

    fn slot_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 2, 18, 0, 0).unwrap()
    }

    fn booking_input(user_id: UserId, schedule_id: ScheduleId) -> CreateBooking {
        CreateBooking {
            user_id,
            schedule_id,
            start_time: slot_start(),
            buddy_name: None,
            is_recurring: false,
        }
    }

    #[tokio::test]
    async fn test_create_enqueues_notifications_atomically() {
        let pool = test_pool().await;
        let user_id = seed_user(&pool, "+27820000001").await;
        let schedule_id = seed_schedule(&pool).await;

        let items = vec![NewOutboxItem::sms(
            user_id,
            "+27820000001",
            "booking_confirmation",
            "Shift booked",
        )];
        BookingRepository::create(&pool, booking_input(user_id, schedule_id), &items)
            .await
            .unwrap();

        let due = OutboxRepository::fetch_due(&pool, 10, Utc::now()).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].channel, Channel::Sms);
        assert_eq!(due[0].recipient, "+27820000001");
    }

    #[tokio::test]
    async fn test_second_booking_for_slot_conflicts() {
        let pool = test_pool().await;
        let alice = seed_user(&pool, "+27820000001").await;
        let bob = seed_user(&pool, "+27820000002").await;
        let schedule_id = seed_schedule(&pool).await;

        BookingRepository::create(&pool, booking_input(alice, schedule_id), &[])
            .await
            .unwrap();

        let err = BookingRepository::create(&pool, booking_input(bob, schedule_id), &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Domain(DomainError::SlotAlreadyBooked)
        ));

        // Loser left no partial state behind
        let due = OutboxRepository::fetch_due(&pool, 10, Utc::now()).await.unwrap();
        assert!(due.is_empty());
    }

    #[tokio::test]
    async fn test_same_user_duplicate_reported_distinctly() {
        let pool = test_pool().await;
        let alice = seed_user(&pool, "+27820000001").await;
        let schedule_id = seed_schedule(&pool).await;

        BookingRepository::create(&pool, booking_input(alice, schedule_id), &[])
            .await
            .unwrap();
        let err = BookingRepository::create(&pool, booking_input(alice, schedule_id), &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Domain(DomainError::AlreadyBookedByUser)
        ));
    }

    #[tokio::test]
    async fn test_cancel_restores_slot_availability() {
        let pool = test_pool().await;
        let alice = seed_user(&pool, "+27820000001").await;
        let bob = seed_user(&pool, "+27820000002").await;
        let schedule_id = seed_schedule(&pool).await;

        let booking = BookingRepository::create(&pool, booking_input(alice, schedule_id), &[])
            .await
            .unwrap();
        BookingRepository::delete_with_notifications(&pool, booking.id, &[])
            .await
            .unwrap();

        // Slot is free again
        BookingRepository::create(&pool, booking_input(bob, schedule_id), &[])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_creates_have_exactly_one_winner() {
        // File-backed database so contenders really run on separate
        // connections.
        let dir = tempfile::tempdir().unwrap();
        let pool = crate::create_pool(&dir.path().join("contention.db")).await.unwrap();
        crate::MIGRATOR.run(&pool).await.unwrap();

        let schedule_id = seed_schedule(&pool).await;
        let mut contenders = Vec::new();
        for i in 0..8 {
            contenders.push(seed_user(&pool, &format!("+2782000010{i}")).await);
        }

        let mut tasks = Vec::new();
        for user_id in contenders {
            let pool = pool.clone();
            tasks.push(tokio::spawn(async move {
                BookingRepository::create(&pool, booking_input(user_id, schedule_id), &[]).await
            }));
        }

        let mut winners = 0;
        let mut conflicts = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => winners += 1,
                Err(AppError::Domain(DomainError::SlotAlreadyBooked)) => conflicts += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(conflicts, 7);
    }

    #[tokio::test]
    async fn test_create_if_slot_free_skips_conflicts() {
        let pool = test_pool().await;
        let alice = seed_user(&pool, "+27820000001").await;
        let bob = seed_user(&pool, "+27820000002").await;
        let schedule_id = seed_schedule(&pool).await;

        let first = BookingRepository::create_if_slot_free(&pool, booking_input(alice, schedule_id))
            .await
            .unwrap();
        assert!(first.is_some());

        let second = BookingRepository::create_if_slot_free(&pool, booking_input(bob, schedule_id))
            .await
            .unwrap();
        assert!(second.is_none());

        let kept = BookingRepository::find_by_slot(&pool, schedule_id, slot_start())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kept.user_id, alice);
    }
}
