use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use tracing::{info, warn};

use db::models::CreateBooking;
use db::{AssignmentRepository, BookingRepository, ScheduleRepository};
use domain::assignment::AssignmentPattern;
use shared::AppError;

/// Applies standing recurring assignments to future slots by pre-creating
/// bookings. Slots already booked are skipped, so re-running within the same
/// horizon creates nothing new.
#[derive(Clone)]
pub struct RecurringMaterializer {
    pool: SqlitePool,
    horizon_days: i64,
}

impl RecurringMaterializer {
    pub fn new(pool: SqlitePool, horizon_days: i64) -> Self {
        Self { pool, horizon_days }
    }

    /// Materialize bookings for every active assignment. Returns the number
    /// of bookings created.
    pub async fn materialize(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let assignments = AssignmentRepository::list_active(&self.pool).await?;
        if assignments.is_empty() {
            return Ok(0);
        }

        let schedules: HashMap<_, _> = ScheduleRepository::list_active(&self.pool)
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

        // The horizon covers the last started week in full, so a weekly
        // assignment lands on every occurrence the horizon touches.
        let window_end = now + Duration::days(self.horizon_days + 7);

        let mut created = 0;
        for assignment in assignments {
            let Some(schedule) = schedules.get(&assignment.schedule_id) else {
                continue;
            };

            let rule = match schedule.recurrence_rule() {
                Ok(rule) => rule,
                Err(e) => {
                    warn!(schedule = %schedule.id, error = %e, "skipping schedule with bad cron");
                    continue;
                }
            };

            let day_slot = match assignment.time_slot.parse() {
                Ok(slot) => slot,
                Err(e) => {
                    warn!(assignment = %assignment.id, error = %e, "skipping assignment with bad time slot");
                    continue;
                }
            };
            let pattern = AssignmentPattern {
                day_of_week: assignment.day_of_week as u8,
                day_slot,
            };

            for slot in rule.expand(now, window_end) {
                if !pattern.matches(&slot) {
                    continue;
                }

                let input = CreateBooking {
                    user_id: assignment.user_id,
                    schedule_id: assignment.schedule_id,
                    start_time: slot.start,
                    buddy_name: assignment.buddy_name.clone(),
                    is_recurring: true,
                };
                if BookingRepository::create_if_slot_free(&self.pool, input)
                    .await?
                    .is_some()
                {
                    created += 1;
                }
            }
        }

        if created > 0 {
            info!(created, "recurring bookings materialized");
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use db::models::{CreateAssignment, CreateSchedule, CreateUser, UserRole};
    use db::test_support;
    use db::UserRepository;
    use shared::types::{ScheduleId, UserId};

    async fn seed(pool: &SqlitePool) -> (UserId, ScheduleId) {
        let user = UserRepository::create(
            pool,
            CreateUser {
                phone: "+27820000001".to_string(),
                name: None,
                role: UserRole::Owl,
            },
        )
        .await
        .unwrap();

        let schedule = ScheduleRepository::create(
            pool,
            CreateSchedule {
                name: "Friday patrol".to_string(),
                cron_expr: "0 18 * * 5".to_string(),
                start_date: None,
                end_date: None,
                duration_minutes: 120,
                is_active: true,
            },
        )
        .await
        .unwrap();

        AssignmentRepository::create(
            pool,
            CreateAssignment {
                user_id: user.id,
                schedule_id: schedule.id,
                day_of_week: 5,
                time_slot: "18:00-20:00".to_string(),
                buddy_name: None,
                description: None,
                is_active: true,
            },
        )
        .await
        .unwrap();

        (user.id, schedule.id)
    }

    #[tokio::test]
    async fn test_materializes_matching_fridays_and_is_idempotent() {
        let pool = test_support::pool().await;
        let (user_id, schedule_id) = seed(&pool).await;

        let materializer = RecurringMaterializer::new(pool.clone(), 14);

        let jan_first = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let created = materializer.materialize(jan_first).await.unwrap();
        assert_eq!(created, 3);

        let bookings = BookingRepository::list_by_user(&pool, user_id).await.unwrap();
        let mut starts: Vec<_> = bookings.iter().map(|b| b.start_time).collect();
        starts.sort();
        assert_eq!(
            starts,
            vec![
                Utc.with_ymd_and_hms(2025, 1, 3, 18, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 1, 10, 18, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 1, 17, 18, 0, 0).unwrap(),
            ]
        );
        assert!(bookings.iter().all(|b| b.is_recurring));
        assert!(bookings.iter().all(|b| b.schedule_id == schedule_id));

        // Next day's run finds every slot already taken
        let jan_second = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(materializer.materialize(jan_second).await.unwrap(), 0);
        assert_eq!(
            BookingRepository::list_by_user(&pool, user_id).await.unwrap().len(),
            3
        );
    }

    #[tokio::test]
    async fn test_existing_booking_is_skipped_not_an_error() {
        let pool = test_support::pool().await;
        let (_user_id, schedule_id) = seed(&pool).await;

        // Someone else already took the first Friday
        let other = UserRepository::create(
            &pool,
            CreateUser {
                phone: "+27820000002".to_string(),
                name: None,
                role: UserRole::Owl,
            },
        )
        .await
        .unwrap();
        BookingRepository::create(
            &pool,
            CreateBooking {
                user_id: other.id,
                schedule_id,
                start_time: Utc.with_ymd_and_hms(2025, 1, 3, 18, 0, 0).unwrap(),
                buddy_name: None,
                is_recurring: false,
            },
            &[],
        )
        .await
        .unwrap();

        let materializer = RecurringMaterializer::new(pool.clone(), 14);
        let jan_first = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let created = materializer.materialize(jan_first).await.unwrap();
        assert_eq!(created, 2);

        // The contested slot still belongs to its original owner
        let kept = BookingRepository::find_by_slot(
            &pool,
            schedule_id,
            Utc.with_ymd_and_hms(2025, 1, 3, 18, 0, 0).unwrap(),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(kept.user_id, other.id);
        assert!(!kept.is_recurring);
    }
}
