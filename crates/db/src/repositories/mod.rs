mod assignment_repo;
mod booking_repo;
mod broadcast_repo;
mod outbox_repo;
mod push_subscription_repo;
mod report_repo;
mod schedule_repo;
mod user_repo;

pub use assignment_repo::AssignmentRepository;
pub use booking_repo::BookingRepository;
pub use broadcast_repo::BroadcastRepository;
pub use outbox_repo::OutboxRepository;
pub use push_subscription_repo::PushSubscriptionRepository;
pub use report_repo::ReportRepository;
pub use schedule_repo::ScheduleRepository;
pub use user_repo::UserRepository;
