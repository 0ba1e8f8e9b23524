mod assignment;
mod booking;
mod broadcast;
mod outbox;
mod push_subscription;
mod report;
mod schedule;
mod user;

pub use assignment::*;
pub use booking::*;
pub use broadcast::*;
pub use outbox::*;
pub use push_subscription::*;
pub use report::*;
pub use schedule::*;
pub use user::*;
