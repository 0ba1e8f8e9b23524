pub mod push;
pub mod sms;

pub use push::{PushError, SubscriptionKeys, WebPushSender};
pub use sms::{SmsError, SmsLogSender};
