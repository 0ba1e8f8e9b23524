pub mod archiver;
pub mod broadcasts;
pub mod dispatcher;
pub mod materializer;
pub mod runner;

pub use archiver::ReportArchiver;
pub use broadcasts::BroadcastEngine;
pub use dispatcher::{Dispatcher, DrainSummary, PushDelivery, SmsDelivery};
pub use materializer::RecurringMaterializer;
pub use runner::{spawn_jobs, JobIntervals};
