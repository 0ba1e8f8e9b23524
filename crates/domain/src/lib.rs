pub mod assignment;
pub mod outbox_policy;
pub mod recurrence;
pub mod slots;

pub use assignment::*;
pub use outbox_policy::*;
pub use recurrence::*;
pub use slots::*;
