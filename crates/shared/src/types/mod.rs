pub mod ids;
pub mod time;

pub use ids::*;
pub use time::*;
