pub mod reconcile;
pub mod schedule;
pub mod status;
pub mod timestamp;
pub mod upsert;

pub use reconcile::*;
pub use schedule::{next_delay, ScheduleError};
pub use status::{report_error, report_success};
pub use timestamp::iso8601;
pub use upsert::*;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[path = "groupsync_test.rs"]
mod tests;
