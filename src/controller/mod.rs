pub mod clock;
pub mod events;
pub mod groupsync;
pub mod store;
pub mod watch;

pub use groupsync::{reconcile, reconcile_groupsync, Context, ReconcileError};
pub use watch::{sync_trigger, watch_groupsyncs};
