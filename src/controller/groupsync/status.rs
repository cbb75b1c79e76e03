use crate::controller::store::{GroupSyncStore, StoreError};
use crate::crd::groupsync::{GroupSync, GroupSyncCondition, GroupSyncStatus, CONDITION_TYPE};
use chrono::{DateTime, Utc};
use kube::ResourceExt;
use tracing::{debug, error};

pub const REASON_SUCCEEDED: &str = "synchronization succeeded";
pub const REASON_ERROR: &str = "synchronization error";
pub const MESSAGE_SUCCEEDED: &str = "group synchronization has succeeded";

/// Build the `groupsync` condition for an outcome
///
/// The status is always "True"; the reason tells success from failure.
pub fn sync_condition(reason: &str, message: String, now: DateTime<Utc>) -> GroupSyncCondition {
    GroupSyncCondition {
        type_: CONDITION_TYPE.to_string(),
        status: "True".to_string(),
        reason: reason.to_string(),
        message,
        last_transition_time: Some(now.to_rfc3339()),
    }
}

fn with_condition(groupsync: &mut GroupSync, condition: GroupSyncCondition) {
    groupsync
        .status
        .get_or_insert_with(GroupSyncStatus::default)
        .set_condition(condition);
}

/// Record a successful synchronization and persist the status
///
/// A persist failure is returned to the caller.
pub async fn report_success(
    groupsync: &mut GroupSync,
    store: &dyn GroupSyncStore,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    with_condition(
        groupsync,
        sync_condition(REASON_SUCCEEDED, MESSAGE_SUCCEEDED.to_string(), now),
    );
    store.update_status(groupsync).await?;
    debug!(groupsync = ?groupsync.name_any(), "Recorded synchronization success");
    Ok(())
}

/// Record a failed synchronization and persist the status
///
/// A persist failure is only logged: the caller returns the original error.
pub async fn report_error(
    groupsync: &mut GroupSync,
    message: &str,
    store: &dyn GroupSyncStore,
    now: DateTime<Utc>,
) {
    with_condition(
        groupsync,
        sync_condition(REASON_ERROR, message.to_string(), now),
    );
    if let Err(e) = store.update_status(groupsync).await {
        error!(
            groupsync = ?groupsync.name_any(),
            error = %e,
            "Unable to update status"
        );
    }
}
