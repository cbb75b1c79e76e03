use crate::controller::store::{Group, GroupStore, StoreError};
use crate::syncer::ExternalGroup;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::timestamp::iso8601;

/// Label naming the GroupSync/provider pair that owns a Group
pub const SYNC_PROVIDER_LABEL: &str = "group-sync-operator.redhat-cop.io/sync-provider";

/// Annotation holding the time of the last synchronization of a Group
pub const SYNC_TIMESTAMP_ANNOTATION: &str = "group-sync-operator.redhat-cop.io/last-sync-timestamp";

/// Ownership tag of a provider: `<groupsync name>_<provider name>`
pub fn owner_tag(groupsync_name: &str, provider_name: &str) -> String {
    format!("{}_{}", groupsync_name, provider_name)
}

/// Create or update the Group mirroring `external`
///
/// An existing Group is only touched when its ownership label equals
/// `owner_tag`; otherwise it is left alone and `Ok(false)` is returned.
/// Labels, annotations and users are replaced wholesale.
pub async fn upsert_group(
    store: &dyn GroupStore,
    external: &ExternalGroup,
    owner_tag: &str,
    now: DateTime<Utc>,
) -> Result<bool, StoreError> {
    if external.name.is_empty() {
        warn!(owner = %owner_tag, "Provider returned a group without a name, skipping");
        return Ok(false);
    }

    let existing = store.get(&external.name).await?;
    let exists = existing.is_some();

    let mut group = match existing {
        None => Group::new(&external.name),
        Some(group) => {
            let found = group
                .metadata
                .labels
                .as_ref()
                .and_then(|labels| labels.get(SYNC_PROVIDER_LABEL));
            if found.map(String::as_str) != Some(owner_tag) {
                info!(
                    group = %external.name,
                    expected = %owner_tag,
                    found = ?found,
                    "Group provider label did not match expected provider label, skipping"
                );
                return Ok(false);
            }
            group
        }
    };

    let mut labels = external.labels.clone().unwrap_or_default();
    labels.insert(SYNC_PROVIDER_LABEL.to_string(), owner_tag.to_string());

    let mut annotations = external.annotations.clone().unwrap_or_default();
    annotations.insert(SYNC_TIMESTAMP_ANNOTATION.to_string(), iso8601(&now));

    group.metadata.labels = Some(labels);
    group.metadata.annotations = Some(annotations);
    group.users = external.users.clone();

    if exists {
        store.replace(&group).await?;
    } else {
        store.create(&group).await?;
    }

    debug!(group = %external.name, created = !exists, users = group.users.len(), "Group applied");
    Ok(true)
}

/// Apply every group of one provider, in the order the provider returned them
///
/// Stops at the first store error. Returns the number of groups applied.
pub async fn sync_provider_groups(
    store: &dyn GroupStore,
    groups: &[ExternalGroup],
    owner_tag: &str,
    now: DateTime<Utc>,
) -> Result<usize, StoreError> {
    let mut applied = 0;
    for group in groups {
        if upsert_group(store, group, owner_tag, now).await? {
            applied += 1;
        }
    }
    Ok(applied)
}
