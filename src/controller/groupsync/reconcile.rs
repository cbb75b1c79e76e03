use crate::controller::clock::{Clock, SystemClock};
use crate::controller::events::{EventPublisher, KubeEventPublisher, REASON_SYNC_ERROR};
use crate::controller::store::{
    GroupStore, GroupSyncStore, KubeGroupStore, KubeGroupSyncStore, StoreError,
};
use crate::crd::groupsync::GroupSync;
use crate::server::SharedMetrics;
use crate::syncer::{DefaultSyncerFactory, GroupSyncManager, SyncerError, SyncerFactory};
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::schedule::next_delay;
use super::status::{report_error, report_success};
use super::upsert::{owner_tag, sync_provider_groups};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Syncer(#[from] SyncerError),

    #[error("GroupSync missing namespace")]
    MissingNamespace,
}

pub struct Context {
    pub groupsyncs: Arc<dyn GroupSyncStore>,
    pub groups: Arc<dyn GroupStore>,
    pub syncers: Arc<dyn SyncerFactory>,
    pub events: Arc<dyn EventPublisher>,
    pub clock: Arc<dyn Clock>,
    /// Optional controller metrics for Prometheus
    /// When Some, records reconciliation counts, durations and synced groups
    pub metrics: Option<SharedMetrics>,
}

impl Context {
    /// Context backed by the Kubernetes API and the system clock
    pub fn new(
        client: kube::Client,
        controller_name: &str,
        metrics: Option<SharedMetrics>,
    ) -> Self {
        Context {
            groupsyncs: Arc::new(KubeGroupSyncStore::new(client.clone())),
            groups: Arc::new(KubeGroupStore::new(client.clone())),
            syncers: Arc::new(DefaultSyncerFactory::new(client.clone())),
            events: Arc::new(KubeEventPublisher::new(client, controller_name)),
            clock: Arc::new(SystemClock),
            metrics,
        }
    }
}

/// Reconcile a GroupSync resource
///
/// Entry point for `kube::runtime::Controller`. Reads the latest copy of the
/// resource from the store rather than trusting the watched object.
pub async fn reconcile(groupsync: Arc<GroupSync>, ctx: Arc<Context>) -> Result<Action, ReconcileError> {
    let namespace = groupsync
        .namespace()
        .ok_or(ReconcileError::MissingNamespace)?;
    let name = groupsync.name_any();

    Ok(match reconcile_groupsync(&namespace, &name, &ctx).await? {
        Some(delay) => Action::requeue(delay),
        None => Action::await_change(),
    })
}

/// One reconcile pass for the GroupSync `namespace/name`
///
/// Returns the delay until the next scheduled run, if any.
pub async fn reconcile_groupsync(
    namespace: &str,
    name: &str,
    ctx: &Context,
) -> Result<Option<Duration>, ReconcileError> {
    let start = Instant::now();

    let Some(mut groupsync) = ctx.groupsyncs.get(namespace, name).await? else {
        debug!(namespace, groupsync = name, "GroupSync not found, ignoring");
        return Ok(None);
    };

    let result = sync_groupsync(&mut groupsync, ctx).await;
    let duration_secs = start.elapsed().as_secs_f64();

    match result {
        Ok(requeue) => {
            if let Some(ref metrics) = ctx.metrics {
                metrics.record_reconciliation_success(duration_secs);
            }
            Ok(requeue)
        }
        Err(e) => {
            manage_error(&mut groupsync, &e, ctx).await;
            if let Some(ref metrics) = ctx.metrics {
                metrics.record_reconciliation_error(duration_secs);
            }
            Err(e)
        }
    }
}

/// Steps of a pass that can fail into the error path
async fn sync_groupsync(
    groupsync: &mut GroupSync,
    ctx: &Context,
) -> Result<Option<Duration>, ReconcileError> {
    let name = groupsync.name_any();

    let mut manager = GroupSyncManager::new(groupsync, ctx.syncers.as_ref())?;

    if groupsync.spec.set_defaults() {
        info!(groupsync = %name, "Applied provider defaults, persisting spec");
        ctx.groupsyncs.replace(groupsync).await?;
        return Ok(None);
    }

    manager.validate()?;

    for syncer in manager.syncers.iter_mut() {
        let provider = syncer.provider_name().to_string();
        info!(groupsync = %name, provider = %provider, "Beginning group sync");

        syncer.bind().await?;
        let groups = syncer.sync().await?;

        let tag = owner_tag(&name, &provider);
        let applied = sync_provider_groups(
            ctx.groups.as_ref(),
            &groups,
            &tag,
            ctx.clock.now(),
        )
        .await?;

        if let Some(ref metrics) = ctx.metrics {
            metrics.record_groups_synced(&provider, applied);
        }
        info!(
            groupsync = %name,
            provider = %provider,
            groups = groups.len(),
            applied,
            "Synchronized groups"
        );
    }

    // The success time only lands on the object once the status is persisted
    let now = ctx.clock.now();
    let mut succeeded = groupsync.clone();
    succeeded
        .status
        .get_or_insert_with(Default::default)
        .last_sync_success_time = Some(now.to_rfc3339());
    report_success(&mut succeeded, ctx.groupsyncs.as_ref(), now).await?;
    *groupsync = succeeded;

    let Some(schedule) = groupsync.spec.schedule() else {
        return Ok(None);
    };
    match next_delay(schedule, ctx.clock.now()) {
        Ok(delay) => {
            debug!(groupsync = %name, schedule, delay_secs = delay.as_secs(), "Scheduled next sync");
            Ok(Some(delay))
        }
        Err(e) => {
            warn!(groupsync = %name, error = %e, "Ignoring unusable schedule");
            Ok(None)
        }
    }
}

/// Publish a warning event and record the error condition
///
/// Never fails: the caller returns the original error.
async fn manage_error(groupsync: &mut GroupSync, err: &ReconcileError, ctx: &Context) {
    let message = err.to_string();
    error!(groupsync = %groupsync.name_any(), error = %message, "GroupSync reconcile failed");

    ctx.events
        .publish(
            &groupsync.object_ref(&()),
            EventType::Warning,
            REASON_SYNC_ERROR,
            Some(message.clone()),
        )
        .await;

    report_error(groupsync, &message, ctx.groupsyncs.as_ref(), ctx.clock.now()).await;
}
