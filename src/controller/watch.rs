//! GroupSync watch stream for the controller
//!
//! Only spec (generation) and finalizer changes start a pass. Status patches
//! written by the reconciler itself are filtered out, so the next pass after
//! a success comes from the schedule requeue.

use crate::crd::groupsync::GroupSync;
use futures::Stream;
use kube::runtime::reflector::{self, Store};
use kube::runtime::{predicates, watcher, PredicateConfig, WatchStreamExt};
use kube::{Api, ResourceExt};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Hash of the properties whose change triggers a reconcile
///
/// Covers `metadata.generation` and `metadata.finalizers`; status, labels
/// and annotations do not contribute.
pub fn sync_trigger(groupsync: &GroupSync) -> Option<u64> {
    let generation = predicates::generation(groupsync)?;
    let mut hasher = DefaultHasher::new();
    generation.hash(&mut hasher);
    groupsync.finalizers().hash(&mut hasher);
    Some(hasher.finish())
}

/// Reflector store and filtered stream of GroupSyncs for `Controller::for_stream`
pub fn watch_groupsyncs(
    api: Api<GroupSync>,
    config: watcher::Config,
) -> (
    Store<GroupSync>,
    impl Stream<Item = Result<GroupSync, watcher::Error>> + Send + 'static,
) {
    let (reader, writer) = reflector::store();
    let stream = watcher(api, config)
        .default_backoff()
        .reflect(writer)
        .applied_objects()
        .predicate_filter(sync_trigger, PredicateConfig::default());
    (reader, stream)
}
