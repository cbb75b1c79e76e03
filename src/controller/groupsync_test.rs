use super::*;
use crate::controller::clock::MockClock;
use crate::controller::events::MockEventPublisher;
use crate::controller::store::memory::{MemoryGroupStore, MemoryGroupSyncStore};
use crate::controller::store::{Group, StoreError};
use crate::crd::groupsync::{
    GroupSync, GroupSyncSpec, GroupSyncStatus, KeycloakProvider, ObjectRef, Provider, CONDITION_TYPE,
};
use crate::server::create_metrics;
use crate::syncer::fake::{FakeProvider, FakeSyncerFactory};
use crate::syncer::{ExternalGroup, SyncerError};
use kube::api::ObjectMeta;
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

const NAMESPACE: &str = "group-sync-operator";
const NAME: &str = "corp-sync";
const NOW: &str = "2023-01-05T03:04:05Z";

struct Harness {
    groupsyncs: Arc<MemoryGroupSyncStore>,
    groups: Arc<MemoryGroupStore>,
    factory: Arc<FakeSyncerFactory>,
    events: Arc<MockEventPublisher>,
    ctx: Arc<Context>,
}

impl Harness {
    fn new(factory: FakeSyncerFactory) -> Self {
        let groupsyncs = Arc::new(MemoryGroupSyncStore::new());
        let groups = Arc::new(MemoryGroupStore::new());
        let factory = Arc::new(factory);
        let events = Arc::new(MockEventPublisher::new());
        let ctx = Arc::new(Context {
            groupsyncs: groupsyncs.clone(),
            groups: groups.clone(),
            syncers: factory.clone(),
            events: events.clone(),
            clock: Arc::new(MockClock::at(NOW)),
            metrics: None,
        });
        Harness {
            groupsyncs,
            groups,
            factory,
            events,
            ctx,
        }
    }

    fn with_metrics(mut self) -> Self {
        let ctx = Context {
            groupsyncs: self.groupsyncs.clone(),
            groups: self.groups.clone(),
            syncers: self.factory.clone(),
            events: self.events.clone(),
            clock: Arc::new(MockClock::at(NOW)),
            metrics: Some(create_metrics().unwrap()),
        };
        self.ctx = Arc::new(ctx);
        self
    }

    async fn reconcile(&self) -> Result<Option<Duration>, ReconcileError> {
        reconcile_groupsync(NAMESPACE, NAME, &self.ctx).await
    }

    fn stored(&self) -> GroupSync {
        self.groupsyncs.object(NAMESPACE, NAME).unwrap()
    }

    fn condition(&self) -> crate::crd::groupsync::GroupSyncCondition {
        self.stored()
            .status
            .unwrap()
            .condition(CONDITION_TYPE)
            .cloned()
            .unwrap()
    }
}

fn provider(name: &str) -> Provider {
    Provider {
        name: name.to_string(),
        ..Default::default()
    }
}

fn groupsync(providers: Vec<Provider>, schedule: Option<&str>) -> GroupSync {
    let mut gs = GroupSync::new(
        NAME,
        GroupSyncSpec {
            providers,
            schedule: schedule.map(str::to_string),
        },
    );
    gs.metadata.namespace = Some(NAMESPACE.to_string());
    gs
}

fn external(name: &str, users: &[&str]) -> ExternalGroup {
    ExternalGroup {
        name: name.to_string(),
        users: users.iter().map(|u| u.to_string()).collect(),
        labels: None,
        annotations: None,
    }
}

fn existing(name: &str, labels: &[(&str, &str)], users: &[&str]) -> Group {
    Group {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(
                labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            ..Default::default()
        },
        users: users.iter().map(|u| u.to_string()).collect(),
    }
}

fn labels(group: &Group) -> BTreeMap<String, String> {
    group.metadata.labels.clone().unwrap_or_default()
}

fn annotations(group: &Group) -> BTreeMap<String, String> {
    group.metadata.annotations.clone().unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_missing_groupsync_is_ignored() {
    let h = Harness::new(FakeSyncerFactory::new());

    assert_eq!(h.reconcile().await.unwrap(), None);
    assert!(h.events.events().is_empty());
    assert_eq!(h.groups.len(), 0);
    assert!(h.factory.calls().is_empty());
}

#[tokio::test]
async fn test_sync_creates_groups_owned_by_provider() {
    let mut admins = external("admins", &["alice", "bob"]);
    admins.labels = Some(BTreeMap::from([("team".to_string(), "ops".to_string())]));
    admins.annotations = Some(BTreeMap::from([(
        "example.com/source".to_string(),
        "github".to_string(),
    )]));

    let h = Harness::new(
        FakeSyncerFactory::new().provider("github", FakeProvider::with_groups(vec![admins])),
    );
    h.groupsyncs
        .insert(groupsync(vec![provider("github")], None));

    assert_eq!(h.reconcile().await.unwrap(), None);

    let group = h.groups.group("admins").unwrap();
    assert_eq!(group.users, vec!["alice", "bob"]);
    assert_eq!(
        labels(&group),
        BTreeMap::from([
            ("team".to_string(), "ops".to_string()),
            (SYNC_PROVIDER_LABEL.to_string(), "corp-sync_github".to_string()),
        ])
    );
    assert_eq!(
        annotations(&group),
        BTreeMap::from([
            ("example.com/source".to_string(), "github".to_string()),
            (
                SYNC_TIMESTAMP_ANNOTATION.to_string(),
                "2023-01-05T03:04:05Z".to_string()
            ),
        ])
    );

    let status = h.stored().status.unwrap();
    assert_eq!(
        status.last_sync_success_time.as_deref(),
        Some("2023-01-05T03:04:05+00:00")
    );
    let condition = status.condition(CONDITION_TYPE).unwrap();
    assert_eq!(condition.status, "True");
    assert_eq!(condition.reason, "synchronization succeeded");
    assert_eq!(condition.message, "group synchronization has succeeded");
    assert!(h.events.events().is_empty());
}

#[tokio::test]
async fn test_resync_is_idempotent() {
    let h = Harness::new(FakeSyncerFactory::new().provider(
        "github",
        FakeProvider::with_groups(vec![external("admins", &["alice"]), external("devs", &[])]),
    ));
    h.groupsyncs
        .insert(groupsync(vec![provider("github")], None));

    h.reconcile().await.unwrap();
    let first = h.groups.group("admins").unwrap();

    h.reconcile().await.unwrap();
    let second = h.groups.group("admins").unwrap();

    assert_eq!(h.groups.len(), 2);
    assert_eq!(second.users, first.users);
    assert_eq!(labels(&second), labels(&first));
    assert_eq!(annotations(&second), annotations(&first));
    assert_eq!(h.stored().status.unwrap().conditions.len(), 1);
}

#[tokio::test]
async fn test_groups_owned_elsewhere_are_skipped() {
    let h = Harness::new(FakeSyncerFactory::new().provider(
        "github",
        FakeProvider::with_groups(vec![
            external("admins", &["alice"]),
            external("manual", &["alice"]),
            external("devs", &["bob"]),
        ]),
    ));
    h.groups.insert(existing(
        "admins",
        &[(SYNC_PROVIDER_LABEL, "other-sync_github")],
        &["mallory"],
    ));
    h.groups.insert(existing("manual", &[], &["carol"]));
    h.groupsyncs
        .insert(groupsync(vec![provider("github")], None));

    assert!(h.reconcile().await.is_ok());

    let admins = h.groups.group("admins").unwrap();
    assert_eq!(admins.users, vec!["mallory"]);
    assert_eq!(
        labels(&admins).get(SYNC_PROVIDER_LABEL).map(String::as_str),
        Some("other-sync_github")
    );
    assert_eq!(h.groups.group("manual").unwrap().users, vec!["carol"]);
    assert_eq!(h.groups.group("devs").unwrap().users, vec!["bob"]);
    assert_eq!(h.groups.writes(), 1);
}

#[tokio::test]
async fn test_owned_group_is_fully_overwritten() {
    let h = Harness::new(FakeSyncerFactory::new().provider(
        "github",
        FakeProvider::with_groups(vec![external("admins", &["alice"])]),
    ));
    let mut group = existing(
        "admins",
        &[(SYNC_PROVIDER_LABEL, "corp-sync_github"), ("manual", "edit")],
        &["old-user", "alice"],
    );
    group.metadata.annotations = Some(BTreeMap::from([(
        "note".to_string(),
        "hand-written".to_string(),
    )]));
    h.groups.insert(group);
    h.groupsyncs
        .insert(groupsync(vec![provider("github")], None));

    h.reconcile().await.unwrap();

    let group = h.groups.group("admins").unwrap();
    assert_eq!(group.users, vec!["alice"]);
    assert_eq!(
        labels(&group),
        BTreeMap::from([(SYNC_PROVIDER_LABEL.to_string(), "corp-sync_github".to_string())])
    );
    assert_eq!(
        annotations(&group).keys().collect::<Vec<_>>(),
        vec![SYNC_TIMESTAMP_ANNOTATION]
    );
}

#[tokio::test]
async fn test_providers_run_in_spec_order() {
    let h = Harness::new(
        FakeSyncerFactory::new()
            .provider("zeta", FakeProvider::with_groups(vec![external("z", &[])]))
            .provider("alpha", FakeProvider::with_groups(vec![external("a", &[])])),
    );
    h.groupsyncs
        .insert(groupsync(vec![provider("zeta"), provider("alpha")], None));

    h.reconcile().await.unwrap();

    assert_eq!(
        h.factory.calls(),
        vec!["bind:zeta", "sync:zeta", "bind:alpha", "sync:alpha"]
    );
    assert_eq!(
        labels(&h.groups.group("a").unwrap())
            .get(SYNC_PROVIDER_LABEL)
            .map(String::as_str),
        Some("corp-sync_alpha")
    );
}

#[tokio::test]
async fn test_provider_failure_aborts_without_rollback() {
    let h = Harness::new(
        FakeSyncerFactory::new()
            .provider("first", FakeProvider::with_groups(vec![external("g1", &["a"])]))
            .provider("broken", FakeProvider::failing_sync("rate limited"))
            .provider("last", FakeProvider::with_groups(vec![external("g3", &["c"])])),
    );
    h.groupsyncs.insert(groupsync(
        vec![provider("first"), provider("broken"), provider("last")],
        Some("0 0 * * *"),
    ));

    let err = h.reconcile().await.unwrap_err();
    assert!(matches!(err, ReconcileError::Syncer(_)));

    assert!(h.groups.group("g1").is_some());
    assert!(h.groups.group("g3").is_none());
    assert_eq!(
        h.factory.calls(),
        vec!["bind:first", "sync:first", "bind:broken", "sync:broken"]
    );

    let status = h.stored().status.unwrap();
    assert_eq!(status.last_sync_success_time, None);
    let condition = status.condition(CONDITION_TYPE).unwrap();
    assert_eq!(condition.status, "True");
    assert_eq!(condition.reason, "synchronization error");
    assert!(condition.message.contains("rate limited"));

    let events = h.events.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, EventType::Warning);
    assert_eq!(events[0].1, "GroupSyncError");
    assert!(events[0].2.as_deref().unwrap().contains("rate limited"));
}

#[tokio::test]
async fn test_bind_failure_skips_sync() {
    let h = Harness::new(
        FakeSyncerFactory::new().provider("github", FakeProvider::failing_bind("bad token")),
    );
    h.groupsyncs
        .insert(groupsync(vec![provider("github")], None));

    assert!(h.reconcile().await.is_err());
    assert_eq!(h.factory.calls(), vec!["bind:github"]);
    assert_eq!(h.condition().reason, "synchronization error");
}

#[tokio::test]
async fn test_unresolvable_provider_reports_error() {
    let h = Harness::new(FakeSyncerFactory::new());
    h.groupsyncs
        .insert(groupsync(vec![provider("unknown")], None));

    let err = h.reconcile().await.unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::Syncer(SyncerError::UnknownProvider(..))
    ));
    assert_eq!(h.condition().reason, "synchronization error");
    assert_eq!(h.events.events().len(), 1);
}

#[tokio::test]
async fn test_invalid_configuration_syncs_nothing() {
    let invalid = FakeProvider {
        invalid: Some("organization is required".to_string()),
        ..FakeProvider::with_groups(vec![external("admins", &[])])
    };
    let h = Harness::new(
        FakeSyncerFactory::new()
            .provider("ok", FakeProvider::with_groups(vec![external("devs", &[])]))
            .provider("github", invalid),
    );
    h.groupsyncs
        .insert(groupsync(vec![provider("ok"), provider("github")], None));

    let err = h.reconcile().await.unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::Syncer(SyncerError::Validation { .. })
    ));
    assert!(h.factory.calls().is_empty());
    assert_eq!(h.groups.len(), 0);
    assert!(h.condition().message.contains("organization is required"));
}

#[tokio::test]
async fn test_defaulting_persists_spec_and_stops() {
    let keycloak = Provider {
        name: "keycloak".to_string(),
        keycloak: Some(KeycloakProvider {
            credentials_secret: ObjectRef {
                name: "keycloak-creds".to_string(),
                namespace: NAMESPACE.to_string(),
            },
            url: "https://keycloak.example.com".to_string(),
            realm: "corp".to_string(),
            ..Default::default()
        }),
        ..Default::default()
    };
    let h = Harness::new(FakeSyncerFactory::new().provider(
        "keycloak",
        FakeProvider::with_groups(vec![external("admins", &[])]),
    ));
    h.groupsyncs
        .insert(groupsync(vec![keycloak], Some("0 0 * * *")));

    assert_eq!(h.reconcile().await.unwrap(), None);

    assert_eq!(h.groupsyncs.replaces(), 1);
    assert_eq!(h.groupsyncs.status_updates(), 0);
    assert!(h.factory.calls().is_empty());
    assert_eq!(h.groups.len(), 0);

    let stored = h.stored();
    let keycloak = stored.spec.providers[0].keycloak.as_ref().unwrap();
    assert_eq!(keycloak.login_realm.as_deref(), Some("master"));
    assert!(stored.status.is_none());

    // Defaults are now in place, so the next pass syncs
    h.reconcile().await.unwrap();
    assert_eq!(h.groupsyncs.replaces(), 1);
    assert_eq!(h.groups.len(), 1);
}

#[tokio::test]
async fn test_schedule_sets_requeue_delay() {
    let h = Harness::new(FakeSyncerFactory::new().provider(
        "github",
        FakeProvider::with_groups(vec![external("admins", &[])]),
    ));
    h.groupsyncs
        .insert(groupsync(vec![provider("github")], Some("0 0 * * *")));

    let delay = h.reconcile().await.unwrap();

    // 03:04:05 until the next midnight
    let elapsed = 3 * 3600 + 4 * 60 + 5;
    assert_eq!(delay, Some(Duration::from_secs(24 * 3600 - elapsed)));
}

#[tokio::test]
async fn test_unparseable_schedule_still_succeeds() {
    let h = Harness::new(FakeSyncerFactory::new().provider(
        "github",
        FakeProvider::with_groups(vec![external("admins", &[])]),
    ));
    h.groupsyncs
        .insert(groupsync(vec![provider("github")], Some("every tuesday")));

    assert_eq!(h.reconcile().await.unwrap(), None);
    assert_eq!(h.condition().reason, "synchronization succeeded");
    assert!(h.events.events().is_empty());
}

#[tokio::test]
async fn test_status_failure_does_not_mask_sync_error() {
    let h = Harness::new(
        FakeSyncerFactory::new().provider("github", FakeProvider::failing_sync("upstream 502")),
    );
    h.groupsyncs
        .insert(groupsync(vec![provider("github")], None));
    h.groupsyncs.fail_status_updates();

    let err = h.reconcile().await.unwrap_err();
    assert!(matches!(err, ReconcileError::Syncer(SyncerError::Api(_))));
    assert_eq!(h.events.events().len(), 1);
}

#[tokio::test]
async fn test_status_failure_after_sync_is_an_error() {
    let h = Harness::new(FakeSyncerFactory::new().provider(
        "github",
        FakeProvider::with_groups(vec![external("admins", &["alice"])]),
    ));
    h.groupsyncs
        .insert(groupsync(vec![provider("github")], Some("0 0 * * *")));
    h.groupsyncs.fail_status_updates();

    let err = h.reconcile().await.unwrap_err();
    assert!(matches!(err, ReconcileError::Store(StoreError::Conflict(_))));
    // Groups written before the status update stay in place
    assert!(h.groups.group("admins").is_some());
    assert_eq!(h.events.events().len(), 1);
}

#[tokio::test]
async fn test_failed_success_report_keeps_previous_success_time() {
    let h = Harness::new(FakeSyncerFactory::new().provider(
        "github",
        FakeProvider::with_groups(vec![external("admins", &["alice"])]),
    ));
    let previous = "2023-01-04T00:00:00+00:00";
    h.groupsyncs.insert(GroupSync {
        status: Some(GroupSyncStatus {
            last_sync_success_time: Some(previous.to_string()),
            conditions: vec![],
        }),
        ..groupsync(vec![provider("github")], None)
    });
    h.groupsyncs.fail_status_updates();

    assert!(h.reconcile().await.is_err());

    let attempts = h.groupsyncs.status_attempts();
    assert_eq!(attempts.len(), 2);
    let success = attempts[0].as_ref().unwrap();
    assert_eq!(
        success.last_sync_success_time.as_deref(),
        Some("2023-01-05T03:04:05+00:00")
    );
    let error = attempts[1].as_ref().unwrap();
    assert_eq!(error.last_sync_success_time.as_deref(), Some(previous));
    assert_eq!(
        error.condition(CONDITION_TYPE).unwrap().reason,
        "synchronization error"
    );
}

#[tokio::test]
async fn test_group_write_failure_aborts() {
    let h = Harness::new(FakeSyncerFactory::new().provider(
        "github",
        FakeProvider::with_groups(vec![
            external("a", &[]),
            external("b", &[]),
            external("c", &[]),
        ]),
    ));
    h.groups.fail_writes_to("b");
    h.groupsyncs
        .insert(groupsync(vec![provider("github")], None));

    let err = h.reconcile().await.unwrap_err();
    assert!(matches!(err, ReconcileError::Store(StoreError::Conflict(_))));
    assert!(h.groups.group("a").is_some());
    assert!(h.groups.group("c").is_none());
    assert_eq!(h.condition().reason, "synchronization error");
}

#[tokio::test]
async fn test_condition_is_replaced_not_appended() {
    let h = Harness::new(
        FakeSyncerFactory::new()
            .provider("good", FakeProvider::with_groups(vec![external("a", &[])]))
            .provider("bad", FakeProvider::failing_bind("denied")),
    );
    h.groupsyncs.insert(groupsync(vec![provider("good")], None));
    h.reconcile().await.unwrap();

    h.groupsyncs.insert(GroupSync {
        status: h.stored().status,
        ..groupsync(vec![provider("bad")], None)
    });
    assert!(h.reconcile().await.is_err());

    let status = h.stored().status.unwrap();
    assert_eq!(status.conditions.len(), 1);
    assert_eq!(status.conditions[0].reason, "synchronization error");
    // The previous success time survives a failed pass
    assert!(status.last_sync_success_time.is_some());
}

#[tokio::test]
async fn test_metrics_are_recorded() {
    let h = Harness::new(
        FakeSyncerFactory::new()
            .provider(
                "github",
                FakeProvider::with_groups(vec![external("a", &[]), external("b", &[])]),
            )
            .provider("broken", FakeProvider::failing_sync("boom")),
    )
    .with_metrics();
    h.groupsyncs
        .insert(groupsync(vec![provider("github")], None));
    h.reconcile().await.unwrap();

    h.groupsyncs
        .insert(groupsync(vec![provider("broken")], None));
    assert!(h.reconcile().await.is_err());

    let body = h.ctx.metrics.as_ref().unwrap().encode().unwrap();
    assert!(body.contains(r#"groupsync_reconciliations_total{result="success"} 1"#));
    assert!(body.contains(r#"groupsync_reconciliations_total{result="error"} 1"#));
    assert!(body.contains(r#"groupsync_groups_synced_total{provider="github"} 2"#));
}

#[tokio::test]
async fn test_reconcile_maps_delay_to_action() {
    let h = Harness::new(FakeSyncerFactory::new().provider(
        "github",
        FakeProvider::with_groups(vec![external("admins", &[])]),
    ));
    let gs = groupsync(vec![provider("github")], Some("@daily"));
    h.groupsyncs.insert(gs.clone());

    let action = reconcile(Arc::new(gs.clone()), h.ctx.clone()).await.unwrap();
    let elapsed = 3 * 3600 + 4 * 60 + 5;
    assert_eq!(action, Action::requeue(Duration::from_secs(24 * 3600 - elapsed)));

    h.groupsyncs.insert(groupsync(vec![provider("github")], None));
    let action = reconcile(Arc::new(gs), h.ctx.clone()).await.unwrap();
    assert_eq!(action, Action::await_change());
}

#[tokio::test]
async fn test_reconcile_requires_namespace() {
    let h = Harness::new(FakeSyncerFactory::new());
    let mut gs = groupsync(vec![], None);
    gs.metadata.namespace = None;

    let err = reconcile(Arc::new(gs), h.ctx.clone()).await.unwrap_err();
    assert!(matches!(err, ReconcileError::MissingNamespace));
}

// ---------------------------------------------------------------------------
// Upsert engine
// ---------------------------------------------------------------------------

fn now() -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_rfc3339(NOW)
        .unwrap()
        .with_timezone(&chrono::Utc)
}

#[test]
fn test_owner_tag() {
    assert_eq!(owner_tag("corp-sync", "github"), "corp-sync_github");
}

#[tokio::test]
async fn test_upsert_creates_missing_group() {
    let store = MemoryGroupStore::new();

    let applied = upsert_group(&store, &external("admins", &["alice"]), "gs_p", now())
        .await
        .unwrap();

    assert!(applied);
    let group = store.group("admins").unwrap();
    assert_eq!(group.users, vec!["alice"]);
    assert_eq!(labels(&group)[SYNC_PROVIDER_LABEL], "gs_p");
}

#[tokio::test]
async fn test_upsert_ownership_label_wins_over_provider_labels() {
    let store = MemoryGroupStore::new();
    let mut group = external("admins", &[]);
    group.labels = Some(BTreeMap::from([(
        SYNC_PROVIDER_LABEL.to_string(),
        "spoofed".to_string(),
    )]));

    upsert_group(&store, &group, "gs_p", now()).await.unwrap();

    assert_eq!(labels(&store.group("admins").unwrap())[SYNC_PROVIDER_LABEL], "gs_p");
}

#[tokio::test]
async fn test_upsert_skips_group_without_matching_label() {
    let store = MemoryGroupStore::new();
    store.insert(existing("admins", &[(SYNC_PROVIDER_LABEL, "gs_other")], &["x"]));

    let applied = upsert_group(&store, &external("admins", &["alice"]), "gs_p", now())
        .await
        .unwrap();

    assert!(!applied);
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn test_sync_provider_groups_counts_applied() {
    let store = MemoryGroupStore::new();
    store.insert(existing("taken", &[], &[]));
    store.insert(existing("mine", &[(SYNC_PROVIDER_LABEL, "gs_p")], &["old"]));

    let groups = vec![
        external("new", &["a"]),
        external("taken", &["b"]),
        external("mine", &["c"]),
    ];
    let applied = sync_provider_groups(&store, &groups, "gs_p", now())
        .await
        .unwrap();

    assert_eq!(applied, 2);
    assert_eq!(store.group("mine").unwrap().users, vec!["c"]);
    assert!(store.group("taken").unwrap().users.is_empty());
}

// ---------------------------------------------------------------------------
// Condition reporter
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_report_success_keeps_transition_time() {
    let store = MemoryGroupSyncStore::new();
    let mut gs = groupsync(vec![], None);
    store.insert(gs.clone());

    report_success(&mut gs, &store, now()).await.unwrap();
    let first = gs
        .status
        .as_ref()
        .and_then(|s| s.condition(CONDITION_TYPE))
        .and_then(|c| c.last_transition_time.clone());

    let later = now() + chrono::Duration::hours(1);
    report_error(&mut gs, "boom", &store, later).await;

    let status: GroupSyncStatus = store.object(NAMESPACE, NAME).unwrap().status.unwrap();
    let condition = status.condition(CONDITION_TYPE).unwrap();
    assert_eq!(condition.reason, "synchronization error");
    assert_eq!(condition.message, "boom");
    // The status value stays "True", so the transition time is unchanged
    assert_eq!(condition.last_transition_time, first);
    assert_eq!(store.status_updates(), 2);
}

#[tokio::test]
async fn test_report_success_propagates_persist_failure() {
    let store = MemoryGroupSyncStore::new();
    store.fail_status_updates();
    let mut gs = groupsync(vec![], None);

    assert!(report_success(&mut gs, &store, now()).await.is_err());
    // Error reporting swallows the same failure
    report_error(&mut gs, "boom", &store, now()).await;
}

#[tokio::test]
async fn test_upsert_skips_unnamed_group() {
    let store = MemoryGroupStore::new();

    let applied = upsert_group(&store, &external("", &["alice"]), "gs_p", now())
        .await
        .unwrap();

    assert!(!applied);
    assert_eq!(store.len(), 0);
}
