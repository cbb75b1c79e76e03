//! Kubernetes Event recording
//!
//! Events are fire-and-forget: failures are logged as warnings and never
//! propagate. A failed event must not change the outcome of a reconcile.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use tracing::warn;

/// Reason attached to warning events for failed synchronizations
pub const REASON_SYNC_ERROR: &str = "GroupSyncError";

/// Action attached to events emitted by the reconciler
pub const ACTION_RECONCILE: &str = "Reconcile";

/// Publishes Kubernetes Events about a resource
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        note: Option<String>,
    );
}

/// Publisher backed by `kube::runtime::events::Recorder`
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// The controller name is reported as the event's reporting component
    pub fn new(client: kube::Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: None,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        note: Option<String>,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note,
            action: ACTION_RECONCILE.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(reason, error = %e, "Failed to publish Kubernetes event");
        }
    }
}

/// Records published events in memory
#[cfg(test)]
#[derive(Default)]
pub struct MockEventPublisher {
    events: std::sync::Mutex<Vec<(EventType, String, Option<String>)>>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
impl MockEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// (type, reason, note) of every published event
    pub fn events(&self) -> Vec<(EventType, String, Option<String>)> {
        self.events.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
#[async_trait]
impl EventPublisher for MockEventPublisher {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        note: Option<String>,
    ) {
        self.events
            .lock()
            .unwrap()
            .push((type_, reason.to_string(), note));
    }
}
