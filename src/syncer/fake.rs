//! Scripted syncers for reconciler tests

use super::{ExternalGroup, GroupSyncer, SyncerError, SyncerFactory};
use crate::crd::groupsync::{GroupSync, Provider};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Scripted behaviour of one provider
#[derive(Clone, Debug, Default)]
pub struct FakeProvider {
    pub groups: Vec<ExternalGroup>,
    pub invalid: Option<String>,
    pub bind_error: Option<String>,
    pub sync_error: Option<String>,
}

impl FakeProvider {
    pub fn with_groups(groups: Vec<ExternalGroup>) -> Self {
        Self {
            groups,
            ..Default::default()
        }
    }

    pub fn failing_bind(message: &str) -> Self {
        Self {
            bind_error: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn failing_sync(message: &str) -> Self {
        Self {
            sync_error: Some(message.to_string()),
            ..Default::default()
        }
    }
}

/// Factory resolving providers by name; unknown names fail resolution
#[derive(Default)]
pub struct FakeSyncerFactory {
    providers: BTreeMap<String, FakeProvider>,
    calls: Arc<Mutex<Vec<String>>>,
}

#[allow(clippy::unwrap_used)]
impl FakeSyncerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider(mut self, name: &str, provider: FakeProvider) -> Self {
        self.providers.insert(name.to_string(), provider);
        self
    }

    /// Calls in order, as "bind:<provider>" and "sync:<provider>"
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl SyncerFactory for FakeSyncerFactory {
    fn build(
        &self,
        _groupsync: &GroupSync,
        provider: &Provider,
    ) -> Result<Box<dyn GroupSyncer>, SyncerError> {
        let script = self.providers.get(&provider.name).cloned().ok_or_else(|| {
            SyncerError::UnknownProvider(provider.name.clone(), "not scripted".to_string())
        })?;
        Ok(Box::new(FakeSyncer {
            name: provider.name.clone(),
            script,
            calls: self.calls.clone(),
        }))
    }
}

pub struct FakeSyncer {
    name: String,
    script: FakeProvider,
    calls: Arc<Mutex<Vec<String>>>,
}

#[allow(clippy::unwrap_used)]
#[async_trait]
impl GroupSyncer for FakeSyncer {
    fn provider_name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<(), SyncerError> {
        match &self.script.invalid {
            Some(message) => Err(SyncerError::validation(&self.name, message.clone())),
            None => Ok(()),
        }
    }

    async fn bind(&mut self) -> Result<(), SyncerError> {
        self.calls.lock().unwrap().push(format!("bind:{}", self.name));
        match &self.script.bind_error {
            Some(message) => Err(SyncerError::Api(message.clone())),
            None => Ok(()),
        }
    }

    async fn sync(&self) -> Result<Vec<ExternalGroup>, SyncerError> {
        self.calls.lock().unwrap().push(format!("sync:{}", self.name));
        match &self.script.sync_error {
            Some(message) => Err(SyncerError::Api(message.clone())),
            None => Ok(self.script.groups.clone()),
        }
    }
}
