//! Identity provider syncers
//!
//! This module defines the GroupSyncer trait and the provider implementations:
//! - GitHubSyncer: teams of a GitHub organization
//! - KeycloakSyncer: groups (and optionally subgroups) of a Keycloak realm
//!
//! A syncer is built per provider entry for every reconcile pass and dropped
//! at the end of it.

pub mod credentials;
#[cfg(test)]
pub mod fake;
pub mod github;
pub mod http;
pub mod keycloak;

use crate::crd::groupsync::{GroupSync, Provider};
use async_trait::async_trait;
use kube::ResourceExt;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

pub use github::GitHubSyncer;
pub use keycloak::KeycloakSyncer;

/// Annotation recording the host a group was read from
pub const SYNC_SOURCE_HOST: &str = "group-sync-operator.redhat-cop.io/sync-source.host";

/// Annotation recording the provider-side identifier of a group
pub const SYNC_SOURCE_UID: &str = "group-sync-operator.redhat-cop.io/sync-source.uid";

#[derive(Debug, Error)]
pub enum SyncerError {
    #[error("Unable to resolve provider '{0}': {1}")]
    UnknownProvider(String, String),

    #[error("Invalid configuration for provider '{provider}': {message}")]
    Validation { provider: String, message: String },

    #[error("Failed to read credentials: {0}")]
    Credentials(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider API error: {0}")]
    Api(String),

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Provider '{0}' used before bind")]
    NotBound(String),
}

impl SyncerError {
    pub(crate) fn validation(provider: &str, message: impl Into<String>) -> Self {
        SyncerError::Validation {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}

/// A group as reported by an identity provider
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExternalGroup {
    pub name: String,
    pub users: Vec<String>,
    pub labels: Option<BTreeMap<String, String>>,
    pub annotations: Option<BTreeMap<String, String>>,
}

/// Connection to one identity provider for one reconcile pass
#[async_trait]
pub trait GroupSyncer: Send + Sync {
    /// Name of the provider entry, used in the ownership label
    fn provider_name(&self) -> &str;

    /// Check the provider configuration is complete
    fn validate(&self) -> Result<(), SyncerError>;

    /// Load credentials and establish connectivity
    async fn bind(&mut self) -> Result<(), SyncerError>;

    /// Fetch the provider's current groups
    async fn sync(&self) -> Result<Vec<ExternalGroup>, SyncerError>;
}

/// Builds a syncer for a provider entry based on which provider type is configured
pub trait SyncerFactory: Send + Sync {
    fn build(
        &self,
        groupsync: &GroupSync,
        provider: &Provider,
    ) -> Result<Box<dyn GroupSyncer>, SyncerError>;
}

/// Factory for the built-in providers
pub struct DefaultSyncerFactory {
    client: kube::Client,
}

impl DefaultSyncerFactory {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

impl SyncerFactory for DefaultSyncerFactory {
    fn build(
        &self,
        _groupsync: &GroupSync,
        provider: &Provider,
    ) -> Result<Box<dyn GroupSyncer>, SyncerError> {
        match (&provider.github, &provider.keycloak) {
            (Some(github), None) => Ok(Box::new(GitHubSyncer::new(
                &provider.name,
                github.clone(),
                self.client.clone(),
            ))),
            (None, Some(keycloak)) => Ok(Box::new(KeycloakSyncer::new(
                &provider.name,
                keycloak.clone(),
                self.client.clone(),
            ))),
            (None, None) => Err(SyncerError::UnknownProvider(
                provider.name.clone(),
                "no provider type configured".to_string(),
            )),
            _ => Err(SyncerError::UnknownProvider(
                provider.name.clone(),
                "more than one provider type configured".to_string(),
            )),
        }
    }
}

/// The syncers of one GroupSync, in spec order
pub struct GroupSyncManager {
    pub syncers: Vec<Box<dyn GroupSyncer>>,
}

impl GroupSyncManager {
    /// Resolve every provider entry of the GroupSync into a syncer
    pub fn new(groupsync: &GroupSync, factory: &dyn SyncerFactory) -> Result<Self, SyncerError> {
        let syncers = groupsync
            .spec
            .providers
            .iter()
            .map(|provider| factory.build(groupsync, provider))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            groupsync = %groupsync.name_any(),
            providers = syncers.len(),
            "Resolved provider syncers"
        );

        Ok(Self { syncers })
    }

    /// Validate provider names and every provider's configuration
    ///
    /// Names must be non-empty and unique: they make up the ownership label.
    pub fn validate(&self) -> Result<(), SyncerError> {
        let mut seen = BTreeSet::new();
        for syncer in &self.syncers {
            let name = syncer.provider_name();
            if name.is_empty() {
                return Err(SyncerError::validation(name, "provider name cannot be empty"));
            }
            if !seen.insert(name) {
                return Err(SyncerError::validation(
                    name,
                    "provider names must be unique",
                ));
            }
            syncer.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[path = "syncer_test.rs"]
mod tests;
