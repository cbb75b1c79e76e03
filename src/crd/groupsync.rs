use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition type written by the controller on every reconcile
pub const CONDITION_TYPE: &str = "groupsync";

/// Default GitHub API endpoint
pub const DEFAULT_GITHUB_URL: &str = "https://api.github.com/";

/// Default realm used to obtain a Keycloak admin token
pub const DEFAULT_KEYCLOAK_LOGIN_REALM: &str = "master";

/// GroupSync keeps OpenShift Groups synchronized with external identity providers
///
/// Providers are processed in the order they are listed. A Group owned by one
/// provider is never modified by another.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "redhatcop.redhat.io",
    version = "v1alpha1",
    kind = "GroupSync",
    namespaced,
    status = "GroupSyncStatus",
    shortname = "gs",
    printcolumn = r#"{"name":"Schedule", "type":"string", "jsonPath":".spec.schedule"}"#,
    printcolumn = r#"{"name":"Last Sync", "type":"string", "jsonPath":".status.lastSyncSuccessTime"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
pub struct GroupSyncSpec {
    /// Providers to synchronize groups from, in priority order
    #[serde(default)]
    pub providers: Vec<Provider>,

    /// Cron expression for recurring synchronization (e.g. "0 * * * *")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
}

impl GroupSyncSpec {
    /// Fill in provider defaults
    ///
    /// Returns true if any provider configuration changed.
    pub fn set_defaults(&mut self) -> bool {
        // Every provider must be visited, so no short-circuiting `any`
        self.providers
            .iter_mut()
            .fold(false, |changed, provider| provider.set_defaults() || changed)
    }

    /// Schedule string, treating blank as absent
    pub fn schedule(&self) -> Option<&str> {
        self.schedule
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// A single identity provider entry
///
/// Exactly one of the provider types must be set.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct Provider {
    /// Name of the provider, part of the ownership label of every Group it manages
    pub name: String,

    /// GitHub organization teams
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<GitHubProvider>,

    /// Keycloak realm groups
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keycloak: Option<KeycloakProvider>,
}

impl Provider {
    pub fn set_defaults(&mut self) -> bool {
        let mut changed = false;
        if let Some(github) = self.github.as_mut() {
            changed |= github.set_defaults();
        }
        if let Some(keycloak) = self.keycloak.as_mut() {
            changed |= keycloak.set_defaults();
        }
        changed
    }
}

/// Reference to a Secret holding provider credentials
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct ObjectRef {
    pub name: String,
    pub namespace: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct GitHubProvider {
    /// Secret containing a `token` key
    #[serde(rename = "credentialsSecret")]
    pub credentials_secret: ObjectRef,

    /// Organization whose teams are synchronized
    pub organization: String,

    /// Only synchronize these teams (by slug or name)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub teams: Vec<String>,

    /// Base URL of the GitHub API
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Skip TLS verification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,
}

impl GitHubProvider {
    pub fn set_defaults(&mut self) -> bool {
        if self.url.as_deref().map_or(true, str::is_empty) {
            self.url = Some(DEFAULT_GITHUB_URL.to_string());
            return true;
        }
        false
    }
}

/// Keycloak group membership scope
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SyncScope {
    /// Only top-level groups
    One,
    /// Top-level groups and, as their own groups, all subgroups
    #[default]
    Sub,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct KeycloakProvider {
    /// Secret containing `username` and `password` keys
    #[serde(rename = "credentialsSecret")]
    pub credentials_secret: ObjectRef,

    /// Base URL of the Keycloak server
    pub url: String,

    /// Realm whose groups are synchronized
    pub realm: String,

    /// Realm the credentials authenticate against
    #[serde(rename = "loginRealm", skip_serializing_if = "Option::is_none")]
    pub login_realm: Option<String>,

    /// Only synchronize these groups
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<SyncScope>,

    /// Skip TLS verification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,
}

impl KeycloakProvider {
    pub fn set_defaults(&mut self) -> bool {
        let mut changed = false;
        if self.login_realm.as_deref().map_or(true, str::is_empty) {
            self.login_realm = Some(DEFAULT_KEYCLOAK_LOGIN_REALM.to_string());
            changed = true;
        }
        if self.scope.is_none() {
            self.scope = Some(SyncScope::Sub);
            changed = true;
        }
        changed
    }
}

/// Status of the GroupSync
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct GroupSyncStatus {
    /// Time of the last fully successful synchronization (RFC3339)
    #[serde(
        rename = "lastSyncSuccessTime",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_sync_success_time: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<GroupSyncCondition>,
}

impl GroupSyncStatus {
    /// Insert or replace the condition with the same type
    ///
    /// An existing condition keeps its position. Its transition time is kept
    /// when the status value is unchanged.
    pub fn set_condition(&mut self, mut condition: GroupSyncCondition) {
        match self
            .conditions
            .iter_mut()
            .find(|c| c.type_ == condition.type_)
        {
            Some(existing) => {
                if existing.status == condition.status {
                    condition.last_transition_time = existing.last_transition_time.take();
                }
                *existing = condition;
            }
            None => self.conditions.push(condition),
        }
    }

    pub fn condition(&self, type_: &str) -> Option<&GroupSyncCondition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct GroupSyncCondition {
    #[serde(rename = "type")]
    pub type_: String,

    /// "True", "False" or "Unknown"
    pub status: String,

    pub reason: String,

    pub message: String,

    #[serde(
        rename = "lastTransitionTime",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_transition_time: Option<String>,
}
