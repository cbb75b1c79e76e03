//! Keycloak provider: groups of a realm, optionally including subgroups

use super::credentials::{read_secret, required};
use super::http::{anonymous_client, bearer_client, get_all_pages, host_of, join, PAGE_SIZE};
use super::{ExternalGroup, GroupSyncer, SyncerError, SYNC_SOURCE_HOST, SYNC_SOURCE_UID};
use crate::crd::groupsync::{KeycloakProvider, SyncScope, DEFAULT_KEYCLOAK_LOGIN_REALM};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

pub const USERNAME_KEY: &str = "username";
pub const PASSWORD_KEY: &str = "password";

/// Client used for the password grant against the login realm
const ADMIN_CLIENT_ID: &str = "admin-cli";

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct KeycloakGroup {
    pub id: String,
    pub name: String,
    #[serde(rename = "subGroups", default)]
    pub sub_groups: Vec<KeycloakGroup>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct KeycloakUser {
    pub username: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct KeycloakSyncer {
    name: String,
    provider: KeycloakProvider,
    client: kube::Client,
    http: Option<reqwest::Client>,
}

impl KeycloakSyncer {
    pub fn new(name: &str, provider: KeycloakProvider, client: kube::Client) -> Self {
        Self {
            name: name.to_string(),
            provider,
            client,
            http: None,
        }
    }

    fn login_realm(&self) -> &str {
        self.provider
            .login_realm
            .as_deref()
            .unwrap_or(DEFAULT_KEYCLOAK_LOGIN_REALM)
    }

    fn admin_url(&self, path: &str) -> String {
        join(
            &self.provider.url,
            &format!("admin/realms/{}/{}", self.provider.realm, path),
        )
    }

    async fn members(&self, http: &reqwest::Client, group_id: &str) -> Result<Vec<String>, SyncerError> {
        let users: Vec<KeycloakUser> = get_all_pages(http, |page| {
            self.admin_url(&format!(
                "groups/{}/members?first={}&max={}",
                group_id,
                page * PAGE_SIZE,
                PAGE_SIZE
            ))
        })
        .await?;
        Ok(users.into_iter().map(|u| u.username).collect())
    }
}

pub(crate) fn validate_keycloak(name: &str, provider: &KeycloakProvider) -> Result<(), SyncerError> {
    if provider.credentials_secret.name.is_empty() || provider.credentials_secret.namespace.is_empty()
    {
        return Err(SyncerError::validation(
            name,
            "credentialsSecret name and namespace must be provided",
        ));
    }
    if provider.url.is_empty() {
        return Err(SyncerError::validation(name, "url must be provided"));
    }
    if reqwest::Url::parse(&provider.url).is_err() {
        return Err(SyncerError::validation(
            name,
            format!("invalid url '{}'", provider.url),
        ));
    }
    if provider.realm.is_empty() {
        return Err(SyncerError::validation(name, "realm must be provided"));
    }
    Ok(())
}

/// Groups to synchronize for the given scope
///
/// With `Sub`, every nested subgroup becomes a group of its own, parents first.
pub(crate) fn flatten_groups(groups: &[KeycloakGroup], scope: &SyncScope) -> Vec<KeycloakGroup> {
    let mut out = Vec::new();
    for group in groups {
        out.push(group.clone());
        if *scope == SyncScope::Sub {
            out.extend(flatten_groups(&group.sub_groups, scope));
        }
    }
    out
}

/// Groups to fetch members for, after scope, allow-list and name uniqueness
///
/// Subgroups of different parents may share a name; the first one in
/// traversal order wins.
pub(crate) fn selected_groups(
    top_level: &[KeycloakGroup],
    scope: &SyncScope,
    allowed: &[String],
) -> Vec<KeycloakGroup> {
    let mut seen = BTreeSet::new();
    flatten_groups(top_level, scope)
        .into_iter()
        .filter(|g| allowed.is_empty() || allowed.contains(&g.name))
        .filter(|g| {
            let first = seen.insert(g.name.clone());
            if !first {
                warn!(group = %g.name, id = %g.id, "Duplicate Keycloak group name, keeping the first");
            }
            first
        })
        .collect()
}

#[async_trait]
impl GroupSyncer for KeycloakSyncer {
    fn provider_name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<(), SyncerError> {
        validate_keycloak(&self.name, &self.provider)
    }

    async fn bind(&mut self) -> Result<(), SyncerError> {
        let secret_ref = &self.provider.credentials_secret;
        let entries = read_secret(&self.client, secret_ref).await?;
        let username = required(&entries, USERNAME_KEY, secret_ref)?;
        let password = required(&entries, PASSWORD_KEY, secret_ref)?;
        let insecure = self.provider.insecure.unwrap_or(false);

        let token_url = join(
            &self.provider.url,
            &format!(
                "realms/{}/protocol/openid-connect/token",
                self.login_realm()
            ),
        );
        let response = anonymous_client(insecure)?
            .post(&token_url)
            .form(&[
                ("grant_type", "password"),
                ("client_id", ADMIN_CLIENT_ID),
                ("username", username),
                ("password", password),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SyncerError::Api(format!(
                "Keycloak login to realm '{}' failed with {}",
                self.login_realm(),
                response.status()
            )));
        }
        let token: TokenResponse = response.json().await?;

        info!(provider = %self.name, realm = %self.provider.realm, "Bound to Keycloak");
        self.http = Some(bearer_client(&token.access_token, insecure)?);
        Ok(())
    }

    async fn sync(&self) -> Result<Vec<ExternalGroup>, SyncerError> {
        let http = self
            .http
            .as_ref()
            .ok_or_else(|| SyncerError::NotBound(self.name.clone()))?;
        let host = host_of(&self.provider.url);
        let scope = self.provider.scope.clone().unwrap_or_default();

        let top_level: Vec<KeycloakGroup> = get_all_pages(http, |page| {
            self.admin_url(&format!(
                "groups?briefRepresentation=false&first={}&max={}",
                page * PAGE_SIZE,
                PAGE_SIZE
            ))
        })
        .await?;

        let mut groups = Vec::new();
        for group in selected_groups(&top_level, &scope, &self.provider.groups) {
            let users = self.members(http, &group.id).await?;
            debug!(provider = %self.name, group = %group.name, members = users.len(), "Fetched group members");
            groups.push(ExternalGroup {
                name: group.name,
                users,
                labels: None,
                annotations: Some(BTreeMap::from([
                    (SYNC_SOURCE_HOST.to_string(), host.clone()),
                    (SYNC_SOURCE_UID.to_string(), group.id),
                ])),
            });
        }

        Ok(groups)
    }
}
