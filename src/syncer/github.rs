//! GitHub provider: one group per team of an organization

use super::credentials::{read_secret, required};
use super::http::{bearer_client, get_all_pages, get_json, host_of, join, PAGE_SIZE};
use super::{ExternalGroup, GroupSyncer, SyncerError, SYNC_SOURCE_HOST, SYNC_SOURCE_UID};
use crate::crd::groupsync::{GitHubProvider, DEFAULT_GITHUB_URL};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Secret key holding the GitHub token
pub const TOKEN_KEY: &str = "token";

#[derive(Debug, Deserialize)]
pub(crate) struct Team {
    pub id: u64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Member {
    pub login: String,
}

#[derive(Debug, Deserialize)]
struct Organization {
    login: String,
}

pub struct GitHubSyncer {
    name: String,
    provider: GitHubProvider,
    client: kube::Client,
    http: Option<reqwest::Client>,
}

impl GitHubSyncer {
    pub fn new(name: &str, provider: GitHubProvider, client: kube::Client) -> Self {
        Self {
            name: name.to_string(),
            provider,
            client,
            http: None,
        }
    }

    fn base_url(&self) -> &str {
        self.provider.url.as_deref().unwrap_or(DEFAULT_GITHUB_URL)
    }

    fn http(&self) -> Result<&reqwest::Client, SyncerError> {
        self.http
            .as_ref()
            .ok_or_else(|| SyncerError::NotBound(self.name.clone()))
    }
}

pub(crate) fn validate_github(name: &str, provider: &GitHubProvider) -> Result<(), SyncerError> {
    if provider.credentials_secret.name.is_empty() || provider.credentials_secret.namespace.is_empty()
    {
        return Err(SyncerError::validation(
            name,
            "credentialsSecret name and namespace must be provided",
        ));
    }
    if provider.organization.is_empty() {
        return Err(SyncerError::validation(name, "organization must be provided"));
    }
    if let Some(url) = provider.url.as_deref() {
        if reqwest::Url::parse(url).is_err() {
            return Err(SyncerError::validation(name, format!("invalid url '{}'", url)));
        }
    }
    Ok(())
}

/// Whether a team was selected by the `teams` allow-list (slug or display name)
pub(crate) fn team_selected(team: &Team, allowed: &[String]) -> bool {
    allowed.is_empty() || allowed.iter().any(|t| t == &team.slug || t == &team.name)
}

pub(crate) fn team_to_group(team: &Team, members: Vec<Member>, host: &str) -> ExternalGroup {
    ExternalGroup {
        name: team.name.clone(),
        users: members.into_iter().map(|m| m.login).collect(),
        labels: None,
        annotations: Some(BTreeMap::from([
            (SYNC_SOURCE_HOST.to_string(), host.to_string()),
            (SYNC_SOURCE_UID.to_string(), team.id.to_string()),
        ])),
    }
}

#[async_trait]
impl GroupSyncer for GitHubSyncer {
    fn provider_name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<(), SyncerError> {
        validate_github(&self.name, &self.provider)
    }

    async fn bind(&mut self) -> Result<(), SyncerError> {
        let secret_ref = &self.provider.credentials_secret;
        let entries = read_secret(&self.client, secret_ref).await?;
        let token = required(&entries, TOKEN_KEY, secret_ref)?;

        let http = bearer_client(token, self.provider.insecure.unwrap_or(false))?;

        // Confirms both the token and the organization
        let org: Organization = get_json(
            &http,
            &join(
                self.base_url(),
                &format!("orgs/{}", self.provider.organization),
            ),
        )
        .await?;

        info!(provider = %self.name, organization = %org.login, "Bound to GitHub");
        self.http = Some(http);
        Ok(())
    }

    async fn sync(&self) -> Result<Vec<ExternalGroup>, SyncerError> {
        let http = self.http()?;
        let base = self.base_url();
        let org = &self.provider.organization;
        let host = host_of(base);

        let teams: Vec<Team> = get_all_pages(http, |page| {
            join(
                base,
                &format!("orgs/{}/teams?per_page={}&page={}", org, PAGE_SIZE, page + 1),
            )
        })
        .await?;

        let mut groups = Vec::new();
        for team in teams
            .iter()
            .filter(|t| team_selected(t, &self.provider.teams))
        {
            let members: Vec<Member> = get_all_pages(http, |page| {
                join(
                    base,
                    &format!(
                        "orgs/{}/teams/{}/members?per_page={}&page={}",
                        org,
                        team.slug,
                        PAGE_SIZE,
                        page + 1
                    ),
                )
            })
            .await?;
            debug!(provider = %self.name, team = %team.slug, members = members.len(), "Fetched team members");
            groups.push(team_to_group(team, members, &host));
        }

        Ok(dedup_by_name(groups))
    }
}

/// GitHub team names are unique per organization, but keep the first on collision
fn dedup_by_name(groups: Vec<ExternalGroup>) -> Vec<ExternalGroup> {
    let mut seen = std::collections::BTreeSet::new();
    groups
        .into_iter()
        .filter(|g| seen.insert(g.name.clone()))
        .collect()
}
