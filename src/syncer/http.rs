//! Shared HTTP plumbing for REST-based providers

use super::SyncerError;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Upper bound for a single provider request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size requested from paginated endpoints
pub const PAGE_SIZE: usize = 100;

/// Build an HTTP client that sends a bearer token on every request
pub fn bearer_client(token: &str, insecure: bool) -> Result<reqwest::Client, SyncerError> {
    let mut headers = HeaderMap::new();
    let auth = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|_| SyncerError::Credentials("token contains invalid characters".to_string()))?;
    headers.insert(AUTHORIZATION, auth);
    headers.insert(USER_AGENT, HeaderValue::from_static("group-sync-operator"));

    Ok(reqwest::Client::builder()
        .default_headers(headers)
        .danger_accept_invalid_certs(insecure)
        .timeout(REQUEST_TIMEOUT)
        .build()?)
}

/// Client without credentials, used to obtain tokens
pub fn anonymous_client(insecure: bool) -> Result<reqwest::Client, SyncerError> {
    Ok(reqwest::Client::builder()
        .danger_accept_invalid_certs(insecure)
        .timeout(REQUEST_TIMEOUT)
        .build()?)
}

/// GET a URL and decode the JSON body, mapping non-2xx responses to `SyncerError::Api`
pub async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> Result<T, SyncerError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SyncerError::Api(format!(
            "GET {} returned {}: {}",
            url,
            status,
            body.trim()
        )));
    }
    Ok(response.json().await?)
}

/// Fetch every page of a list endpoint
///
/// `page_url` maps a zero-based page index to a URL. Fetching stops at the
/// first page shorter than `PAGE_SIZE`.
pub async fn get_all_pages<T, F>(client: &reqwest::Client, page_url: F) -> Result<Vec<T>, SyncerError>
where
    T: DeserializeOwned,
    F: Fn(usize) -> String,
{
    let mut items = Vec::new();
    for page in 0.. {
        let batch: Vec<T> = get_json(client, &page_url(page)).await?;
        let done = batch.len() < PAGE_SIZE;
        items.extend(batch);
        if done {
            break;
        }
    }
    Ok(items)
}

/// Join a base URL and a path with exactly one slash between them
pub fn join(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Host part of a URL, used for the sync-source annotation
pub fn host_of(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}
