//! Provider credentials stored in Kubernetes Secrets

use super::SyncerError;
use crate::crd::groupsync::ObjectRef;
use k8s_openapi::api::core::v1::Secret;
use kube::Api;
use std::collections::BTreeMap;

/// Read a Secret and return its entries as UTF-8 strings
///
/// `stringData` entries are included too; `data` wins on duplicate keys.
pub async fn read_secret(
    client: &kube::Client,
    secret_ref: &ObjectRef,
) -> Result<BTreeMap<String, String>, SyncerError> {
    let api: Api<Secret> = Api::namespaced(client.clone(), &secret_ref.namespace);
    let secret = api.get_opt(&secret_ref.name).await?.ok_or_else(|| {
        SyncerError::Credentials(format!(
            "secret {}/{} not found",
            secret_ref.namespace, secret_ref.name
        ))
    })?;
    secret_entries(&secret)
}

pub(crate) fn secret_entries(secret: &Secret) -> Result<BTreeMap<String, String>, SyncerError> {
    let mut entries = secret.string_data.clone().unwrap_or_default();
    for (key, value) in secret.data.iter().flatten() {
        let text = String::from_utf8(value.0.clone()).map_err(|_| {
            SyncerError::Credentials(format!("secret key '{}' is not valid UTF-8", key))
        })?;
        entries.insert(key.clone(), text);
    }
    Ok(entries)
}

/// Look up a required key
pub fn required<'a>(
    entries: &'a BTreeMap<String, String>,
    key: &str,
    secret_ref: &ObjectRef,
) -> Result<&'a str, SyncerError> {
    entries
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            SyncerError::Credentials(format!(
                "secret {}/{} is missing key '{}'",
                secret_ref.namespace, secret_ref.name, key
            ))
        })
}
