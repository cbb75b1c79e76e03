//! Persistence seams for the reconciler
//!
//! The reconciler reads and writes GroupSync resources and OpenShift Groups only
//! through the `GroupSyncStore` and `GroupStore` traits. Production code uses the
//! kube-backed implementations; tests use the in-memory ones.

use crate::crd::groupsync::GroupSync;
use async_trait::async_trait;
use kube::api::{Api, ObjectMeta, Patch, PatchParams, PostParams};
use kube::core::{DynamicObject, GroupVersionKind};
use kube::discovery::ApiResource;
use kube::ResourceExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Conflict writing {0}: object has been modified")]
    Conflict(String),

    #[error("Failed to serialize object: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// OpenShift Group (user.openshift.io/v1)
///
/// Members live in a top-level `users` field rather than under `spec`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Group {
    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub users: Vec<String>,
}

impl Group {
    pub fn new(name: &str) -> Self {
        Group {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            users: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }
}

/// API resource description for OpenShift Groups
pub fn group_api_resource() -> ApiResource {
    ApiResource::from_gvk_with_plural(
        &GroupVersionKind::gvk("user.openshift.io", "v1", "Group"),
        "groups",
    )
}

/// Access to GroupSync resources
#[async_trait]
pub trait GroupSyncStore: Send + Sync {
    /// Fetch a GroupSync, `None` if it does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<GroupSync>, StoreError>;

    /// Replace the whole resource (used to persist spec defaults)
    async fn replace(&self, groupsync: &GroupSync) -> Result<GroupSync, StoreError>;

    /// Persist the status subresource
    async fn update_status(&self, groupsync: &GroupSync) -> Result<(), StoreError>;
}

/// Access to cluster-scoped OpenShift Groups
#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Fetch a Group by name, `None` if it does not exist
    async fn get(&self, name: &str) -> Result<Option<Group>, StoreError>;

    async fn create(&self, group: &Group) -> Result<(), StoreError>;

    /// Replace an existing Group; the resourceVersion it carries is checked
    async fn replace(&self, group: &Group) -> Result<(), StoreError>;
}

/// GroupSync store backed by the Kubernetes API
pub struct KubeGroupSyncStore {
    client: kube::Client,
}

impl KubeGroupSyncStore {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl GroupSyncStore for KubeGroupSyncStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<GroupSync>, StoreError> {
        let api: Api<GroupSync> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn replace(&self, groupsync: &GroupSync) -> Result<GroupSync, StoreError> {
        let namespace = groupsync.namespace().unwrap_or_default();
        let api: Api<GroupSync> = Api::namespaced(self.client.clone(), &namespace);
        Ok(api
            .replace(&groupsync.name_any(), &PostParams::default(), groupsync)
            .await?)
    }

    async fn update_status(&self, groupsync: &GroupSync) -> Result<(), StoreError> {
        let namespace = groupsync.namespace().unwrap_or_default();
        let api: Api<GroupSync> = Api::namespaced(self.client.clone(), &namespace);
        api.patch_status(
            &groupsync.name_any(),
            &PatchParams::default(),
            &Patch::Merge(&serde_json::json!({
                "status": groupsync.status
            })),
        )
        .await?;
        Ok(())
    }
}

/// Group store backed by the Kubernetes API
///
/// `Group` is not part of k8s-openapi, so objects go through `DynamicObject`.
pub struct KubeGroupStore {
    api: Api<DynamicObject>,
    resource: ApiResource,
}

impl KubeGroupStore {
    pub fn new(client: kube::Client) -> Self {
        let resource = group_api_resource();
        Self {
            api: Api::all_with(client, &resource),
            resource,
        }
    }

    fn to_dynamic(&self, group: &Group) -> DynamicObject {
        to_dynamic(group, &self.resource)
    }
}

/// Members go next to `metadata` at the top level of the object
fn to_dynamic(group: &Group, resource: &ApiResource) -> DynamicObject {
    let mut obj = DynamicObject::new(group.name(), resource).data(serde_json::json!({
        "users": group.users
    }));
    obj.metadata = group.metadata.clone();
    obj
}

fn from_dynamic(obj: DynamicObject) -> Result<Group, StoreError> {
    let users = match obj.data.get("users") {
        Some(value) if !value.is_null() => serde_json::from_value(value.clone())?,
        _ => Vec::new(),
    };
    Ok(Group {
        metadata: obj.metadata,
        users,
    })
}

#[async_trait]
impl GroupStore for KubeGroupStore {
    async fn get(&self, name: &str) -> Result<Option<Group>, StoreError> {
        self.api.get_opt(name).await?.map(from_dynamic).transpose()
    }

    async fn create(&self, group: &Group) -> Result<(), StoreError> {
        self.api
            .create(&PostParams::default(), &self.to_dynamic(group))
            .await?;
        Ok(())
    }

    async fn replace(&self, group: &Group) -> Result<(), StoreError> {
        match self
            .api
            .replace(group.name(), &PostParams::default(), &self.to_dynamic(group))
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(err)) if err.code == 409 => {
                Err(StoreError::Conflict(group.name().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
