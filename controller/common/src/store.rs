//! Typed access to objects in the Kubernetes API server.

use crate::scheduler::ResourceIndex;
use async_trait::async_trait;
use kube::api::{Patch, PatchParams, PostParams};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// Field manager used for every write made by the controller.
pub const MANAGER: &str = "yurt-device-controller";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The object changed since it was read.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Kube(kube::Error),
    #[error("failed to serialize object: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<kube::Error> for StoreError {
    fn from(e: kube::Error) -> Self {
        match e {
            kube::Error::Api(ae) if ae.code == 409 => StoreError::Conflict(ae.message),
            kube::Error::Api(ae) if ae.code == 404 => StoreError::NotFound(ae.message),
            e => StoreError::Kube(e),
        }
    }
}

#[async_trait]
pub trait ObjectStore<K>: Send + Sync
where
    K: Send + Sync + 'static,
{
    /// `None` when the object no longer exists.
    async fn get(&self, index: &ResourceIndex<K>) -> Result<Option<K>, StoreError>;
    /// Replace `metadata.finalizers` of `obj`, returning the updated object.
    async fn set_finalizers(&self, obj: &K, finalizers: Vec<String>) -> Result<K, StoreError>;
    /// Write the status of `obj`. Fails with [`StoreError::Conflict`] when
    /// `obj` carries a stale resourceVersion.
    async fn update_status(&self, obj: &K) -> Result<K, StoreError>;
}

#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        KubeStore { client }
    }

    fn api<K>(&self, namespace: Option<&str>) -> Api<K>
    where
        K: Resource,
        K::DynamicType: Default,
    {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::default_namespaced(self.client.clone()),
        }
    }
}

fn name_of<K: Resource>(obj: &K) -> &str {
    obj.meta().name.as_deref().unwrap_or_default()
}

#[async_trait]
impl<K> ObjectStore<K> for KubeStore
where
    K: Resource
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
    K::DynamicType: Default,
{
    #[tracing::instrument(skip(self))]
    async fn get(&self, index: &ResourceIndex<K>) -> Result<Option<K>, StoreError> {
        match self.api::<K>(Some(&index.namespace)).get(&index.name).await {
            Ok(obj) => Ok(Some(obj)),
            Err(e) => match StoreError::from(e) {
                StoreError::NotFound(_) => Ok(None),
                e => Err(e),
            },
        }
    }

    #[tracing::instrument(skip(self, obj), fields(name = name_of(obj)))]
    async fn set_finalizers(&self, obj: &K, finalizers: Vec<String>) -> Result<K, StoreError> {
        let api = self.api::<K>(obj.meta().namespace.as_deref());
        let patch = serde_json::json!({ "metadata": { "finalizers": finalizers } });
        let pp = PatchParams::apply(MANAGER);
        Ok(api.patch(name_of(obj), &pp, &Patch::Merge(&patch)).await?)
    }

    #[tracing::instrument(skip(self, obj), fields(name = name_of(obj)))]
    async fn update_status(&self, obj: &K) -> Result<K, StoreError> {
        let api = self.api::<K>(obj.meta().namespace.as_deref());
        let data = serde_json::to_vec(obj)?;
        Ok(api
            .replace_status(name_of(obj), &PostParams::default(), data)
            .await?)
    }
}
