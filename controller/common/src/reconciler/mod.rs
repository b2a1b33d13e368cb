//! Reconcilers driving Devices and DeviceProfiles towards the edge platform.
//!
//! Each reconciler classifies the object into a phase first and then performs
//! the single step that phase calls for. Every remote call is safe to repeat:
//! registration reads before it creates, deletion treats a missing remote
//! object as done, and updates are last-value-wins.

pub mod device;
pub mod deviceprofile;

#[cfg(test)]
pub(crate) mod fake;

pub use device::{DevicePhase, DeviceReconciler};
pub use deviceprofile::{DeviceProfilePhase, DeviceProfileReconciler};

use crate::store::{ObjectStore, StoreError};
use kube::Resource;
use std::time::Duration;

/// Default delay before registration is retried when the edge platform could
/// not be reached.
pub const UNREACHABLE_BACKOFF: Duration = Duration::from_secs(10);

pub(crate) fn has_finalizer<K: Resource>(obj: &K, finalizer: &str) -> bool {
    obj.meta()
        .finalizers
        .as_ref()
        .map(|f| f.iter().any(|x| x == finalizer))
        .unwrap_or(false)
}

pub(crate) fn is_deleting<K: Resource>(obj: &K) -> bool {
    obj.meta().deletion_timestamp.is_some()
}

/// Append `finalizer` to the object's finalizers.
pub(crate) async fn add_finalizer<K, S>(store: &S, obj: &K, finalizer: &str) -> Result<K, StoreError>
where
    K: Resource + Send + Sync + 'static,
    S: ObjectStore<K>,
{
    let mut finalizers = obj.meta().finalizers.clone().unwrap_or_default();
    finalizers.push(finalizer.to_owned());
    store.set_finalizers(obj, finalizers).await
}

/// Remove `finalizer`, letting the API server finish the deletion. An object
/// that is already gone counts as done.
pub(crate) async fn remove_finalizer<K, S>(store: &S, obj: &K, finalizer: &str) -> Result<(), StoreError>
where
    K: Resource + Send + Sync + 'static,
    S: ObjectStore<K>,
{
    let finalizers = obj
        .meta()
        .finalizers
        .iter()
        .flatten()
        .filter(|f| *f != finalizer)
        .cloned()
        .collect();
    match store.set_finalizers(obj, finalizers).await {
        Ok(_) | Err(StoreError::NotFound(_)) => Ok(()),
        Err(e) => Err(e),
    }
}
