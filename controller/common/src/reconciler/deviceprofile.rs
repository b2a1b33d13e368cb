use super::{add_finalizer, has_finalizer, is_deleting, remove_finalizer, UNREACHABLE_BACKOFF};
use crate::api::deviceprofile::DEVICE_PROFILE_FINALIZER;
use crate::api::{edge_name, DeviceProfile};
use crate::edgex::DeviceProfileInterface;
use crate::scheduler::{Action, Reconcile, ResourceIndex};
use crate::store::{ObjectStore, StoreError};
use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceProfilePhase {
    Deleting,
    Unfinalized,
    Unregistered,
    /// Resting state. Profiles are not updated on the edge platform once
    /// registered.
    Registered,
}

impl DeviceProfilePhase {
    pub fn of(dp: &DeviceProfile) -> Self {
        if is_deleting(dp) {
            DeviceProfilePhase::Deleting
        } else if !has_finalizer(dp, DEVICE_PROFILE_FINALIZER) {
            DeviceProfilePhase::Unfinalized
        } else if !dp.is_synced() {
            DeviceProfilePhase::Unregistered
        } else {
            DeviceProfilePhase::Registered
        }
    }
}

pub struct DeviceProfileReconciler<S, C> {
    store: S,
    edge: C,
    node_pool: String,
    retry_after: Duration,
}

impl<S, C> DeviceProfileReconciler<S, C>
where
    S: ObjectStore<DeviceProfile>,
    C: DeviceProfileInterface,
{
    pub fn new(store: S, edge: C, node_pool: impl Into<String>) -> Self {
        DeviceProfileReconciler {
            store,
            edge,
            node_pool: node_pool.into(),
            retry_after: UNREACHABLE_BACKOFF,
        }
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = retry_after;
        self
    }

    async fn delete(&self, dp: &DeviceProfile) -> Result<Action> {
        if !has_finalizer(dp, DEVICE_PROFILE_FINALIZER) {
            return Ok(Action::Await);
        }
        let name = edge_name(dp);
        match self.edge.delete(&name).await {
            Ok(()) => info!(edge_name = %name, "DeviceProfile deleted from edge platform"),
            Err(e) if e.is_not_found() => debug!(edge_name = %name, "DeviceProfile already absent from edge platform"),
            Err(e) => return Err(e.into()),
        }
        remove_finalizer(&self.store, dp, DEVICE_PROFILE_FINALIZER).await?;
        Ok(Action::Await)
    }

    async fn register(&self, mut dp: DeviceProfile) -> Result<Action> {
        let name = edge_name(&dp);
        let edge_id = match self.edge.get(&name).await {
            Ok(found) => {
                debug!(edge_name = %name, "DeviceProfile already exists on edge platform");
                found.status.map(|s| s.edge_id).unwrap_or_default()
            }
            Err(e) if e.is_not_found() => {
                let created = self
                    .edge
                    .create(&dp)
                    .await
                    .map_err(|e| eyre!("failed to add deviceProfile to edge platform: {}", e))?;
                let edge_id = created.status.map(|s| s.edge_id).unwrap_or_default();
                info!(edge_name = %name, edge_id = %edge_id, "DeviceProfile added to edge platform");
                edge_id
            }
            Err(e) => {
                warn!(
                    edge_name = %name,
                    error = %e,
                    retry_after = ?self.retry_after,
                    "Fail to visit the edge platform"
                );
                return Ok(Action::RequeueAfter(self.retry_after));
            }
        };
        let status = dp.status.get_or_insert_with(Default::default);
        status.edge_id = edge_id;
        status.synced = true;
        match self.store.update_status(&dp).await {
            Ok(_) | Err(StoreError::NotFound(_)) => Ok(Action::Await),
            Err(StoreError::Conflict(_)) => {
                debug!("DeviceProfile status changed concurrently, requeue");
                Ok(Action::Requeue)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl<S, C> Reconcile<DeviceProfile> for DeviceProfileReconciler<S, C>
where
    S: ObjectStore<DeviceProfile>,
    C: DeviceProfileInterface,
{
    #[tracing::instrument(skip(self), fields(deviceprofile = %index.name))]
    async fn reconcile(&self, index: &ResourceIndex<DeviceProfile>) -> Result<Action> {
        let dp = match self.store.get(index).await? {
            Some(dp) => dp,
            None => return Ok(Action::Await),
        };
        if dp.spec.node_pool != self.node_pool {
            trace!(node_pool = %dp.spec.node_pool, "DeviceProfile belongs to another node pool");
            return Ok(Action::Await);
        }
        let phase = DeviceProfilePhase::of(&dp);
        debug!(phase = ?phase, "Reconciling deviceprofile");
        match phase {
            DeviceProfilePhase::Deleting => self.delete(&dp).await,
            DeviceProfilePhase::Unfinalized => {
                add_finalizer(&self.store, &dp, DEVICE_PROFILE_FINALIZER).await?;
                Ok(Action::Await)
            }
            DeviceProfilePhase::Unregistered => self.register(dp).await,
            DeviceProfilePhase::Registered => {
                debug!("DeviceProfile already registered, updates are not propagated");
                Ok(Action::Await)
            }
        }
    }
}
