use super::{add_finalizer, has_finalizer, is_deleting, remove_finalizer, UNREACHABLE_BACKOFF};
use crate::api::condition::{self, Condition, ConditionSeverity};
use crate::api::device::{
    ActualPropertyState, AdminState, DeviceStatus, OperatingState, DEVICE_FINALIZER, DEVICE_MANAGING_CONDITION,
    DEVICE_SYNCED_CONDITION,
};
use crate::api::{edge_name, Device};
use crate::edgex::{DeviceInterface, DevicePatch};
use crate::scheduler::{Action, Reconcile, ResourceIndex};
use crate::store::{ObjectStore, StoreError};
use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Delay before retrying a managed device whose status write conflicted.
pub const CONFLICT_BACKOFF: Duration = Duration::from_secs(2);
/// Where a Device stands relative to the edge platform. Checked in declaration
/// order; the first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevicePhase {
    /// Deletion timestamp set.
    Deleting,
    /// Not deleting, but our finalizer is not attached yet.
    Unfinalized,
    /// No confirmed edge identity.
    Unregistered,
    RegisteredUnmanaged,
    RegisteredManaged,
}

impl DevicePhase {
    pub fn of(dev: &Device) -> Self {
        if is_deleting(dev) {
            DevicePhase::Deleting
        } else if !has_finalizer(dev, DEVICE_FINALIZER) {
            DevicePhase::Unfinalized
        } else if !dev.is_synced() {
            DevicePhase::Unregistered
        } else if dev.spec.managed {
            DevicePhase::RegisteredManaged
        } else {
            DevicePhase::RegisteredUnmanaged
        }
    }

    fn conflict_action(self) -> Action {
        match self {
            DevicePhase::RegisteredManaged => Action::RequeueAfter(CONFLICT_BACKOFF),
            _ => Action::Requeue,
        }
    }
}

fn conditions(dev: &mut Device) -> &mut Vec<Condition> {
    &mut dev.status.get_or_insert_with(Default::default).conditions
}

pub struct DeviceReconciler<S, C> {
    store: S,
    edge: C,
    node_pool: String,
    retry_after: Duration,
}

impl<S, C> DeviceReconciler<S, C>
where
    S: ObjectStore<Device>,
    C: DeviceInterface,
{
    /// Only devices whose `spec.nodePool` equals `node_pool` are acted on.
    pub fn new(store: S, edge: C, node_pool: impl Into<String>) -> Self {
        DeviceReconciler {
            store,
            edge,
            node_pool: node_pool.into(),
            retry_after: UNREACHABLE_BACKOFF,
        }
    }

    /// Delay before registration is retried after the edge platform was
    /// unreachable.
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = retry_after;
        self
    }

    /// Remove the device from the edge platform, then release our finalizer.
    async fn delete(&self, dev: &Device) -> Result<Action> {
        if !has_finalizer(dev, DEVICE_FINALIZER) {
            return Ok(Action::Await);
        }
        let name = edge_name(dev);
        match self.edge.delete(&name).await {
            Ok(()) => info!(edge_name = %name, "Device deleted from edge platform"),
            Err(e) if e.is_not_found() => debug!(edge_name = %name, "Device already absent from edge platform"),
            Err(e) => return Err(e.into()),
        }
        remove_finalizer(&self.store, dev, DEVICE_FINALIZER).await?;
        Ok(Action::Await)
    }

    /// Adopt the edge identity of the device, creating it remotely when absent.
    /// An unreachable edge platform schedules a retry instead of failing.
    async fn register(&self, dev: &mut Device) -> Result<Action> {
        let name = edge_name(dev);
        let edge_id = match self.edge.get(&name).await {
            Ok(found) => {
                debug!(edge_name = %name, "Device already exists on edge platform");
                found.status.map(|s| s.edge_id).unwrap_or_default()
            }
            Err(e) if e.is_not_found() => match self.edge.create(dev).await {
                Ok(created) => {
                    let edge_id = created.status.map(|s| s.edge_id).unwrap_or_default();
                    info!(edge_name = %name, edge_id = %edge_id, "Device added to edge platform");
                    edge_id
                }
                Err(e) => {
                    condition::mark_false(
                        conditions(dev),
                        DEVICE_SYNCED_CONDITION,
                        "failed to create device on edge platform",
                        ConditionSeverity::Warning,
                        e.to_string(),
                    );
                    return Err(eyre!("fail to add device {} to edge platform: {}", name, e));
                }
            },
            Err(e) => {
                warn!(
                    edge_name = %name,
                    error = %e,
                    retry_after = ?self.retry_after,
                    "Fail to visit the edge platform"
                );
                condition::mark_false(
                    conditions(dev),
                    DEVICE_SYNCED_CONDITION,
                    "failed to visit the EdgeX core-metadata-service",
                    ConditionSeverity::Warning,
                    e.to_string(),
                );
                return Ok(Action::RequeueAfter(self.retry_after));
            }
        };
        let status = dev.status.get_or_insert_with(Default::default);
        status.edge_id = edge_id;
        status.synced = true;
        condition::mark_true(&mut status.conditions, DEVICE_SYNCED_CONDITION);
        Ok(Action::Await)
    }

    /// Push changed admin/operating state, then the desired property values
    /// when the device is up and unlocked.
    async fn push_updates(&self, dev: &mut Device) -> Result<()> {
        let mut status = dev.status.clone().unwrap_or_default();
        let patch = DevicePatch {
            name: edge_name(dev),
            admin_state: dev.spec.admin_state.filter(|s| Some(*s) != status.admin_state),
            operating_state: dev
                .spec
                .operating_state
                .filter(|s| Some(*s) != status.operating_state),
        };
        if patch.is_empty() {
            trace!(edge_name = %patch.name, "Admin and operating state unchanged");
        } else {
            if let Err(e) = self.edge.update(&patch).await {
                condition::mark_false(
                    conditions(dev),
                    DEVICE_MANAGING_CONDITION,
                    "failed to update AdminState or OperatingState of device on edge platform",
                    ConditionSeverity::Warning,
                    e.to_string(),
                );
                return Err(e.into());
            }
            status.admin_state = patch.admin_state.or(status.admin_state);
            status.operating_state = patch.operating_state.or(status.operating_state);
        }

        let mut failed = Vec::new();
        if status.operating_state == Some(OperatingState::Up)
            && status.admin_state == Some(AdminState::Unlocked)
        {
            let (next, f) = self.reconcile_properties(dev, status).await;
            status = next;
            failed = f;
        }
        if failed.is_empty() {
            condition::mark_true(&mut status.conditions, DEVICE_MANAGING_CONDITION);
        } else {
            condition::mark_false(
                &mut status.conditions,
                DEVICE_MANAGING_CONDITION,
                format!(
                    "the following device properties failed to reconcile: [{}]",
                    failed.join(" ")
                ),
                ConditionSeverity::Info,
                "",
            );
        }
        dev.status = Some(status);
        Ok(())
    }

    /// Drive every desired property with a value to the edge platform. Returns
    /// the updated status and the names of the properties that failed; one
    /// failing property never stops the others.
    pub async fn reconcile_properties(
        &self,
        dev: &Device,
        mut status: DeviceStatus,
    ) -> (DeviceStatus, Vec<String>) {
        let mut failed = Vec::new();
        for (key, desired) in &dev.spec.device_properties {
            if desired.desired_value.is_empty() {
                continue;
            }
            let property = if desired.name.is_empty() { key } else { &desired.name };
            let actual = match self.edge.get_property_state(property, dev).await {
                Ok(actual) => actual,
                Err(e) if e.is_not_found() => {
                    warn!(edge_name = %edge_name(dev), property = %property, "Property read command not found");
                    ActualPropertyState {
                        name: property.clone(),
                        ..Default::default()
                    }
                }
                Err(e) => {
                    error!(property = %property, error = %e, "Fail to get actual property value");
                    failed.push(property.clone());
                    continue;
                }
            };
            trace!(property = %property, actual = %actual, "Got actual property state");
            status.device_properties.insert(property.clone(), actual.clone());

            if actual.actual_value == desired.desired_value {
                continue;
            }
            debug!(
                property = %property,
                desired = %desired.desired_value,
                actual = %actual.actual_value,
                "Property differs from desired value"
            );
            match self
                .edge
                .update_property_state(property, dev, &desired.desired_value)
                .await
            {
                Ok(()) => {
                    status.device_properties.insert(
                        property.clone(),
                        ActualPropertyState {
                            name: property.clone(),
                            get_url: actual.get_url,
                            actual_value: desired.desired_value.clone(),
                        },
                    );
                }
                Err(e) => {
                    error!(property = %property, error = %e, "Fail to update property");
                    failed.push(property.clone());
                }
            }
        }
        (status, failed)
    }

    /// Summarize conditions and write the status back. Conflicts requeue the
    /// whole pass; the remote effects already applied are safe to repeat.
    async fn finish(&self, mut dev: Device, phase: DevicePhase, outcome: Result<Action>) -> Result<Action> {
        if !dev.spec.managed {
            condition::mark_false(
                conditions(&mut dev),
                DEVICE_MANAGING_CONDITION,
                "this device is not managed by openyurt",
                ConditionSeverity::Info,
                "",
            );
        }
        condition::set_summary(
            conditions(&mut dev),
            &[DEVICE_SYNCED_CONDITION, DEVICE_MANAGING_CONDITION],
        );
        match self.store.update_status(&dev).await {
            Ok(_) => outcome,
            Err(StoreError::Conflict(_)) => {
                debug!(phase = ?phase, "Device status changed concurrently, requeue");
                Ok(phase.conflict_action())
            }
            Err(StoreError::NotFound(_)) => Ok(Action::Await),
            Err(e) => {
                outcome?;
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl<S, C> Reconcile<Device> for DeviceReconciler<S, C>
where
    S: ObjectStore<Device>,
    C: DeviceInterface,
{
    #[tracing::instrument(skip(self), fields(device = %index.name))]
    async fn reconcile(&self, index: &ResourceIndex<Device>) -> Result<Action> {
        let mut dev = match self.store.get(index).await? {
            Some(dev) => dev,
            None => return Ok(Action::Await),
        };
        if dev.spec.node_pool != self.node_pool {
            trace!(node_pool = %dev.spec.node_pool, "Device belongs to another node pool");
            return Ok(Action::Await);
        }
        let phase = DevicePhase::of(&dev);
        debug!(phase = ?phase, "Reconciling device");
        let outcome = match phase {
            DevicePhase::Deleting => return self.delete(&dev).await,
            DevicePhase::Unfinalized => {
                add_finalizer(&self.store, &dev, DEVICE_FINALIZER).await?;
                return Ok(Action::Await);
            }
            DevicePhase::Unregistered => self.register(&mut dev).await,
            DevicePhase::RegisteredManaged => self.push_updates(&mut dev).await.map(|()| Action::Await),
            DevicePhase::RegisteredUnmanaged => Ok(Action::Await),
        };
        self.finish(dev, phase, outcome).await
    }
}
