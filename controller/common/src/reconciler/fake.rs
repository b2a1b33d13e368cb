//! In-memory stand-ins for the API server and the edge platform.

use crate::api::device::{ActualPropertyState, DeviceStatus};
use crate::api::deviceprofile::DeviceProfileStatus;
use crate::api::{edge_name, Device, DeviceProfile};
use crate::edgex::{DeviceInterface, DevicePatch, DeviceProfileInterface, EdgeError};
use crate::scheduler::ResourceIndex;
use crate::store::{ObjectStore, StoreError};
use async_trait::async_trait;
use kube::Resource;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

struct StoreState<K> {
    objects: HashMap<String, K>,
    writes: Vec<String>,
    version: u64,
    conflicts: usize,
}

/// Object store keeping one namespace in memory. Every write bumps the
/// resourceVersion; status writes with a stale version conflict.
#[derive(Clone)]
pub(crate) struct FakeStore<K> {
    state: Arc<Mutex<StoreState<K>>>,
}

impl<K: Resource + Clone> FakeStore<K> {
    pub(crate) fn new() -> Self {
        FakeStore {
            state: Arc::new(Mutex::new(StoreState {
                objects: HashMap::new(),
                writes: Vec::new(),
                version: 0,
                conflicts: 0,
            })),
        }
    }

    pub(crate) fn insert(&self, mut obj: K) -> ResourceIndex<K> {
        let mut state = self.state.lock().unwrap();
        state.version += 1;
        obj.meta_mut().resource_version = Some(state.version.to_string());
        obj.meta_mut().namespace.get_or_insert_with(|| "default".to_owned());
        let idx = ResourceIndex::from(&obj);
        state.objects.insert(idx.name.clone(), obj);
        idx
    }

    pub(crate) fn object(&self, name: &str) -> Option<K> {
        self.state.lock().unwrap().objects.get(name).cloned()
    }

    /// Simulate a concurrent writer: the next `n` status writes find a newer
    /// resourceVersion than the one they carry.
    pub(crate) fn conflict_next(&self, n: usize) {
        self.state.lock().unwrap().conflicts = n;
    }

    pub(crate) fn writes(&self) -> Vec<String> {
        self.state.lock().unwrap().writes.clone()
    }
}

fn name_of<K: Resource>(obj: &K) -> String {
    obj.meta().name.clone().unwrap_or_default()
}

#[async_trait]
impl<K> ObjectStore<K> for FakeStore<K>
where
    K: Resource + Clone + Send + Sync + 'static,
{
    async fn get(&self, index: &ResourceIndex<K>) -> Result<Option<K>, StoreError> {
        Ok(self.object(&index.name))
    }

    async fn set_finalizers(&self, obj: &K, finalizers: Vec<String>) -> Result<K, StoreError> {
        let mut state = self.state.lock().unwrap();
        let name = name_of(obj);
        state.writes.push(format!("finalizers {} {:?}", name, finalizers));
        state.version += 1;
        let version = state.version.to_string();
        let stored = state
            .objects
            .get_mut(&name)
            .ok_or_else(|| StoreError::NotFound(name.clone()))?;
        stored.meta_mut().finalizers = Some(finalizers);
        stored.meta_mut().resource_version = Some(version);
        Ok(stored.clone())
    }

    async fn update_status(&self, obj: &K) -> Result<K, StoreError> {
        let mut state = self.state.lock().unwrap();
        let name = name_of(obj);
        state.writes.push(format!("status {}", name));
        let current = state
            .objects
            .get(&name)
            .ok_or_else(|| StoreError::NotFound(name.clone()))?;
        if current.meta().resource_version != obj.meta().resource_version || state.conflicts > 0 {
            state.conflicts = state.conflicts.saturating_sub(1);
            return Err(StoreError::Conflict(name));
        }
        state.version += 1;
        let mut updated = obj.clone();
        updated.meta_mut().resource_version = Some(state.version.to_string());
        state.objects.insert(name, updated.clone());
        Ok(updated)
    }
}

#[derive(Default)]
struct EdgeState {
    devices: HashMap<String, String>,
    profiles: HashMap<String, String>,
    properties: HashMap<String, String>,
    failing_writes: HashSet<String>,
    unreadable: HashSet<String>,
    unreachable: bool,
    reject_create: bool,
    calls: Vec<String>,
    next_id: u32,
}

/// Edge platform keeping devices, profiles and property values in memory and
/// recording every call made to it.
#[derive(Clone, Default)]
pub(crate) struct FakeEdge {
    state: Arc<Mutex<EdgeState>>,
}

impl FakeEdge {
    pub(crate) fn with_device(self, name: &str, id: &str) -> Self {
        self.state.lock().unwrap().devices.insert(name.to_owned(), id.to_owned());
        self
    }

    pub(crate) fn with_profile(self, name: &str, id: &str) -> Self {
        self.state.lock().unwrap().profiles.insert(name.to_owned(), id.to_owned());
        self
    }

    pub(crate) fn with_property(self, name: &str, value: &str) -> Self {
        self.state.lock().unwrap().properties.insert(name.to_owned(), value.to_owned());
        self
    }

    pub(crate) fn failing_write(self, property: &str) -> Self {
        self.state.lock().unwrap().failing_writes.insert(property.to_owned());
        self
    }

    pub(crate) fn unreadable(self, property: &str) -> Self {
        self.state.lock().unwrap().unreadable.insert(property.to_owned());
        self
    }

    pub(crate) fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unwrap().unreachable = unreachable;
    }

    pub(crate) fn set_reject_create(&self, reject: bool) {
        self.state.lock().unwrap().reject_create = reject;
    }

    pub(crate) fn has_device(&self, name: &str) -> bool {
        self.state.lock().unwrap().devices.contains_key(name)
    }

    pub(crate) fn has_profile(&self, name: &str) -> bool {
        self.state.lock().unwrap().profiles.contains_key(name)
    }

    pub(crate) fn property(&self, name: &str) -> Option<String> {
        self.state.lock().unwrap().properties.get(name).cloned()
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn call(&self, call: String) -> Result<std::sync::MutexGuard<'_, EdgeState>, EdgeError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.unreachable {
            return Err(EdgeError::Status {
                code: 503,
                message: "service unavailable".to_owned(),
            });
        }
        Ok(state)
    }
}

fn unavailable() -> EdgeError {
    EdgeError::Status {
        code: 500,
        message: "internal error".to_owned(),
    }
}

#[async_trait]
impl DeviceInterface for FakeEdge {
    async fn get(&self, name: &str) -> Result<Device, EdgeError> {
        let state = self.call(format!("get device {}", name))?;
        let id = state
            .devices
            .get(name)
            .ok_or_else(|| EdgeError::NotFound(name.to_owned()))?;
        let mut dev = Device::new(name, Default::default());
        dev.status = Some(DeviceStatus {
            edge_id: id.clone(),
            synced: true,
            ..Default::default()
        });
        Ok(dev)
    }

    async fn create(&self, device: &Device) -> Result<Device, EdgeError> {
        let name = edge_name(device);
        let mut state = self.call(format!("create device {}", name))?;
        if state.reject_create {
            return Err(unavailable());
        }
        state.next_id += 1;
        let id = format!("edge-{}", state.next_id);
        state.devices.insert(name, id.clone());
        let mut created = device.clone();
        let mut status = created.status.take().unwrap_or_default();
        status.edge_id = id;
        status.synced = true;
        created.status = Some(status);
        Ok(created)
    }

    async fn update(&self, patch: &DevicePatch) -> Result<(), EdgeError> {
        self.call(format!(
            "update device {} admin={:?} operating={:?}",
            patch.name, patch.admin_state, patch.operating_state
        ))?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), EdgeError> {
        let mut state = self.call(format!("delete device {}", name))?;
        state
            .devices
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| EdgeError::NotFound(name.to_owned()))
    }

    async fn get_property_state(
        &self,
        property: &str,
        device: &Device,
    ) -> Result<ActualPropertyState, EdgeError> {
        let state = self.call(format!("get property {} {}", edge_name(device), property))?;
        if state.unreadable.contains(property) {
            return Err(EdgeError::NotFound(property.to_owned()));
        }
        Ok(ActualPropertyState {
            name: property.to_owned(),
            get_url: format!("http://command/{}/{}", edge_name(device), property),
            actual_value: state.properties.get(property).cloned().unwrap_or_default(),
        })
    }

    async fn update_property_state(
        &self,
        property: &str,
        device: &Device,
        value: &str,
    ) -> Result<(), EdgeError> {
        let mut state = self.call(format!(
            "put property {} {}={}",
            edge_name(device),
            property,
            value
        ))?;
        if state.failing_writes.contains(property) {
            return Err(unavailable());
        }
        state.properties.insert(property.to_owned(), value.to_owned());
        Ok(())
    }
}

#[async_trait]
impl DeviceProfileInterface for FakeEdge {
    async fn get(&self, name: &str) -> Result<DeviceProfile, EdgeError> {
        let state = self.call(format!("get profile {}", name))?;
        let id = state
            .profiles
            .get(name)
            .ok_or_else(|| EdgeError::NotFound(name.to_owned()))?;
        let mut dp = DeviceProfile::new(name, Default::default());
        dp.status = Some(DeviceProfileStatus {
            edge_id: id.clone(),
            synced: true,
        });
        Ok(dp)
    }

    async fn create(&self, profile: &DeviceProfile) -> Result<DeviceProfile, EdgeError> {
        let name = edge_name(profile);
        let mut state = self.call(format!("create profile {}", name))?;
        if state.reject_create {
            return Err(unavailable());
        }
        state.next_id += 1;
        let id = format!("profile-{}", state.next_id);
        state.profiles.insert(name, id.clone());
        let mut created = profile.clone();
        created.status = Some(DeviceProfileStatus {
            edge_id: id,
            synced: true,
        });
        Ok(created)
    }

    async fn delete(&self, name: &str) -> Result<(), EdgeError> {
        let mut state = self.call(format!("delete profile {}", name))?;
        state
            .profiles
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| EdgeError::NotFound(name.to_owned()))
    }
}
