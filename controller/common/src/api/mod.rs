pub mod condition;
pub mod device;
pub mod deviceprofile;
pub mod deviceservice;

pub use device::Device;
pub use deviceprofile::DeviceProfile;
pub use deviceservice::DeviceService;

use kube::core::DynamicObject;
use kube::Resource;

pub const GROUP: &str = "device.openyurt.io";

/// Label holding the name of an object on the edge platform when it differs
/// from the Kubernetes object name.
pub const EDGEX_OBJECT_NAME: &str = "device-controller/edgex-object.name";

/// Name used to address `obj` on the edge platform.
pub fn edge_name<K: Resource>(obj: &K) -> String {
    let meta = obj.meta();
    match meta.labels.as_ref().and_then(|l| l.get(EDGEX_OBJECT_NAME)) {
        Some(name) => name.clone(),
        None => meta.name.as_deref().unwrap_or_default().to_lowercase(),
    }
}

/// Objects that can be registered on the edge platform.
pub trait EdgeObject {
    /// Whether the object has been added to the edge platform, or `None` when
    /// the object is not of a kind this controller knows about.
    fn added_to_edge(&self) -> Option<bool>;
}

impl EdgeObject for Device {
    fn added_to_edge(&self) -> Option<bool> {
        Some(self.is_synced())
    }
}

impl EdgeObject for DeviceProfile {
    fn added_to_edge(&self) -> Option<bool> {
        Some(self.is_synced())
    }
}

impl EdgeObject for DynamicObject {
    fn added_to_edge(&self) -> Option<bool> {
        let types = self.types.as_ref()?;
        let group = types.api_version.split('/').next().unwrap_or_default();
        if group != GROUP || !matches!(types.kind.as_str(), "Device" | "DeviceProfile") {
            return None;
        }
        Some(
            self.data
                .get("status")
                .and_then(|s| s.get("synced"))
                .and_then(|s| s.as_bool())
                .unwrap_or(false),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::device::DeviceSpec;
    use kube::core::TypeMeta;
    use std::collections::BTreeMap;

    #[test]
    fn edge_name_prefers_label() {
        let mut dev = Device::new("sensor-a", DeviceSpec::default());
        assert_eq!(edge_name(&dev), "sensor-a");
        dev.metadata.labels = Some(BTreeMap::from([(
            EDGEX_OBJECT_NAME.to_owned(),
            "Sensor-A".to_owned(),
        )]));
        assert_eq!(edge_name(&dev), "Sensor-A");
    }

    #[test]
    fn dynamic_object_classification() {
        let mut obj = DynamicObject {
            types: Some(TypeMeta {
                api_version: "device.openyurt.io/v1alpha1".to_owned(),
                kind: "Device".to_owned(),
            }),
            metadata: Default::default(),
            data: serde_json::json!({ "status": { "synced": true } }),
        };
        assert_eq!(obj.added_to_edge(), Some(true));
        obj.data = serde_json::json!({ "spec": {} });
        assert_eq!(obj.added_to_edge(), Some(false));
        obj.types = Some(TypeMeta {
            api_version: "v1".to_owned(),
            kind: "ConfigMap".to_owned(),
        });
        assert_eq!(obj.added_to_edge(), None);
        obj.types = None;
        assert_eq!(obj.added_to_edge(), None);
    }
}
