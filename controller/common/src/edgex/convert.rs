//! Conversion between Kubernetes objects and EdgeX DTOs.

use super::dto::*;
use crate::api::device::{AdminState, DeviceSpec, DeviceStatus, OperatingState, ProtocolProperties};
use crate::api::deviceprofile::{
    DeviceCommand, DeviceProfileSpec, DeviceProfileStatus, DeviceResource, ResourceOperation,
    ResourceProperties,
};
use crate::api::deviceservice::{DeviceServiceSpec, DeviceServiceStatus};
use crate::api::{edge_name, Device, DeviceProfile, DeviceService, EDGEX_OBJECT_NAME};
use kube::core::ObjectMeta;
use std::collections::BTreeMap;

/// Namespace given to objects discovered on the edge platform.
pub const DEFAULT_NAMESPACE: &str = "default";

fn kube_meta(edge_name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(edge_name.to_lowercase()),
        namespace: Some(DEFAULT_NAMESPACE.to_owned()),
        labels: Some(BTreeMap::from([(
            EDGEX_OBJECT_NAME.to_owned(),
            edge_name.to_owned(),
        )])),
        ..Default::default()
    }
}

pub fn to_edgex_admin_state(state: Option<AdminState>) -> &'static str {
    match state {
        Some(AdminState::Locked) => "LOCKED",
        _ => "UNLOCKED",
    }
}

pub fn to_edgex_operating_state(state: Option<OperatingState>) -> &'static str {
    match state {
        Some(OperatingState::Up) => "UP",
        Some(OperatingState::Down) => "DOWN",
        _ => "UNKNOWN",
    }
}

pub fn to_kube_admin_state(state: &str) -> Option<AdminState> {
    match state {
        "LOCKED" => Some(AdminState::Locked),
        "UNLOCKED" => Some(AdminState::Unlocked),
        _ => None,
    }
}

pub fn to_kube_operating_state(state: &str) -> Option<OperatingState> {
    match state {
        "UP" => Some(OperatingState::Up),
        "DOWN" => Some(OperatingState::Down),
        "UNKNOWN" => Some(OperatingState::Unknown),
        _ => None,
    }
}

pub fn to_edgex_protocols(
    protocols: &BTreeMap<String, ProtocolProperties>,
) -> BTreeMap<String, EdgexProtocolProperties> {
    protocols
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

pub fn to_kube_protocols(
    protocols: &BTreeMap<String, EdgexProtocolProperties>,
) -> BTreeMap<String, ProtocolProperties> {
    protocols
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

pub fn to_edgex_device(d: &Device) -> EdgexDevice {
    let status = d.status.clone().unwrap_or_default();
    EdgexDevice {
        id: status.edge_id,
        name: edge_name(d),
        description: d.spec.description.clone(),
        admin_state: to_edgex_admin_state(d.spec.admin_state).to_owned(),
        operating_state: to_edgex_operating_state(d.spec.operating_state).to_owned(),
        last_connected: status.last_connected,
        last_reported: status.last_reported,
        labels: d.spec.labels.clone(),
        location: (!d.spec.location.is_empty())
            .then(|| serde_json::Value::String(d.spec.location.clone())),
        service_name: d.spec.service_name.clone(),
        profile_name: d.spec.profile_name.clone(),
        notify: d.spec.notify,
        protocols: to_edgex_protocols(&d.spec.protocols),
    }
}

pub fn to_kube_device(ed: &EdgexDevice) -> Device {
    let location = match &ed.location {
        Some(serde_json::Value::String(s)) => s.clone(),
        _ => String::new(),
    };
    let admin_state = to_kube_admin_state(&ed.admin_state);
    let operating_state = to_kube_operating_state(&ed.operating_state);
    Device {
        metadata: kube_meta(&ed.name),
        spec: DeviceSpec {
            description: ed.description.clone(),
            admin_state,
            operating_state,
            protocols: to_kube_protocols(&ed.protocols),
            labels: ed.labels.clone(),
            location,
            service_name: ed.service_name.clone(),
            profile_name: ed.profile_name.clone(),
            notify: ed.notify,
            ..Default::default()
        },
        status: Some(DeviceStatus {
            last_connected: ed.last_connected,
            last_reported: ed.last_reported,
            synced: true,
            edge_id: ed.id.clone(),
            admin_state,
            operating_state,
            ..Default::default()
        }),
    }
}

pub fn to_edgex_device_service(ds: &DeviceService) -> EdgexDeviceService {
    let status = ds.status.clone().unwrap_or_default();
    EdgexDeviceService {
        id: status.edge_id,
        name: edge_name(ds),
        description: ds.spec.description.clone(),
        last_connected: status.last_connected,
        last_reported: status.last_reported,
        labels: ds.spec.labels.clone(),
        base_address: ds.spec.base_address.clone(),
        admin_state: to_edgex_admin_state(ds.spec.admin_state).to_owned(),
    }
}

pub fn to_kube_device_service(ds: &EdgexDeviceService) -> DeviceService {
    let admin_state = to_kube_admin_state(&ds.admin_state);
    DeviceService {
        metadata: kube_meta(&ds.name),
        spec: DeviceServiceSpec {
            description: ds.description.clone(),
            labels: ds.labels.clone(),
            admin_state,
            base_address: ds.base_address.clone(),
            node_pool: String::new(),
        },
        status: Some(DeviceServiceStatus {
            edge_id: ds.id.clone(),
            last_connected: ds.last_connected,
            last_reported: ds.last_reported,
            admin_state,
        }),
    }
}

pub fn to_edgex_resource_properties(p: &ResourceProperties) -> EdgexResourceProperties {
    EdgexResourceProperties {
        value_type: p.value_type.clone(),
        read_write: p.read_write.clone(),
        units: p.units.clone(),
        minimum: p.minimum.clone(),
        maximum: p.maximum.clone(),
        default_value: p.default_value.clone(),
        mask: p.mask.clone(),
        shift: p.shift.clone(),
        scale: p.scale.clone(),
        offset: p.offset.clone(),
        base: p.base.clone(),
        assertion: p.assertion.clone(),
        media_type: p.media_type.clone(),
    }
}

pub fn to_kube_resource_properties(p: &EdgexResourceProperties) -> ResourceProperties {
    ResourceProperties {
        value_type: p.value_type.clone(),
        read_write: p.read_write.clone(),
        units: p.units.clone(),
        minimum: p.minimum.clone(),
        maximum: p.maximum.clone(),
        default_value: p.default_value.clone(),
        mask: p.mask.clone(),
        shift: p.shift.clone(),
        scale: p.scale.clone(),
        offset: p.offset.clone(),
        base: p.base.clone(),
        assertion: p.assertion.clone(),
        media_type: p.media_type.clone(),
    }
}

pub fn to_edgex_device_resource(dr: &DeviceResource) -> EdgexDeviceResource {
    EdgexDeviceResource {
        description: dr.description.clone(),
        name: dr.name.clone(),
        is_hidden: dr.is_hidden,
        tag: dr.tag.clone(),
        properties: to_edgex_resource_properties(&dr.properties),
        attributes: dr
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), AttributeValue::Text(v.clone())))
            .collect(),
    }
}

/// Attributes without a string form (see [`AttributeValue::to_text`]) are dropped.
pub fn to_kube_device_resource(dr: &EdgexDeviceResource) -> DeviceResource {
    DeviceResource {
        description: dr.description.clone(),
        name: dr.name.clone(),
        tag: dr.tag.clone(),
        is_hidden: dr.is_hidden,
        properties: to_kube_resource_properties(&dr.properties),
        attributes: dr
            .attributes
            .iter()
            .filter_map(|(k, v)| v.to_text().map(|t| (k.clone(), t)))
            .collect(),
    }
}

pub fn to_edgex_resource_operation(ro: &ResourceOperation) -> EdgexResourceOperation {
    EdgexResourceOperation {
        device_resource: ro.device_resource.clone(),
        default_value: ro.default_value.clone(),
        mappings: ro.mappings.clone(),
    }
}

pub fn to_kube_resource_operation(ro: &EdgexResourceOperation) -> ResourceOperation {
    ResourceOperation {
        device_resource: ro.device_resource.clone(),
        default_value: ro.default_value.clone(),
        mappings: ro.mappings.clone(),
    }
}

pub fn to_edgex_device_command(dc: &DeviceCommand) -> EdgexDeviceCommand {
    EdgexDeviceCommand {
        name: dc.name.clone(),
        is_hidden: dc.is_hidden,
        read_write: dc.read_write.clone(),
        resource_operations: dc
            .resource_operations
            .iter()
            .map(to_edgex_resource_operation)
            .collect(),
    }
}

pub fn to_kube_device_command(dc: &EdgexDeviceCommand) -> DeviceCommand {
    DeviceCommand {
        name: dc.name.clone(),
        is_hidden: dc.is_hidden,
        read_write: dc.read_write.clone(),
        resource_operations: dc
            .resource_operations
            .iter()
            .map(to_kube_resource_operation)
            .collect(),
    }
}

pub fn to_edgex_device_profile(dp: &DeviceProfile) -> EdgexDeviceProfile {
    EdgexDeviceProfile {
        id: dp
            .status
            .as_ref()
            .map(|s| s.edge_id.clone())
            .unwrap_or_default(),
        name: edge_name(dp),
        description: dp.spec.description.clone(),
        manufacturer: dp.spec.manufacturer.clone(),
        model: dp.spec.model.clone(),
        labels: dp.spec.labels.clone(),
        device_resources: dp
            .spec
            .device_resources
            .iter()
            .map(to_edgex_device_resource)
            .collect(),
        device_commands: dp
            .spec
            .device_commands
            .iter()
            .map(to_edgex_device_command)
            .collect(),
    }
}

pub fn to_kube_device_profile(dp: &EdgexDeviceProfile) -> DeviceProfile {
    DeviceProfile {
        metadata: kube_meta(&dp.name),
        spec: DeviceProfileSpec {
            description: dp.description.clone(),
            manufacturer: dp.manufacturer.clone(),
            model: dp.model.clone(),
            labels: dp.labels.clone(),
            node_pool: String::new(),
            device_resources: dp
                .device_resources
                .iter()
                .map(to_kube_device_resource)
                .collect(),
            device_commands: dp
                .device_commands
                .iter()
                .map(to_kube_device_command)
                .collect(),
        },
        status: Some(DeviceProfileStatus {
            edge_id: dp.id.clone(),
            synced: true,
        }),
    }
}

pub fn make_add_device_requests(devices: &[&Device]) -> Vec<AddDeviceRequest> {
    devices
        .iter()
        .map(|d| AddDeviceRequest {
            base: BaseRequest::default(),
            device: to_edgex_device(d),
        })
        .collect()
}

pub fn make_device_profile_requests(profiles: &[&DeviceProfile]) -> Vec<DeviceProfileRequest> {
    profiles
        .iter()
        .map(|dp| DeviceProfileRequest {
            base: BaseRequest::default(),
            profile: to_edgex_device_profile(dp),
        })
        .collect()
}

pub fn make_add_device_service_requests(services: &[&DeviceService]) -> Vec<AddDeviceServiceRequest> {
    services
        .iter()
        .map(|ds| AddDeviceServiceRequest {
            base: BaseRequest::default(),
            service: to_edgex_device_service(ds),
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn modbus_profile() -> DeviceProfile {
        let resource = DeviceResource {
            description: "temperature".to_owned(),
            name: "Temperature".to_owned(),
            tag: "t".to_owned(),
            is_hidden: false,
            properties: ResourceProperties {
                value_type: "Float32".to_owned(),
                read_write: "RW".to_owned(),
                units: "C".to_owned(),
                scale: "0.1".to_owned(),
                ..Default::default()
            },
            attributes: BTreeMap::from([
                ("primaryTable".to_owned(), "HOLDING_REGISTERS".to_owned()),
                ("startingAddress".to_owned(), "3".to_owned()),
                ("rawScale".to_owned(), "0.250000".to_owned()),
            ]),
        };
        let command = DeviceCommand {
            name: "Climate".to_owned(),
            is_hidden: false,
            read_write: "R".to_owned(),
            resource_operations: vec![ResourceOperation {
                device_resource: "Temperature".to_owned(),
                default_value: "0".to_owned(),
                mappings: BTreeMap::from([("0".to_owned(), "off".to_owned())]),
            }],
        };
        DeviceProfile::new(
            "thermostat",
            DeviceProfileSpec {
                description: "a thermostat".to_owned(),
                manufacturer: "acme".to_owned(),
                model: "T1".to_owned(),
                labels: vec!["modbus".to_owned()],
                node_pool: String::new(),
                device_resources: vec![resource],
                device_commands: vec![command],
            },
        )
    }

    #[test]
    fn profile_round_trip() {
        let dp = modbus_profile();
        let edge = to_edgex_device_profile(&dp);
        assert_eq!(edge.name, "thermostat");
        let back = to_kube_device_profile(&edge);
        assert_eq!(back.spec, dp.spec);
        assert_eq!(back.metadata.name.as_deref(), Some("thermostat"));
        assert!(back.is_synced());
    }

    #[test]
    fn typed_attributes_from_edge() {
        let mut edge = to_edgex_device_profile(&modbus_profile());
        let attrs = &mut edge.device_resources[0].attributes;
        attrs.insert("startingAddress".to_owned(), AttributeValue::Integer(3));
        attrs.insert("rawScale".to_owned(), AttributeValue::Float(0.25));
        attrs.insert("nested".to_owned(), AttributeValue::Other(serde_json::json!({"a": 1})));

        let back = to_kube_device_profile(&edge);
        let attrs = &back.spec.device_resources[0].attributes;
        assert_eq!(attrs["primaryTable"], "HOLDING_REGISTERS");
        assert_eq!(attrs["startingAddress"], "3");
        assert_eq!(attrs["rawScale"], "0.250000");
        assert!(!attrs.contains_key("nested"));
        assert_eq!(back.spec, modbus_profile().spec);
    }

    #[test]
    fn device_round_trip() {
        let spec = DeviceSpec {
            description: "boiler sensor".to_owned(),
            admin_state: Some(AdminState::Locked),
            operating_state: Some(OperatingState::Up),
            protocols: BTreeMap::from([(
                "modbus-tcp".to_owned(),
                BTreeMap::from([("Address".to_owned(), "10.0.0.2".to_owned())]),
            )]),
            labels: vec!["boiler".to_owned()],
            location: "basement".to_owned(),
            service_name: "device-modbus".to_owned(),
            profile_name: "thermostat".to_owned(),
            node_pool: "hangzhou".to_owned(),
            notify: true,
            managed: true,
            ..Default::default()
        };
        let mut dev = Device::new("boiler", spec.clone());
        dev.metadata.labels = Some(BTreeMap::from([(
            EDGEX_OBJECT_NAME.to_owned(),
            "Boiler".to_owned(),
        )]));
        let edge = to_edgex_device(&dev);
        assert_eq!(edge.name, "Boiler");
        assert_eq!(edge.admin_state, "LOCKED");
        assert_eq!(edge.operating_state, "UP");

        let back = to_kube_device(&edge);
        assert_eq!(back.metadata.name.as_deref(), Some("boiler"));
        assert_eq!(edge_name(&back), "Boiler");
        assert_eq!(
            back.spec,
            DeviceSpec {
                node_pool: String::new(),
                managed: false,
                ..spec
            }
        );
        let status = back.status.unwrap();
        assert!(status.synced);
        assert_eq!(status.admin_state, Some(AdminState::Locked));
    }

    #[test]
    fn unset_states_map_to_edge_defaults() {
        assert_eq!(to_edgex_admin_state(None), "UNLOCKED");
        assert_eq!(to_edgex_operating_state(None), "UNKNOWN");
        assert_eq!(to_kube_operating_state("SLEEPING"), None);
    }

    #[test]
    fn device_service_round_trip() {
        let ds = DeviceService::new(
            "device-virtual",
            DeviceServiceSpec {
                description: "virtual devices".to_owned(),
                labels: vec!["virtual".to_owned()],
                admin_state: Some(AdminState::Unlocked),
                base_address: "http://edgex-device-virtual:59900".to_owned(),
                node_pool: String::new(),
            },
        );
        let reqs = make_add_device_service_requests(&[&ds]);
        assert_eq!(reqs[0].base.api_version, API_VERSION_V2);
        let back = to_kube_device_service(&reqs[0].service);
        assert_eq!(back.spec, ds.spec);
    }

    #[test]
    fn batch_requests_carry_api_version() {
        let dp = modbus_profile();
        let reqs = make_device_profile_requests(&[&dp]);
        let value = serde_json::to_value(&reqs).unwrap();
        assert_eq!(value[0]["apiVersion"], "v2");
        assert_eq!(value[0]["profile"]["name"], "thermostat");
        assert_eq!(
            value[0]["profile"]["deviceResources"][0]["attributes"]["startingAddress"],
            "3"
        );
    }
}
