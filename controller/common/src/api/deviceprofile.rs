use kube_derive::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Blocks removal of a DeviceProfile until it is gone from the edge platform.
pub const DEVICE_PROFILE_FINALIZER: &str = "device.openyurt.io/deviceprofile";

/// DeviceProfileSpec describes a class of devices: the resources they expose
/// and the commands that read or write them.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "device.openyurt.io",
    version = "v1alpha1",
    kind = "DeviceProfile",
    namespaced,
    status = "DeviceProfileStatus",
    shortname = "dp",
    printcolumn = r#"{"name":"NodePool", "type":"string", "jsonPath":".spec.nodePool"}"#,
    printcolumn = r#"{"name":"Synced", "type":"boolean", "jsonPath":".status.synced"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProfileSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub manufacturer: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    pub node_pool: String,
    #[serde(default)]
    pub device_resources: Vec<DeviceResource>,
    #[serde(default)]
    pub device_commands: Vec<DeviceCommand>,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceResource {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag: String,
    #[serde(default)]
    pub is_hidden: bool,
    pub properties: ResourceProperties,
    /// Protocol specific attributes, e.g. `primaryTable` for modbus.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceProperties {
    pub value_type: String,
    pub read_write: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub units: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub minimum: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub maximum: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub default_value: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub mask: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub shift: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub scale: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub offset: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub base: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub assertion: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub media_type: String,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCommand {
    pub name: String,
    #[serde(default)]
    pub is_hidden: bool,
    /// `R`, `W` or `RW`.
    pub read_write: String,
    #[serde(default)]
    pub resource_operations: Vec<ResourceOperation>,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceOperation {
    pub device_resource: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default_value: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub mappings: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProfileStatus {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub edge_id: String,
    #[serde(default)]
    pub synced: bool,
}

impl DeviceProfile {
    pub fn is_synced(&self) -> bool {
        self.status.as_ref().map(|s| s.synced).unwrap_or(false)
    }
}
