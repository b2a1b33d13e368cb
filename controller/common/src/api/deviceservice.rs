use super::device::AdminState;
use kube_derive::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// DeviceServiceSpec mirrors a device service running on the edge platform.
/// It is converted to and from the edge representation but never reconciled.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "device.openyurt.io",
    version = "v1alpha1",
    kind = "DeviceService",
    namespaced,
    status = "DeviceServiceStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct DeviceServiceSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_state: Option<AdminState>,
    /// Address the device service listens on, e.g. `http://device-virtual:59900`.
    pub base_address: String,
    #[serde(default)]
    pub node_pool: String,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceServiceStatus {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub edge_id: String,
    #[serde(default)]
    pub last_connected: i64,
    #[serde(default)]
    pub last_reported: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_state: Option<AdminState>,
}
