use super::condition::{self, Condition};
use kube_derive::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display};

/// Device condition: the device has been registered on the edge platform.
pub const DEVICE_SYNCED_CONDITION: &str = "DeviceSynced";
/// Device condition: admin/operating state and properties match the spec.
pub const DEVICE_MANAGING_CONDITION: &str = "DeviceManaging";

/// Blocks removal of a Device until it is gone from the edge platform.
pub const DEVICE_FINALIZER: &str = "device.openyurt.io/device";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum AdminState {
    Locked,
    Unlocked,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperatingState {
    Up,
    Down,
    Unknown,
}

/// Connection parameters of one protocol, e.g. `{"Address": "10.0.0.2", "Port": "502"}`.
pub type ProtocolProperties = BTreeMap<String, String>;

/// DeviceSpec is the desired state of a device registered on the edge platform.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "device.openyurt.io",
    version = "v1alpha1",
    kind = "Device",
    namespaced,
    status = "DeviceStatus",
    shortname = "dev",
    printcolumn = r#"{"name":"NodePool", "type":"string", "jsonPath":".spec.nodePool"}"#,
    printcolumn = r#"{"name":"Synced", "type":"boolean", "jsonPath":".status.synced"}"#,
    printcolumn = r#"{"name":"Managed", "type":"boolean", "jsonPath":".spec.managed"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Administrative lock state the device should be put in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_state: Option<AdminState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operating_state: Option<OperatingState>,
    /// Protocol name to connection parameters.
    #[serde(default)]
    pub protocols: BTreeMap<String, ProtocolProperties>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,
    /// Name of the device service that owns this device.
    pub service_name: String,
    /// Name of the device profile describing this device.
    pub profile_name: String,
    /// Only the controller deployed in this node pool acts on the device.
    pub node_pool: String,
    #[serde(default)]
    pub notify: bool,
    /// Whether admin state, operating state and properties are pushed from the cloud.
    #[serde(default)]
    pub managed: bool,
    /// Desired property values, keyed by property name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub device_properties: BTreeMap<String, DesiredPropertyState>,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DesiredPropertyState {
    pub name: String,
    #[serde(default, rename = "putURL", skip_serializing_if = "String::is_empty")]
    pub put_url: String,
    #[serde(default)]
    pub desired_value: String,
}

/// Value of a device property as last read from (or written to) the edge platform.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActualPropertyState {
    pub name: String,
    #[serde(default, rename = "getURL", skip_serializing_if = "String::is_empty")]
    pub get_url: String,
    #[serde(default)]
    pub actual_value: String,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    #[serde(default)]
    pub last_connected: i64,
    #[serde(default)]
    pub last_reported: i64,
    /// True once the device has an edge id confirmed by the edge platform.
    #[serde(default)]
    pub synced: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub device_properties: BTreeMap<String, ActualPropertyState>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub edge_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_state: Option<AdminState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operating_state: Option<OperatingState>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl Device {
    pub fn is_synced(&self) -> bool {
        self.status.as_ref().map(|s| s.synced).unwrap_or(false)
    }

    pub fn is_ready(&self) -> bool {
        self.status
            .as_ref()
            .map(|s| condition::is_true(&s.conditions, condition::READY_CONDITION))
            .unwrap_or(false)
    }
}

impl Display for Device {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        writeln!(fmt, "Profile: {}", self.spec.profile_name)?;
        writeln!(fmt, "Service: {}", self.spec.service_name)?;
        writeln!(fmt, "Node pool: {}", self.spec.node_pool)?;
        if let Some(ref status) = self.status {
            writeln!(fmt, "Status: synced={} edgeId={}", status.synced, status.edge_id)?;
            for item in status.device_properties.values() {
                writeln!(fmt, "{}", item)?;
            }
            for cond in &status.conditions {
                writeln!(fmt, "{}", cond)?;
            }
        }
        Ok(())
    }
}

impl Display for ActualPropertyState {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(fmt, "{}: {}", self.name, self.actual_value)
    }
}
