//! EdgeX v2 wire types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const API_VERSION_V2: &str = "v2";

pub type EdgexProtocolProperties = BTreeMap<String, String>;

/// A device resource attribute. EdgeX stores attributes as arbitrary JSON.
///
/// Only `Text`, `Integer`, `Float` and boolean `Other` values have a string
/// form on the Kubernetes side; nulls, arrays and objects are dropped when
/// converting to a [`DeviceResource`](crate::api::deviceprofile::DeviceResource).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum AttributeValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Other(serde_json::Value),
}

impl AttributeValue {
    pub fn to_text(&self) -> Option<String> {
        match self {
            AttributeValue::Text(s) => Some(s.clone()),
            AttributeValue::Integer(i) => Some(i.to_string()),
            AttributeValue::Float(f) => Some(format!("{:.6}", f)),
            AttributeValue::Other(serde_json::Value::Bool(b)) => Some(b.to_string()),
            AttributeValue::Other(_) => None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EdgexDevice {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub admin_state: String,
    pub operating_state: String,
    pub last_connected: i64,
    pub last_reported: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<serde_json::Value>,
    pub service_name: String,
    pub profile_name: String,
    pub notify: bool,
    pub protocols: BTreeMap<String, EdgexProtocolProperties>,
}

/// Body of a device PATCH: only present fields are changed.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDevice {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operating_state: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EdgexDeviceService {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub last_connected: i64,
    pub last_reported: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    pub base_address: String,
    pub admin_state: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EdgexDeviceProfile {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub manufacturer: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub model: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    pub device_resources: Vec<EdgexDeviceResource>,
    pub device_commands: Vec<EdgexDeviceCommand>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EdgexDeviceResource {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub name: String,
    pub is_hidden: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tag: String,
    pub properties: EdgexResourceProperties,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, AttributeValue>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EdgexResourceProperties {
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

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EdgexDeviceCommand {
    pub name: String,
    pub is_hidden: bool,
    pub read_write: String,
    pub resource_operations: Vec<EdgexResourceOperation>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EdgexResourceOperation {
    pub device_resource: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub default_value: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub mappings: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BaseRequest {
    pub api_version: String,
}

impl Default for BaseRequest {
    fn default() -> Self {
        BaseRequest {
            api_version: API_VERSION_V2.to_owned(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AddDeviceRequest {
    #[serde(flatten)]
    pub base: BaseRequest,
    pub device: EdgexDevice,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UpdateDeviceRequest {
    #[serde(flatten)]
    pub base: BaseRequest,
    pub device: UpdateDevice,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DeviceProfileRequest {
    #[serde(flatten)]
    pub base: BaseRequest,
    pub profile: EdgexDeviceProfile,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AddDeviceServiceRequest {
    #[serde(flatten)]
    pub base: BaseRequest,
    pub service: EdgexDeviceService,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BaseResponse {
    pub api_version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub request_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
    pub status_code: u16,
}

/// One element of the array answered to a batch add request.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct BaseWithIdResponse {
    #[serde(flatten)]
    pub base: BaseResponse,
    pub id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DeviceResponse {
    #[serde(flatten)]
    pub base: BaseResponse,
    pub device: EdgexDevice,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DeviceProfileResponse {
    #[serde(flatten)]
    pub base: BaseResponse,
    pub profile: EdgexDeviceProfile,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EventResponse {
    #[serde(flatten)]
    pub base: BaseResponse,
    pub event: Event,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Event {
    pub id: String,
    pub device_name: String,
    pub profile_name: String,
    pub readings: Vec<Reading>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Reading {
    pub resource_name: String,
    pub value_type: String,
    pub value: String,
}
