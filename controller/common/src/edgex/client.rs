//! EdgeX v2 REST implementation of the edge traits.

use super::convert::{
    make_add_device_requests, make_device_profile_requests, to_edgex_admin_state,
    to_edgex_operating_state, to_kube_device, to_kube_device_profile,
};
use super::dto::{
    BaseRequest, BaseWithIdResponse, DeviceProfileResponse, DeviceResponse, EventResponse,
    UpdateDevice, UpdateDeviceRequest,
};
use super::{DeviceInterface, DeviceProfileInterface, DevicePatch, EdgeError};
use crate::api::device::{ActualPropertyState, DeviceStatus};
use crate::api::deviceprofile::DeviceProfileStatus;
use crate::api::{edge_name, Device, DeviceProfile};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, trace};

pub const DEVICE_PATH: &[&str] = &["api", "v2", "device"];
pub const DEVICE_PROFILE_PATH: &[&str] = &["api", "v2", "deviceprofile"];
pub const COMMAND_PATH: &[&str] = &["api", "v2", "device"];

fn base_url(addr: &str) -> Result<Url, EdgeError> {
    let addr = addr.trim_end_matches('/');
    let addr = if addr.starts_with("http://") || addr.starts_with("https://") {
        addr.to_owned()
    } else {
        format!("http://{}", addr)
    };
    Url::parse(&addr).map_err(|e| EdgeError::Address(format!("{}: {}", addr, e)))
}

/// Append `segments` to `base`, percent-encoding each one so names holding
/// `/`, `?` or spaces stay a single path segment.
fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    // http(s) urls always have a path to extend
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

fn http_client(timeout: Duration) -> Result<Client, EdgeError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

async fn check(resp: Response, what: &str) -> Result<Response, EdgeError> {
    let status = resp.status();
    if status == StatusCode::NOT_FOUND {
        return Err(EdgeError::NotFound(what.to_owned()));
    }
    if !status.is_success() {
        let message = resp.text().await.unwrap_or_default();
        return Err(EdgeError::Status {
            code: status.as_u16(),
            message,
        });
    }
    Ok(resp)
}

/// Batch endpoints answer 207 with one status per request item.
fn check_item(items: Vec<BaseWithIdResponse>, what: &str) -> Result<BaseWithIdResponse, EdgeError> {
    let item = items
        .into_iter()
        .next()
        .ok_or_else(|| EdgeError::Decode(format!("empty response for {}", what)))?;
    match item.base.status_code {
        404 => Err(EdgeError::NotFound(what.to_owned())),
        code if code >= 400 => Err(EdgeError::Status {
            code,
            message: item.base.message,
        }),
        _ => Ok(item),
    }
}

/// Client for devices on EdgeX core-metadata and core-command.
#[derive(Debug, Clone)]
pub struct EdgexDeviceClient {
    http: Client,
    metadata: Url,
    command: Url,
}

impl EdgexDeviceClient {
    pub fn new(metadata_addr: &str, command_addr: &str, timeout: Duration) -> Result<Self, EdgeError> {
        Ok(EdgexDeviceClient {
            http: http_client(timeout)?,
            metadata: base_url(metadata_addr)?,
            command: base_url(command_addr)?,
        })
    }

    fn command_url(&self, device: &Device, property: &str) -> Url {
        let name = edge_name(device);
        endpoint(
            &self.command,
            &[COMMAND_PATH, &["name", name.as_str(), property][..]].concat(),
        )
    }
}

#[async_trait]
impl DeviceInterface for EdgexDeviceClient {
    #[tracing::instrument(skip(self))]
    async fn get(&self, name: &str) -> Result<Device, EdgeError> {
        let url = endpoint(&self.metadata, &[DEVICE_PATH, &["name", name][..]].concat());
        let resp = check(self.http.get(url).send().await?, name).await?;
        let body: DeviceResponse = resp.json().await?;
        Ok(to_kube_device(&body.device))
    }

    #[tracing::instrument(skip_all)]
    async fn create(&self, device: &Device) -> Result<Device, EdgeError> {
        let name = edge_name(device);
        let url = endpoint(&self.metadata, DEVICE_PATH);
        let req = make_add_device_requests(&[device]);
        let resp = check(self.http.post(url).json(&req).send().await?, &name).await?;
        let item = check_item(resp.json().await?, &name)?;
        debug!(device = %name, edge_id = %item.id, "Device added to edge platform");
        let mut created = device.clone();
        let mut status = created.status.take().unwrap_or_else(DeviceStatus::default);
        status.edge_id = item.id;
        status.synced = true;
        created.status = Some(status);
        Ok(created)
    }

    #[tracing::instrument(skip(self))]
    async fn update(&self, patch: &DevicePatch) -> Result<(), EdgeError> {
        let url = endpoint(&self.metadata, DEVICE_PATH);
        let req = [UpdateDeviceRequest {
            base: BaseRequest::default(),
            device: UpdateDevice {
                name: patch.name.clone(),
                admin_state: patch
                    .admin_state
                    .map(|s| to_edgex_admin_state(Some(s)).to_owned()),
                operating_state: patch
                    .operating_state
                    .map(|s| to_edgex_operating_state(Some(s)).to_owned()),
            },
        }];
        let resp = check(self.http.patch(url).json(&req).send().await?, &patch.name).await?;
        check_item(resp.json().await?, &patch.name)?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, name: &str) -> Result<(), EdgeError> {
        let url = endpoint(&self.metadata, &[DEVICE_PATH, &["name", name][..]].concat());
        check(self.http.delete(url).send().await?, name).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, device))]
    async fn get_property_state(
        &self,
        property: &str,
        device: &Device,
    ) -> Result<ActualPropertyState, EdgeError> {
        let url = self.command_url(device, property);
        let resp = check(self.http.get(url.clone()).send().await?, property).await?;
        let body: EventResponse = resp.json().await?;
        let actual_value = body
            .event
            .readings
            .into_iter()
            .next()
            .map(|r| r.value)
            .unwrap_or_default();
        trace!(property, actual_value = %actual_value, "Read property");
        Ok(ActualPropertyState {
            name: property.to_owned(),
            get_url: url.to_string(),
            actual_value,
        })
    }

    #[tracing::instrument(skip(self, device))]
    async fn update_property_state(
        &self,
        property: &str,
        device: &Device,
        value: &str,
    ) -> Result<(), EdgeError> {
        // properties are keyed by name, but the key may differ from `name`
        let props = &device.spec.device_properties;
        let url = props
            .get(property)
            .or_else(|| props.values().find(|p| p.name == property))
            .map(|p| p.put_url.clone())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| self.command_url(device, property).to_string());
        let body = HashMap::from([(property, value)]);
        check(self.http.put(&url).json(&body).send().await?, property).await?;
        Ok(())
    }
}

/// Client for device profiles on EdgeX core-metadata.
#[derive(Debug, Clone)]
pub struct EdgexDeviceProfileClient {
    http: Client,
    metadata: Url,
}

impl EdgexDeviceProfileClient {
    pub fn new(metadata_addr: &str, timeout: Duration) -> Result<Self, EdgeError> {
        Ok(EdgexDeviceProfileClient {
            http: http_client(timeout)?,
            metadata: base_url(metadata_addr)?,
        })
    }
}

#[async_trait]
impl DeviceProfileInterface for EdgexDeviceProfileClient {
    #[tracing::instrument(skip(self))]
    async fn get(&self, name: &str) -> Result<DeviceProfile, EdgeError> {
        let url = endpoint(&self.metadata, &[DEVICE_PROFILE_PATH, &["name", name][..]].concat());
        let resp = check(self.http.get(url).send().await?, name).await?;
        let body: DeviceProfileResponse = resp.json().await?;
        Ok(to_kube_device_profile(&body.profile))
    }

    #[tracing::instrument(skip_all)]
    async fn create(&self, profile: &DeviceProfile) -> Result<DeviceProfile, EdgeError> {
        let name = edge_name(profile);
        let url = endpoint(&self.metadata, DEVICE_PROFILE_PATH);
        let req = make_device_profile_requests(&[profile]);
        let resp = check(self.http.post(url).json(&req).send().await?, &name).await?;
        let item = check_item(resp.json().await?, &name)?;
        debug!(profile = %name, edge_id = %item.id, "DeviceProfile added to edge platform");
        let mut created = profile.clone();
        created.status = Some(DeviceProfileStatus {
            edge_id: item.id,
            synced: true,
        });
        Ok(created)
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, name: &str) -> Result<(), EdgeError> {
        let url = endpoint(&self.metadata, &[DEVICE_PROFILE_PATH, &["name", name][..]].concat());
        check(self.http.delete(url).send().await?, name).await?;
        Ok(())
    }
}
