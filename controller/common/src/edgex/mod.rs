//! Access to the EdgeX Foundry core services.
//!
//! Reconcilers only see the [`DeviceInterface`] and [`DeviceProfileInterface`]
//! traits; [`client`] implements them over the EdgeX v2 REST API and
//! [`convert`] translates between the Kubernetes and EdgeX representations.

pub mod client;
pub mod convert;
pub mod dto;

pub use client::{EdgexDeviceClient, EdgexDeviceProfileClient};

use crate::api::device::{ActualPropertyState, AdminState, OperatingState};
use crate::api::{Device, DeviceProfile};
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum EdgeError {
    #[error("{0} not found on edge platform")]
    NotFound(String),
    #[error("request to edge platform failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("edge platform returned {code}: {message}")]
    Status { code: u16, message: String },
    #[error("unexpected response from edge platform: {0}")]
    Decode(String),
    #[error("invalid edge platform address {0}")]
    Address(String),
}

impl EdgeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, EdgeError::NotFound(_))
    }
}

/// Partial device update. Fields left as `None` are not sent, so values
/// changed on the edge side are left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePatch {
    pub name: String,
    pub admin_state: Option<AdminState>,
    pub operating_state: Option<OperatingState>,
}

impl DevicePatch {
    pub fn is_empty(&self) -> bool {
        self.admin_state.is_none() && self.operating_state.is_none()
    }
}

#[async_trait]
pub trait DeviceInterface: Send + Sync {
    async fn get(&self, name: &str) -> Result<Device, EdgeError>;
    /// Register the device, returning it with the edge id assigned.
    async fn create(&self, device: &Device) -> Result<Device, EdgeError>;
    async fn update(&self, patch: &DevicePatch) -> Result<(), EdgeError>;
    async fn delete(&self, name: &str) -> Result<(), EdgeError>;
    async fn get_property_state(
        &self,
        property: &str,
        device: &Device,
    ) -> Result<ActualPropertyState, EdgeError>;
    async fn update_property_state(
        &self,
        property: &str,
        device: &Device,
        value: &str,
    ) -> Result<(), EdgeError>;
}

#[async_trait]
pub trait DeviceProfileInterface: Send + Sync {
    async fn get(&self, name: &str) -> Result<DeviceProfile, EdgeError>;
    /// Register the profile, returning it with the edge id assigned.
    async fn create(&self, profile: &DeviceProfile) -> Result<DeviceProfile, EdgeError>;
    async fn delete(&self, name: &str) -> Result<(), EdgeError>;
}
