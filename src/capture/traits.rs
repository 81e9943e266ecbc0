//! Capture trait definitions
//!
//! Platform-agnostic traits for device enumeration and media acquisition.

use super::stream::MediaStream;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of capture device reported by enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceKind {
    VideoInput,
    AudioInput,
    AudioOutput,
}

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Information about a capture device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Stable device ID used to pin acquisition
    pub id: String,

    /// Human readable name
    pub label: String,

    /// Device kind
    pub kind: DeviceKind,

    /// Largest resolution the device advertises, if known
    pub max_resolution: Option<Resolution>,
}

impl DeviceInfo {
    pub fn is_camera(&self) -> bool {
        self.kind == DeviceKind::VideoInput
    }
}

/// Constraints passed to a [`MediaAcquirer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaConstraints {
    pub device_id: String,
    pub audio: bool,
    pub video: bool,
}

impl MediaConstraints {
    /// Audio + video, pinned to one device
    pub fn for_device(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            audio: true,
            video: true,
        }
    }
}

/// Errors raised while enumerating or opening devices
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Permission denied for device: {0}")]
    PermissionDenied(String),

    #[error("Capture backend error: {0}")]
    Backend(String),
}

/// Supplies the list of capture devices
#[async_trait]
pub trait DeviceEnumerator: Send + Sync {
    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, AcquisitionError>;
}

/// Opens a live stream for a device
#[async_trait]
pub trait MediaAcquirer: Send + Sync {
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<MediaStream, AcquisitionError>;
}
