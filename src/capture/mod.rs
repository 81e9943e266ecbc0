//! Media capture
//!
//! This module provides device enumeration, stream acquisition and
//! surface capture:
//! - `traits` defines the device and acquisition seams
//! - `synthetic` renders test-pattern cameras in-process
//! - `webcam` opens real cameras (behind the `webcam` feature)

pub mod canvas;
pub mod frame;
pub mod stream;
pub mod synthetic;
pub mod traits;

#[cfg(feature = "webcam")]
pub mod webcam;

pub use canvas::{capture_surface, DEFAULT_CAPTURE_FPS};
pub use frame::{Frame, FrameSource};
pub use stream::MediaStream;
pub use synthetic::{SyntheticCamera, SyntheticDevices};
pub use traits::{
    AcquisitionError, DeviceEnumerator, DeviceInfo, DeviceKind, MediaAcquirer, MediaConstraints, Resolution,
};

#[cfg(feature = "webcam")]
pub use webcam::WebcamDevices;
