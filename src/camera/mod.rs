//! Camera sessions
//!
//! One [`CameraSession`] per video input: acquires the device, records the
//! raw and composited streams side by side and keeps the detection overlay
//! in step with the raw chunk ticks.

mod session;

pub use session::{CameraArtifacts, CameraError, CameraSession, CameraSettings};
