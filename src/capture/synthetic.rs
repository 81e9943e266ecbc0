//! Synthetic capture devices
//!
//! In-process cameras that render a moving test pattern. Used when no real
//! camera backend is compiled in, and by the tests.

use super::frame::{Frame, FrameSource};
use super::stream::MediaStream;
use super::traits::{
    AcquisitionError, DeviceEnumerator, DeviceInfo, DeviceKind, MediaAcquirer, MediaConstraints, Resolution,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Frame rate of the test pattern
const PATTERN_FPS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticCamera {
    pub id: String,
    pub label: String,
    /// `None` simulates a device that reports no capabilities
    pub max_resolution: Option<Resolution>,
}

pub struct SyntheticDevices {
    cameras: Vec<SyntheticCamera>,
    denied: Mutex<HashSet<String>>,
    latency: Duration,
}

impl SyntheticDevices {
    /// `count` 640x480 cameras plus one microphone
    pub fn new(count: usize) -> Self {
        let cameras = (0..count)
            .map(|i| SyntheticCamera {
                id: format!("synthetic-camera-{}", i),
                label: format!("Synthetic Camera {}", i + 1),
                max_resolution: Some(Resolution::new(640, 480)),
            })
            .collect();
        Self::with_cameras(cameras)
    }

    pub fn with_cameras(cameras: Vec<SyntheticCamera>) -> Self {
        Self {
            cameras,
            denied: Mutex::new(HashSet::new()),
            latency: Duration::ZERO,
        }
    }

    /// Simulated time taken by device queries and by the permission prompt
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    /// Refuse acquisition of `device_id` as if permission were denied
    pub fn deny(&self, device_id: &str) {
        self.denied.lock().insert(device_id.to_string());
    }

    pub fn allow(&self, device_id: &str) {
        self.denied.lock().remove(device_id);
    }
}

#[async_trait]
impl DeviceEnumerator for SyntheticDevices {
    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, AcquisitionError> {
        self.simulate_latency().await;

        let mut devices: Vec<DeviceInfo> = self
            .cameras
            .iter()
            .map(|camera| DeviceInfo {
                id: camera.id.clone(),
                label: camera.label.clone(),
                kind: DeviceKind::VideoInput,
                max_resolution: camera.max_resolution,
            })
            .collect();

        devices.push(DeviceInfo {
            id: "synthetic-microphone".to_string(),
            label: "Synthetic Microphone".to_string(),
            kind: DeviceKind::AudioInput,
            max_resolution: None,
        });

        Ok(devices)
    }
}

#[async_trait]
impl MediaAcquirer for SyntheticDevices {
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<MediaStream, AcquisitionError> {
        self.simulate_latency().await;

        let (index, camera) = self
            .cameras
            .iter()
            .enumerate()
            .find(|(_, camera)| camera.id == constraints.device_id)
            .ok_or_else(|| AcquisitionError::DeviceNotFound(constraints.device_id.clone()))?;

        if self.denied.lock().contains(&camera.id) {
            return Err(AcquisitionError::PermissionDenied(camera.id.clone()));
        }

        let size = camera.max_resolution.unwrap_or(Resolution::new(320, 240));
        let pattern = TestPattern::new(size.width, size.height, index as u8);
        tracing::debug!("Opened {} ({}x{})", camera.label, size.width, size.height);

        Ok(MediaStream::new(Arc::new(pattern), constraints.audio))
    }
}

/// Moving colour bars, regenerated at most [`PATTERN_FPS`] times a second
pub struct TestPattern {
    width: u32,
    height: u32,
    tint: u8,
    epoch: Instant,
    stopped: AtomicBool,
    cache: Mutex<Option<(u64, Arc<Frame>)>>,
}

impl TestPattern {
    pub fn new(width: u32, height: u32, seed: u8) -> Self {
        Self {
            width,
            height,
            tint: seed.wrapping_mul(67),
            epoch: Instant::now(),
            stopped: AtomicBool::new(false),
            cache: Mutex::new(None),
        }
    }

    fn render(&self, frame_number: u64) -> Frame {
        let shift = (frame_number * 4) as usize;
        let mut data = Vec::with_capacity(Frame::byte_len(self.width, self.height));
        for y in 0..self.height as usize {
            for x in 0..self.width as usize {
                data.extend_from_slice(&[((x + shift) % 256) as u8, (y % 256) as u8, self.tint, 255]);
            }
        }
        Frame {
            width: self.width,
            height: self.height,
            data,
        }
    }
}

impl FrameSource for TestPattern {
    fn current_frame(&self) -> Option<Arc<Frame>> {
        if self.stopped.load(Ordering::SeqCst) {
            return None;
        }

        let frame_number = self.epoch.elapsed().as_millis() as u64 * PATTERN_FPS / 1000;
        let mut cache = self.cache.lock();
        match cache.as_ref() {
            Some((number, frame)) if *number == frame_number => Some(frame.clone()),
            _ => {
                let frame = Arc::new(self.render(frame_number));
                *cache = Some((frame_number, frame.clone()));
                Some(frame)
            }
        }
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}
