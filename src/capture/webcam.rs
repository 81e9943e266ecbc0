//! Webcam capture using nokhwa
//!
//! Each acquired stream owns a capture thread that keeps the most recent
//! decoded RGBA frame. Stopping the stream ends the thread and closes the camera.

use super::frame::{Frame, FrameSource};
use super::stream::MediaStream;
use super::traits::{
    AcquisitionError, DeviceEnumerator, DeviceInfo, DeviceKind, MediaAcquirer, MediaConstraints, Resolution,
};
use async_trait::async_trait;
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Cameras reachable through the platform's native API
#[derive(Debug, Default)]
pub struct WebcamDevices;

impl WebcamDevices {
    pub fn new() -> Self {
        Self
    }
}

fn camera_index(device_id: &str) -> CameraIndex {
    match device_id.parse::<u32>() {
        Ok(idx) => CameraIndex::Index(idx),
        Err(_) => CameraIndex::String(device_id.to_string()),
    }
}

fn highest_resolution() -> RequestedFormat<'static> {
    RequestedFormat::new::<RgbAFormat>(RequestedFormatType::AbsoluteHighestResolution)
}

/// Largest resolution the camera will negotiate, without opening a stream
fn probe_resolution(index: &CameraIndex) -> Option<Resolution> {
    match Camera::new(index.clone(), highest_resolution()) {
        Ok(camera) => {
            let resolution = camera.resolution();
            Some(Resolution::new(resolution.width(), resolution.height()))
        }
        Err(e) => {
            tracing::warn!("Failed to probe camera {:?}: {:?}", index, e);
            None
        }
    }
}

fn list_cameras() -> Result<Vec<DeviceInfo>, AcquisitionError> {
    let cameras = nokhwa::query(ApiBackend::Auto).map_err(|e| AcquisitionError::Backend(e.to_string()))?;

    Ok(cameras
        .into_iter()
        .map(|info| {
            let index = info.index().clone();
            let id = match &index {
                CameraIndex::Index(i) => i.to_string(),
                CameraIndex::String(s) => s.to_string(),
            };
            DeviceInfo {
                id,
                label: info.human_name().to_string(),
                kind: DeviceKind::VideoInput,
                max_resolution: probe_resolution(&index),
            }
        })
        .collect())
}

#[async_trait]
impl DeviceEnumerator for WebcamDevices {
    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, AcquisitionError> {
        tokio::task::spawn_blocking(list_cameras)
            .await
            .map_err(|e| AcquisitionError::Backend(e.to_string()))?
    }
}

#[async_trait]
impl MediaAcquirer for WebcamDevices {
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<MediaStream, AcquisitionError> {
        let source = Arc::new(WebcamSource::default());
        let (ready_tx, ready_rx) = oneshot::channel();

        let index = camera_index(&constraints.device_id);
        let device_id = constraints.device_id.clone();
        let thread_source = source.clone();
        std::thread::spawn(move || capture_loop(index, device_id, thread_source, ready_tx));

        ready_rx
            .await
            .map_err(|_| AcquisitionError::Backend("capture thread exited".to_string()))??;

        Ok(MediaStream::new(source, constraints.audio))
    }
}

#[derive(Default)]
struct WebcamSource {
    latest: Mutex<Option<Arc<Frame>>>,
    stopped: AtomicBool,
}

impl FrameSource for WebcamSource {
    fn current_frame(&self) -> Option<Arc<Frame>> {
        if self.stopped.load(Ordering::SeqCst) {
            return None;
        }
        self.latest.lock().clone()
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

fn capture_loop(
    index: CameraIndex,
    device_id: String,
    source: Arc<WebcamSource>,
    ready: oneshot::Sender<Result<(), AcquisitionError>>,
) {
    let mut camera = match Camera::new(index.clone(), highest_resolution()) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to open camera {:?}: {:?}", index, e);
            let _ = ready.send(Err(AcquisitionError::DeviceNotFound(device_id)));
            return;
        }
    };

    if let Err(e) = camera.open_stream() {
        tracing::error!("Failed to open camera stream: {:?}", e);
        let _ = ready.send(Err(AcquisitionError::PermissionDenied(device_id)));
        return;
    }

    let format = camera.camera_format();
    tracing::info!(
        "Webcam opened: {}x{} @ {}fps, format={:?}",
        format.resolution().width(),
        format.resolution().height(),
        format.frame_rate(),
        format.format()
    );
    let _ = ready.send(Ok(()));

    let mut frame_count: u64 = 0;
    while !source.stopped.load(Ordering::SeqCst) {
        // Blocks until the camera delivers the next frame
        match camera.frame() {
            Ok(buffer) => match buffer.decode_image::<RgbAFormat>() {
                Ok(image) => {
                    let (width, height) = (image.width(), image.height());
                    if let Some(frame) = Frame::new(width, height, image.into_raw()) {
                        *source.latest.lock() = Some(Arc::new(frame));
                        frame_count += 1;
                    }
                }
                Err(e) => tracing::debug!("Failed to decode frame: {:?}", e),
            },
            Err(e) => tracing::debug!("Failed to capture frame: {:?}", e),
        }
    }

    if let Err(e) = camera.stop_stream() {
        tracing::warn!("Error stopping camera stream: {:?}", e);
    }
    tracing::info!("Webcam capture thread stopped after {} frames", frame_count);
}
