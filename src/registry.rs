//! Session registry
//!
//! Builds one [`CameraSession`] per video input and fans start/stop out
//! across them. Cameras fail independently: one camera's error is logged and
//! reported without blocking or rolling back the others.

use crate::camera::{CameraArtifacts, CameraError, CameraSession, CameraSettings};
use crate::capture::{AcquisitionError, DeviceEnumerator, MediaAcquirer, Resolution};
use crate::compositor::Compositor;
use crate::detection::{DetectionService, Rect};
use crate::present::{ArtifactSink, StreamPreview};
use crate::recorder::RecordingState;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinSet;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Cameras are not ready yet")]
    NotReady,

    #[error("Cannot prepare cameras while {0} camera(s) are recording")]
    Busy(usize),

    #[error(transparent)]
    Enumeration(#[from] AcquisitionError),
}

/// Settings applied to every session the registry builds
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub settings: CameraSettings,
    /// Surface size for devices that report no capabilities
    pub default_surface: Resolution,
    pub compositor: Compositor,
    pub attach_previews: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            settings: CameraSettings::default(),
            default_surface: Resolution::new(640, 480),
            compositor: Compositor::default(),
            attach_previews: true,
        }
    }
}

/// Result of a fan-out operation for one camera
#[derive(Debug)]
pub struct CameraOutcome<T> {
    pub index: usize,
    pub device_id: String,
    pub result: Result<T, CameraError>,
}

/// Serializable snapshot of one camera
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraStatus {
    pub index: usize,
    pub device_id: String,
    pub label: String,
    pub running: bool,
    pub surface_width: u32,
    pub surface_height: u32,
    pub raw_state: RecordingState,
    pub composited_state: RecordingState,
    pub raw_chunks: usize,
    pub composited_chunks: usize,
    pub latest_rect: Option<Rect>,
}

/// Download label of the N-th camera (1-based)
pub fn download_label(index: usize) -> String {
    format!("Download canvas record {}", index + 1)
}

pub struct SessionRegistry {
    enumerator: Arc<dyn DeviceEnumerator>,
    acquirer: Arc<dyn MediaAcquirer>,
    detector: Arc<dyn DetectionService>,
    sink: Option<Arc<dyn ArtifactSink>>,
    config: RegistryConfig,
    cameras: RwLock<Vec<Arc<CameraSession>>>,
    ready: AtomicBool,
}

impl SessionRegistry {
    pub fn new(
        enumerator: Arc<dyn DeviceEnumerator>,
        acquirer: Arc<dyn MediaAcquirer>,
        detector: Arc<dyn DetectionService>,
        config: RegistryConfig,
    ) -> Self {
        Self {
            enumerator,
            acquirer,
            detector,
            sink: None,
            config,
            cameras: RwLock::new(Vec::new()),
            ready: AtomicBool::new(false),
        }
    }

    /// Shared results area for every composited recording
    pub fn with_sink(mut self, sink: Arc<dyn ArtifactSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub async fn cameras(&self) -> Vec<Arc<CameraSession>> {
        self.cameras.read().await.clone()
    }

    /// Enumerate devices and build one session per camera
    ///
    /// The camera list is only locked to swap the new sessions in, so
    /// `stop_all` and `status` keep working while devices are queried.
    pub async fn prepare(&self) -> Result<Vec<Arc<CameraSession>>, RegistryError> {
        Self::ensure_idle(&self.cameras.read().await)?;

        let devices = self.enumerator.enumerate_devices().await?;
        let sessions: Vec<Arc<CameraSession>> = devices
            .into_iter()
            .filter(|device| device.is_camera())
            .enumerate()
            .map(|(index, device)| {
                let surface = device.max_resolution.unwrap_or_else(|| {
                    tracing::debug!(
                        "{} reports no capabilities, using {}x{}",
                        device.label,
                        self.config.default_surface.width,
                        self.config.default_surface.height
                    );
                    self.config.default_surface
                });

                let mut session = CameraSession::new(
                    device,
                    surface,
                    self.acquirer.clone(),
                    self.detector.clone(),
                    self.config.settings,
                )
                .with_compositor(self.config.compositor);

                if let Some(sink) = &self.sink {
                    session = session.with_artifact_sink(sink.clone(), download_label(index));
                }
                if self.config.attach_previews {
                    session = session.with_preview(Arc::new(StreamPreview::new(surface)));
                }
                Arc::new(session)
            })
            .collect();

        for (index, camera) in sessions.iter().enumerate() {
            let (width, height) = camera.surface_dimensions();
            tracing::info!(
                "Camera {}: {} ({}) {}x{}",
                index + 1,
                camera.device().label,
                camera.device().id,
                width,
                height
            );
        }

        let mut cameras = self.cameras.write().await;
        Self::ensure_idle(&cameras)?;
        *cameras = sessions.clone();
        self.ready.store(true, Ordering::SeqCst);
        tracing::info!("Prepared {} camera(s)", sessions.len());
        Ok(sessions)
    }

    /// Start every camera concurrently
    pub async fn start_all(&self) -> Result<Vec<CameraOutcome<()>>, RegistryError> {
        if !self.is_ready() {
            tracing::warn!("Start requested before cameras are ready");
            return Err(RegistryError::NotReady);
        }

        let outcomes = self
            .fan_out(|camera| async move { camera.start().await })
            .await;
        for outcome in &outcomes {
            if let Err(e) = &outcome.result {
                tracing::error!("Camera {} ({}) failed to start: {}", outcome.index + 1, outcome.device_id, e);
            }
        }
        Ok(outcomes)
    }

    /// Stop every camera concurrently. A no-op over an empty camera list.
    pub async fn stop_all(&self) -> Vec<CameraOutcome<Option<CameraArtifacts>>> {
        let outcomes = self.fan_out(|camera| async move { camera.stop().await }).await;
        for outcome in &outcomes {
            if let Err(e) = &outcome.result {
                tracing::error!("Camera {} ({}) failed to stop: {}", outcome.index + 1, outcome.device_id, e);
            }
        }
        outcomes
    }

    pub async fn status(&self) -> Vec<CameraStatus> {
        self.cameras
            .read()
            .await
            .iter()
            .enumerate()
            .map(|(index, camera)| {
                let (surface_width, surface_height) = camera.surface_dimensions();
                CameraStatus {
                    index,
                    device_id: camera.device().id.clone(),
                    label: camera.device().label.clone(),
                    running: camera.is_running(),
                    surface_width,
                    surface_height,
                    raw_state: camera.raw_recording().state(),
                    composited_state: camera.composited_recording().state(),
                    raw_chunks: camera.raw_recording().chunk_count(),
                    composited_chunks: camera.composited_recording().chunk_count(),
                    latest_rect: camera.latest_rect(),
                }
            })
            .collect()
    }

    fn ensure_idle(cameras: &[Arc<CameraSession>]) -> Result<(), RegistryError> {
        let running = cameras.iter().filter(|c| c.is_running()).count();
        if running > 0 {
            tracing::warn!("Ignoring prepare: {} camera(s) still recording", running);
            return Err(RegistryError::Busy(running));
        }
        Ok(())
    }

    async fn fan_out<T, F, Fut>(&self, op: F) -> Vec<CameraOutcome<T>>
    where
        T: Send + 'static,
        F: Fn(Arc<CameraSession>) -> Fut,
        Fut: Future<Output = Result<T, CameraError>> + Send + 'static,
    {
        let cameras = self.cameras().await;
        let mut tasks = JoinSet::new();
        for (index, camera) in cameras.into_iter().enumerate() {
            let device_id = camera.device().id.clone();
            let fut = op(camera);
            tasks.spawn(async move {
                CameraOutcome {
                    index,
                    device_id,
                    result: fut.await,
                }
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => tracing::error!("Camera task panicked: {}", e),
            }
        }
        outcomes.sort_by_key(|outcome| outcome.index);
        outcomes
    }
}
