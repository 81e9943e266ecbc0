//! Per-camera session
//!
//! Owns one raw and one composited [`RecordingSession`] and runs the tick
//! loop between them: each raw chunk redraws the compositing surface and
//! asks the detector for a rectangle. Results that come back after a
//! stop/start are dropped by comparing the epoch they were issued under.

use crate::capture::{
    capture_surface, AcquisitionError, DeviceInfo, MediaAcquirer, MediaConstraints, MediaStream, Resolution,
    DEFAULT_CAPTURE_FPS,
};
use crate::compositor::{Compositor, SharedSurface, Surface};
use crate::detection::{DetectionService, Rect};
use crate::present::{ArtifactSink, PreviewSink};
use crate::recorder::{
    Artifact, ChunkEncoding, RecordingError, RecordingEvent, RecordingRole, RecordingSession, DEFAULT_CHUNK_INTERVAL,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error("Camera {0} is already running")]
    AlreadyRunning(String),

    #[error(transparent)]
    Recording(#[from] RecordingError),
}

/// Timing and encoding knobs shared by every camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraSettings {
    /// Raw chunk interval; every raw chunk is one compositing tick
    pub chunk_interval: Duration,
    pub composited_chunk_interval: Duration,
    /// Sampling rate of the compositing surface
    pub capture_fps: u32,
    pub encoding: ChunkEncoding,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            chunk_interval: DEFAULT_CHUNK_INTERVAL,
            composited_chunk_interval: DEFAULT_CHUNK_INTERVAL,
            capture_fps: DEFAULT_CAPTURE_FPS,
            encoding: ChunkEncoding::default(),
        }
    }
}

/// Both artifacts of one run
#[derive(Debug, Clone, PartialEq)]
pub struct CameraArtifacts {
    pub raw: Artifact,
    pub composited: Artifact,
}

struct CameraState {
    running: bool,
    epoch: u64,
    latest_rect: Option<Rect>,
    raw_stream: Option<MediaStream>,
    composited_stream: Option<MediaStream>,
    tick_task: Option<JoinHandle<()>>,
}

pub struct CameraSession {
    device: DeviceInfo,
    surface: SharedSurface,
    settings: CameraSettings,
    acquirer: Arc<dyn MediaAcquirer>,
    detector: Arc<dyn DetectionService>,
    compositor: Compositor,
    preview: Option<Arc<dyn PreviewSink>>,
    raw_recording: RecordingSession,
    composited_recording: RecordingSession,
    state: Arc<Mutex<CameraState>>,
    /// Serializes start/stop
    lifecycle: tokio::sync::Mutex<()>,
}

impl CameraSession {
    pub fn new(
        device: DeviceInfo,
        surface_size: Resolution,
        acquirer: Arc<dyn MediaAcquirer>,
        detector: Arc<dyn DetectionService>,
        settings: CameraSettings,
    ) -> Self {
        let raw_recording = RecordingSession::new(RecordingRole::Raw, device.label.clone(), settings.encoding);
        let composited_recording =
            RecordingSession::new(RecordingRole::Composited, device.label.clone(), settings.encoding);

        Self {
            surface: Surface::shared(surface_size.width, surface_size.height),
            device,
            settings,
            acquirer,
            detector,
            compositor: Compositor::default(),
            preview: None,
            raw_recording,
            composited_recording,
            state: Arc::new(Mutex::new(CameraState {
                running: false,
                epoch: 0,
                latest_rect: None,
                raw_stream: None,
                composited_stream: None,
                tick_task: None,
            })),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_compositor(mut self, compositor: Compositor) -> Self {
        self.compositor = compositor;
        self
    }

    pub fn with_preview(mut self, preview: Arc<dyn PreviewSink>) -> Self {
        self.preview = Some(preview);
        self
    }

    /// Publish the composited artifact to `sink` under `label` on every stop
    pub fn with_artifact_sink(mut self, sink: Arc<dyn ArtifactSink>, label: impl Into<String>) -> Self {
        self.composited_recording =
            RecordingSession::new(RecordingRole::Composited, label, self.settings.encoding).with_sink(sink);
        self
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub fn epoch(&self) -> u64 {
        self.state.lock().epoch
    }

    /// Most recent detection accepted for the current run
    pub fn latest_rect(&self) -> Option<Rect> {
        self.state.lock().latest_rect
    }

    pub fn raw_stream_id(&self) -> Option<Uuid> {
        self.state.lock().raw_stream.as_ref().map(MediaStream::id)
    }

    pub fn surface_dimensions(&self) -> (u32, u32) {
        self.surface.lock().dimensions()
    }

    /// Copy of the compositing surface
    pub fn snapshot(&self) -> crate::capture::Frame {
        self.surface.lock().snapshot()
    }

    pub fn raw_recording(&self) -> &RecordingSession {
        &self.raw_recording
    }

    pub fn composited_recording(&self) -> &RecordingSession {
        &self.composited_recording
    }

    pub fn preview(&self) -> Option<&Arc<dyn PreviewSink>> {
        self.preview.as_ref()
    }

    /// Acquire the camera and start both recordings
    pub async fn start(&self) -> Result<(), CameraError> {
        let _guard = self.lifecycle.lock().await;
        if self.is_running() {
            tracing::warn!("Ignoring start: camera {} is already running", self.device.label);
            return Err(CameraError::AlreadyRunning(self.device.label.clone()));
        }

        let raw_stream = self
            .acquirer
            .acquire(&MediaConstraints::for_device(self.device.id.clone()))
            .await?;
        tracing::info!("Acquired stream {} for {}", raw_stream.id(), self.device.label);

        if let Some(preview) = &self.preview {
            preview.set_source(&raw_stream);
        }

        let composited_stream = capture_surface(self.surface.clone(), self.settings.capture_fps);
        if let Err(e) = self
            .composited_recording
            .start(composited_stream.clone(), self.settings.composited_chunk_interval)
        {
            raw_stream.release();
            composited_stream.release();
            return Err(e.into());
        }

        let epoch = {
            let mut state = self.state.lock();
            state.epoch += 1;
            state.running = true;
            state.latest_rect = None;
            state.raw_stream = Some(raw_stream.clone());
            state.composited_stream = Some(composited_stream.clone());
            state.epoch
        };

        let raw_events = self.raw_recording.subscribe();
        if let Err(e) = self.raw_recording.start(raw_stream.clone(), self.settings.chunk_interval) {
            tracing::error!(
                "{} recording for {} failed to start: {}",
                self.raw_recording.role(),
                self.device.label,
                e
            );
            {
                let mut state = self.state.lock();
                state.running = false;
                state.epoch += 1;
                state.raw_stream = None;
                state.composited_stream = None;
            }
            // A start that fails leaves nothing in the results area
            if let Err(e) = self.composited_recording.abort().await {
                tracing::warn!("Failed to roll back {} recording: {}", self.composited_recording.role(), e);
            }
            raw_stream.release();
            composited_stream.release();
            return Err(e.into());
        }

        let ticker = TickLoop {
            label: self.device.label.clone(),
            epoch,
            raw_stream,
            surface: self.surface.clone(),
            compositor: self.compositor,
            detector: self.detector.clone(),
            state: self.state.clone(),
        };
        let task = tokio::spawn(ticker.run(raw_events));
        self.state.lock().tick_task = Some(task);

        tracing::info!("Camera {} recording (epoch {})", self.device.label, epoch);
        Ok(())
    }

    /// Stop both recordings and release the streams.
    ///
    /// Returns `None` if the camera was not running.
    pub async fn stop(&self) -> Result<Option<CameraArtifacts>, CameraError> {
        let _guard = self.lifecycle.lock().await;
        let (raw_stream, composited_stream, tick_task) = {
            let mut state = self.state.lock();
            if !state.running {
                tracing::debug!("Camera {} is not running, nothing to stop", self.device.label);
                return Ok(None);
            }
            // Invalidates every in-flight detection
            state.epoch += 1;
            (
                state.raw_stream.take(),
                state.composited_stream.take(),
                state.tick_task.take(),
            )
        };

        let raw = self.raw_recording.stop().await;
        let composited = self.composited_recording.stop().await;

        self.state.lock().running = false;
        if let Some(task) = tick_task {
            task.abort();
        }
        for stream in raw_stream.iter().chain(composited_stream.iter()) {
            stream.release();
        }

        let artifacts = CameraArtifacts {
            raw: raw?,
            composited: composited?,
        };
        tracing::info!(
            "Camera {} stopped: raw {} chunks, composited {} chunks",
            self.device.label,
            artifacts.raw.chunk_count,
            artifacts.composited.chunk_count
        );
        Ok(Some(artifacts))
    }
}

/// Drives compositing and detection off the raw chunk events of one run
struct TickLoop {
    label: String,
    epoch: u64,
    raw_stream: MediaStream,
    surface: SharedSurface,
    compositor: Compositor,
    detector: Arc<dyn DetectionService>,
    state: Arc<Mutex<CameraState>>,
}

impl TickLoop {
    async fn run(self, mut events: broadcast::Receiver<RecordingEvent>) {
        loop {
            match events.recv().await {
                Ok(RecordingEvent::Chunk { index, .. }) => {
                    if !self.tick(index) {
                        break;
                    }
                }
                Ok(RecordingEvent::Started { .. }) => {}
                Ok(RecordingEvent::Stopped { .. }) | Err(broadcast::error::RecvError::Closed) => break,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("{} tick loop skipped {} chunk events", self.label, skipped);
                }
            }
        }
        tracing::debug!("{} tick loop for epoch {} finished", self.label, self.epoch);
    }

    fn is_current(&self) -> bool {
        let state = self.state.lock();
        state.running && state.epoch == self.epoch
    }

    /// Returns `false` once the run this loop belongs to has ended
    fn tick(&self, chunk_index: usize) -> bool {
        if !self.is_current() {
            return false;
        }

        let (width, height) = {
            let mut surface = self.surface.lock();
            self.compositor.composite(&mut surface, &self.raw_stream, None);
            surface.dimensions()
        };

        let epoch = self.epoch;
        let label = self.label.clone();
        let detector = self.detector.clone();
        let state = self.state.clone();
        let surface = self.surface.clone();
        let compositor = self.compositor;
        let raw_stream = self.raw_stream.clone();

        tokio::spawn(async move {
            let rect = match detector.detect(width, height).await {
                Ok(rect) => rect,
                Err(e) => {
                    tracing::warn!("Detection for {} failed on tick {}: {}", label, chunk_index, e);
                    return;
                }
            };

            let mut state = state.lock();
            if state.epoch != epoch {
                tracing::debug!("Discarding detection from epoch {} (now {})", epoch, state.epoch);
                return;
            }
            state.latest_rect = Some(rect);
            let mut surface = surface.lock();
            compositor.composite(&mut surface, &raw_stream, Some(&rect));
        });

        true
    }
}
