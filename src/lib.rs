//! Overlay Recorder - camera recordings with a live detection overlay.
//!
//! This is the main library crate. For every camera it records the raw feed
//! and a composited copy with the latest detection rectangle drawn on top,
//! and publishes the composited recording as a downloadable artifact.

pub mod camera;
pub mod capture;
pub mod commands;
pub mod compositor;
pub mod config;
pub mod detection;
pub mod present;
pub mod recorder;
pub mod registry;
pub mod utils;

use anyhow::Context;
use capture::{DeviceEnumerator, MediaAcquirer, SyntheticDevices};
use commands::{run_console, start_recording, stop_recording, ControlState};
use config::{AppConfig, BackendKind};
use detection::SimulatedDetector;
use present::DirectorySink;
use registry::{RegistryConfig, SessionRegistry};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "overlay_recorder=debug,overlay_recorder_lib=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn device_backend(config: &AppConfig) -> anyhow::Result<(Arc<dyn DeviceEnumerator>, Arc<dyn MediaAcquirer>)> {
    match config.backend {
        BackendKind::Synthetic => {
            let devices = Arc::new(SyntheticDevices::new(config.synthetic_cameras));
            Ok((devices.clone(), devices))
        }
        #[cfg(feature = "webcam")]
        BackendKind::Webcam => {
            let devices = Arc::new(capture::WebcamDevices::new());
            Ok((devices.clone(), devices))
        }
        #[cfg(not(feature = "webcam"))]
        BackendKind::Webcam => anyhow::bail!("webcam backend requested but built without the `webcam` feature"),
    }
}

/// Wire a registry from `config`
pub fn build_registry(config: &AppConfig) -> anyhow::Result<SessionRegistry> {
    let (enumerator, acquirer) = device_backend(config)?;

    let detector = match config.detection_seed {
        Some(seed) => SimulatedDetector::with_seed(seed, config.detection_latency()),
        None => SimulatedDetector::new(config.detection_latency()),
    };

    let registry_config = RegistryConfig {
        settings: config.camera_settings(),
        default_surface: config.default_surface,
        compositor: config.compositor()?,
        attach_previews: true,
    };

    let sink = Arc::new(DirectorySink::new(&config.output_dir, config.artifact_stem.clone()));
    Ok(SessionRegistry::new(enumerator, acquirer, Arc::new(detector), registry_config).with_sink(sink))
}

/// Run the recorder.
///
/// With a `duration` the cameras record once for that long; otherwise
/// commands are read from stdin.
pub async fn run(config: AppConfig, duration: Option<Duration>) -> anyhow::Result<()> {
    tracing::info!("Starting Overlay Recorder v{}", env!("CARGO_PKG_VERSION"));

    let registry = Arc::new(build_registry(&config)?);
    let state = ControlState::new(registry.clone());

    // Cameras are prepared in the background; `start` before that is rejected
    let preparing = tokio::spawn(async move { registry.prepare().await });

    match duration {
        Some(duration) => {
            let cameras = preparing.await?.context("failed to prepare cameras")?;
            if cameras.is_empty() {
                tracing::warn!("No cameras found");
                return Ok(());
            }

            start_recording(&state).await?;
            tokio::time::sleep(duration).await;
            let summary = stop_recording(&state).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        None => {
            tokio::spawn(async move {
                match preparing.await {
                    Ok(Ok(cameras)) => tracing::info!("{} camera(s) ready", cameras.len()),
                    Ok(Err(e)) => tracing::error!("Failed to prepare cameras: {}", e),
                    Err(e) => tracing::error!("Prepare task failed: {}", e),
                }
            });

            println!("Commands: start | stop | status | quit");
            run_console(&state, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?;
        }
    }

    tracing::info!("Overlay Recorder finished");
    Ok(())
}
