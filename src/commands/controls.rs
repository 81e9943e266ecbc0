//! Start/stop/status handlers
//!
//! The user-facing controls map 1:1 onto the registry's fan-out operations.

use crate::registry::{CameraOutcome, CameraStatus, SessionRegistry};
use crate::utils::error::AppResult;
use serde::Serialize;
use std::sync::Arc;

/// Application state for the controls
#[derive(Clone)]
pub struct ControlState {
    pub registry: Arc<SessionRegistry>,
}

impl ControlState {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }
}

/// Per-camera result of a control action
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraReport {
    pub index: usize,
    pub device_id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Composited/raw sizes of one stopped camera
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoppedCamera {
    pub index: usize,
    pub device_id: String,
    pub raw_chunks: usize,
    pub raw_bytes: usize,
    pub composited_chunks: usize,
    pub composited_bytes: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopSummary {
    pub stopped: Vec<StoppedCamera>,
    pub errors: Vec<CameraReport>,
}

fn report<T>(outcome: &CameraOutcome<T>) -> CameraReport {
    CameraReport {
        index: outcome.index,
        device_id: outcome.device_id.clone(),
        ok: outcome.result.is_ok(),
        error: outcome.result.as_ref().err().map(|e| e.to_string()),
    }
}

/// Start recording on every prepared camera
pub async fn start_recording(state: &ControlState) -> AppResult<Vec<CameraReport>> {
    let outcomes = state.registry.start_all().await?;
    Ok(outcomes.iter().map(report).collect())
}

/// Stop every camera and collect the artifacts' sizes
pub async fn stop_recording(state: &ControlState) -> AppResult<StopSummary> {
    let mut summary = StopSummary::default();
    for outcome in state.registry.stop_all().await {
        match &outcome.result {
            Ok(Some(artifacts)) => summary.stopped.push(StoppedCamera {
                index: outcome.index,
                device_id: outcome.device_id.clone(),
                raw_chunks: artifacts.raw.chunk_count,
                raw_bytes: artifacts.raw.len(),
                composited_chunks: artifacts.composited.chunk_count,
                composited_bytes: artifacts.composited.len(),
            }),
            Ok(None) => {}
            Err(_) => summary.errors.push(report(&outcome)),
        }
    }
    Ok(summary)
}

/// Snapshot of every camera
pub async fn get_cameras(state: &ControlState) -> AppResult<Vec<CameraStatus>> {
    Ok(state.registry.status().await)
}
