//! Artifact sinks
//!
//! Where finalized composited recordings are published: a results directory
//! on disk, or an in-memory list.

use crate::recorder::encoder::{encode_png, ARTIFACT_EXTENSION};
use crate::recorder::state::{Artifact, RecordingRole};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A labelled, downloadable reference to an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLink {
    pub label: String,
    pub href: String,
    pub file_name: String,
}

/// Receives finalized artifacts
pub trait ArtifactSink: Send + Sync {
    /// Remove previously published results
    fn reset(&self) -> Result<(), SinkError>;

    /// Publish an artifact under `label`
    fn publish(&self, artifact: &Artifact, label: &str) -> Result<DownloadLink, SinkError>;
}

/// Sidecar written next to every published artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactManifest {
    pub id: Uuid,
    pub label: String,
    pub role: RecordingRole,
    pub mime_type: String,
    pub chunk_count: usize,
    pub byte_len: usize,
    pub duration_ms: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub file_name: String,
    pub poster: Option<String>,
}

/// Writes artifacts, poster images and manifests into a results directory
pub struct DirectorySink {
    dir: PathBuf,
    stem: String,
    state: Mutex<DirectoryState>,
}

#[derive(Default)]
struct DirectoryState {
    published: Vec<PathBuf>,
    counter: usize,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.into(),
            state: Mutex::new(DirectoryState::default()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Files currently published (artifacts, posters and manifests)
    pub fn published_files(&self) -> Vec<PathBuf> {
        self.state.lock().published.clone()
    }

    fn write_poster(&self, artifact: &Artifact, path: &Path) -> Option<String> {
        let frames = match artifact.frames() {
            Ok(frames) => frames,
            Err(e) => {
                tracing::warn!("Cannot decode artifact {} for poster: {}", artifact.id, e);
                return None;
            }
        };
        let first = frames.first()?;

        let result = encode_png(&first.frame)
            .map_err(|e| e.to_string())
            .and_then(|png| fs::write(path, png).map_err(|e| e.to_string()));

        match result {
            Ok(()) => path.file_name().map(|n| n.to_string_lossy().to_string()),
            Err(e) => {
                tracing::warn!("Failed to write poster {:?}: {}", path, e);
                None
            }
        }
    }
}

impl ArtifactSink for DirectorySink {
    fn reset(&self) -> Result<(), SinkError> {
        let mut state = self.state.lock();
        for path in state.published.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        tracing::debug!("Cleared published results in {:?}", self.dir);
        Ok(())
    }

    fn publish(&self, artifact: &Artifact, label: &str) -> Result<DownloadLink, SinkError> {
        fs::create_dir_all(&self.dir)?;

        let mut state = self.state.lock();
        state.counter += 1;
        let base = format!("{}-{}", self.stem, state.counter);

        let file_name = format!("{}.{}", base, ARTIFACT_EXTENSION);
        let artifact_path = self.dir.join(&file_name);
        fs::write(&artifact_path, artifact.bytes())?;
        state.published.push(artifact_path.clone());

        let poster_path = self.dir.join(format!("{}.png", base));
        let poster = self.write_poster(artifact, &poster_path);
        if poster.is_some() {
            state.published.push(poster_path);
        }

        let manifest = ArtifactManifest {
            id: artifact.id,
            label: label.to_string(),
            role: artifact.role,
            mime_type: artifact.mime_type.clone(),
            chunk_count: artifact.chunk_count,
            byte_len: artifact.len(),
            duration_ms: artifact.duration_ms(),
            started_at: artifact.started_at,
            finished_at: artifact.finished_at,
            file_name: file_name.clone(),
            poster,
        };
        let manifest_path = self.dir.join(format!("{}.json", base));
        fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)?;
        state.published.push(manifest_path);

        let href = file_href(&fs::canonicalize(&artifact_path).unwrap_or(artifact_path));

        tracing::info!(
            "Published '{}' ({} bytes, {} chunks) to {}",
            label,
            artifact.len(),
            artifact.chunk_count,
            href
        );

        Ok(DownloadLink {
            label: label.to_string(),
            href,
            file_name,
        })
    }
}

/// Keeps published artifacts in memory
#[derive(Default)]
pub struct MemorySink {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    published: Vec<(String, Artifact)>,
    resets: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Published `(label, artifact)` pairs, oldest first
    pub fn published(&self) -> Vec<(String, Artifact)> {
        self.state.lock().published.clone()
    }

    pub fn reset_count(&self) -> usize {
        self.state.lock().resets
    }
}

impl ArtifactSink for MemorySink {
    fn reset(&self) -> Result<(), SinkError> {
        let mut state = self.state.lock();
        state.published.clear();
        state.resets += 1;
        Ok(())
    }

    fn publish(&self, artifact: &Artifact, label: &str) -> Result<DownloadLink, SinkError> {
        self.state
            .lock()
            .published
            .push((label.to_string(), artifact.clone()));

        Ok(DownloadLink {
            label: label.to_string(),
            href: format!("memory://{}", artifact.id),
            file_name: format!("{}.{}", artifact.id, ARTIFACT_EXTENSION),
        })
    }
}

/// Build a percent-encoded `file://` URL for `path`
pub fn file_href(path: &Path) -> String {
    let segments: Vec<String> = path
        .components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(urlencoding::encode(&segment.to_string_lossy()).into_owned()),
            _ => None,
        })
        .collect();
    format!("file:///{}", segments.join("/"))
}
