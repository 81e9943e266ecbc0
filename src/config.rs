//! Application configuration
//!
//! Loaded from an optional JSON file; every field has a default so an empty
//! object (or no file at all) is a valid configuration.

use crate::camera::CameraSettings;
use crate::capture::Resolution;
use crate::compositor::{Color, Compositor};
use crate::recorder::ChunkEncoding;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Where camera devices come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Synthetic,
    Webcam,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub chunk_interval_ms: u64,
    pub composited_chunk_interval_ms: u64,
    pub capture_fps: u32,
    pub detection_latency_ms: u64,
    /// Fixed RNG seed for reproducible detections
    pub detection_seed: Option<u64>,
    pub encoding: ChunkEncoding,
    pub highlight_color: String,
    pub line_width: u32,
    /// Surface size for devices that report no capabilities
    pub default_surface: Resolution,
    pub output_dir: PathBuf,
    pub artifact_stem: String,
    pub backend: BackendKind,
    pub synthetic_cameras: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            chunk_interval_ms: 10,
            composited_chunk_interval_ms: 10,
            capture_fps: 60,
            detection_latency_ms: 100,
            detection_seed: None,
            encoding: ChunkEncoding::Png,
            highlight_color: "#f00".to_string(),
            line_width: 2,
            default_surface: Resolution::new(640, 480),
            output_dir: PathBuf::from("recordings"),
            artifact_stem: "acetest".to_string(),
            backend: BackendKind::Synthetic,
            synthetic_cameras: 1,
        }
    }
}

impl AppConfig {
    /// Read `path` if given, otherwise start from defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                let config: AppConfig = serde_json::from_str(&content)?;
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            None => AppConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("chunkIntervalMs", self.chunk_interval_ms),
            ("compositedChunkIntervalMs", self.composited_chunk_interval_ms),
            ("captureFps", self.capture_fps as u64),
            ("lineWidth", self.line_width as u64),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        if self.default_surface.width == 0 || self.default_surface.height == 0 {
            return Err(ConfigError::Invalid {
                field: "defaultSurface",
                reason: format!(
                    "{}x{} has an empty dimension",
                    self.default_surface.width, self.default_surface.height
                ),
            });
        }

        if self.artifact_stem.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "artifactStem",
                reason: "must not be empty".to_string(),
            });
        }

        self.highlight()?;
        Ok(())
    }

    fn highlight(&self) -> Result<Color, ConfigError> {
        Color::parse_hex(&self.highlight_color).map_err(|e| ConfigError::Invalid {
            field: "highlightColor",
            reason: e.to_string(),
        })
    }

    pub fn camera_settings(&self) -> CameraSettings {
        CameraSettings {
            chunk_interval: Duration::from_millis(self.chunk_interval_ms),
            composited_chunk_interval: Duration::from_millis(self.composited_chunk_interval_ms),
            capture_fps: self.capture_fps,
            encoding: self.encoding,
        }
    }

    pub fn detection_latency(&self) -> Duration {
        Duration::from_millis(self.detection_latency_ms)
    }

    pub fn compositor(&self) -> Result<Compositor, ConfigError> {
        Ok(Compositor::new(self.highlight()?, self.line_width))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.chunk_interval_ms, 10);
        assert_eq!(config.capture_fps, 60);
        assert_eq!(config.artifact_stem, "acetest");
        assert_eq!(config.default_surface, Resolution::new(640, 480));
        assert_eq!(config.compositor().unwrap(), Compositor::default());

        let settings = config.camera_settings();
        assert_eq!(settings.chunk_interval, Duration::from_millis(10));
        assert_eq!(settings.encoding, ChunkEncoding::Png);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "chunkIntervalMs": 20, "encoding": "raw", "backend": "webcam", "detectionSeed": 9 }"#,
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.chunk_interval_ms, 20);
        assert_eq!(config.encoding, ChunkEncoding::Raw);
        assert_eq!(config.backend, BackendKind::Webcam);
        assert_eq!(config.detection_seed, Some(9));
        assert_eq!(config.composited_chunk_interval_ms, 10);
        assert_eq!(config.highlight_color, "#f00");
    }

    #[test]
    fn test_rejects_bad_values() {
        let config = AppConfig {
            chunk_interval_ms: 0,
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "chunkIntervalMs",
                ..
            })
        ));

        let config = AppConfig {
            highlight_color: "red".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "highlightColor",
                ..
            })
        ));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempdir().unwrap();
        let err = AppConfig::load(Some(&dir.path().join("missing.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
