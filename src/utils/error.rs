//! Error types and handling
//!
//! Aggregates the per-module errors for the control layer.

use crate::camera::CameraError;
use crate::capture::AcquisitionError;
use crate::config::ConfigError;
use crate::present::SinkError;
use crate::recorder::RecordingError;
use crate::registry::RegistryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Acquisition error: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("{0}")]
    Registry(#[from] RegistryError),

    #[error("Publish error: {0}")]
    Sink(#[from] SinkError),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),
}

/// Error response for the control console
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        let code = match &error {
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Acquisition(AcquisitionError::PermissionDenied(_))
            | AppError::Camera(CameraError::Acquisition(AcquisitionError::PermissionDenied(_))) => {
                "PERMISSION_DENIED"
            }
            AppError::Acquisition(_) | AppError::Camera(CameraError::Acquisition(_)) => "ACQUISITION_ERROR",
            AppError::Recording(_) | AppError::Camera(CameraError::Recording(_)) => "RECORDING_ERROR",
            AppError::Camera(CameraError::AlreadyRunning(_)) => "CONFLICT",
            AppError::Registry(RegistryError::NotReady) => "NOT_READY",
            AppError::Registry(RegistryError::Busy(_)) => "CONFLICT",
            AppError::Registry(RegistryError::Enumeration(_)) => "ACQUISITION_ERROR",
            AppError::Sink(_) => "PUBLISH_ERROR",
            AppError::UnknownCommand(_) => "UNKNOWN_COMMAND",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let response = ErrorResponse::from(AppError::from(RegistryError::NotReady));
        assert_eq!(response.code, "NOT_READY");
        assert_eq!(response.message, "Cameras are not ready yet");

        let denied = CameraError::from(AcquisitionError::PermissionDenied("cam".into()));
        assert_eq!(ErrorResponse::from(AppError::from(denied)).code, "PERMISSION_DENIED");

        let busy = AppError::from(CameraError::AlreadyRunning("cam".into()));
        assert_eq!(ErrorResponse::from(busy).code, "CONFLICT");
    }
}
