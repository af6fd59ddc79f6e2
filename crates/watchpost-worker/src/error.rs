//! Worker error types.

use thiserror::Error;
use watchpost_models::{CameraId, UnknownClassError};

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Camera already exists: {0}")]
    CameraExists(CameraId),

    #[error("Camera not found: {0}")]
    CameraNotFound(CameraId),

    #[error("Failed to spawn pipeline for {camera}: {message}")]
    SpawnFailed { camera: CameraId, message: String },

    #[error(transparent)]
    UnknownClass(#[from] UnknownClassError),

    #[error("Media error: {0}")]
    Media(#[from] watchpost_media::MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] watchpost_storage::StorageError),

    #[error("Notification error: {0}")]
    Notify(#[from] watchpost_notify::NotifyError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the error was caused by the caller's input rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            WorkerError::CameraExists(_)
                | WorkerError::CameraNotFound(_)
                | WorkerError::UnknownClass(_)
        )
    }
}
