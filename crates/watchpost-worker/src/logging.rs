//! Structured camera logging utilities.
//!
//! Provides consistent, structured logging for pipeline and dispatcher
//! lifecycles, plus the subscriber setup shared by the binaries.

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use watchpost_models::CameraId;

/// Camera logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct CameraLogger {
    camera: String,
    operation: String,
}

impl CameraLogger {
    /// Create a logger for a camera and operation (e.g. "pipeline", "dispatch").
    pub fn new(camera: &CameraId, operation: &str) -> Self {
        Self {
            camera: camera.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            camera = %self.camera,
            operation = %self.operation,
            "Camera started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            camera = %self.camera,
            operation = %self.operation,
            "Camera progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            camera = %self.camera,
            operation = %self.operation,
            "Camera warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            camera = %self.camera,
            operation = %self.operation,
            "Camera error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            camera = %self.camera,
            operation = %self.operation,
            "Camera stopped: {}", message
        );
    }

    pub fn camera(&self) -> &str {
        &self.camera
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span entered by the pipeline thread for its whole lifetime.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "camera",
            camera = %self.camera,
            operation = %self.operation
        )
    }
}

/// Initialize tracing: JSON when `LOG_FORMAT=json`, ANSI text otherwise.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("watchpost=info,tower_http=info,ort=warn"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_names(true)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_logger_creation() {
        let logger = CameraLogger::new(&CameraId::device(0), "pipeline");
        assert_eq!(logger.camera(), "0");
        assert_eq!(logger.operation(), "pipeline");

        let logger = CameraLogger::new(&CameraId::uri("rtsp://gate/1"), "dispatch");
        assert_eq!(logger.camera(), "rtsp://gate/1");
    }
}
