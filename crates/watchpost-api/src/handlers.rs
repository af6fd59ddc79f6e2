//! Request handlers.

pub mod alerts;
pub mod cameras;
pub mod health;
pub mod recipients;

pub use alerts::*;
pub use cameras::*;
pub use health::*;
pub use recipients::*;

use watchpost_models::CameraId;

use crate::error::{ApiError, ApiResult};

/// Run supervisor work that joins threads off the async runtime.
pub(crate) async fn blocking<T, F>(work: F) -> ApiResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::internal(format!("blocking task failed: {}", e)))
}

/// Parse a camera path segment: an integer is a device index, anything else a URI.
pub(crate) fn parse_camera(raw: &str) -> ApiResult<CameraId> {
    raw.parse::<CameraId>()
        .map_err(|e| ApiError::bad_request(e.to_string()))
}
