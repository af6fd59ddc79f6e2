//! Camera identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifies a capture source: a local device index or a URI / file path.
///
/// Serialized untagged, so `0` is a device and `"rtsp://..."` is a URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CameraId {
    /// Local capture device index
    Device(i32),
    /// Stream URI, video file path or image directory
    Uri(String),
}

impl CameraId {
    /// Create a device camera id.
    pub fn device(index: i32) -> Self {
        Self::Device(index)
    }

    /// Create a URI camera id.
    pub fn uri(uri: impl Into<String>) -> Self {
        Self::Uri(uri.into())
    }

    /// Returns true for local capture devices.
    pub fn is_device(&self) -> bool {
        matches!(self, CameraId::Device(_))
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraId::Device(index) => write!(f, "{}", index),
            CameraId::Uri(uri) => write!(f, "{}", uri),
        }
    }
}

/// Error returned when parsing an empty camera id.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Camera id must not be empty")]
pub struct CameraIdError;

impl FromStr for CameraId {
    type Err = CameraIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CameraIdError);
        }
        Ok(match s.parse::<i32>() {
            Ok(index) => CameraId::Device(index),
            Err(_) => CameraId::Uri(s.to_string()),
        })
    }
}

impl From<i32> for CameraId {
    fn from(index: i32) -> Self {
        Self::Device(index)
    }
}
