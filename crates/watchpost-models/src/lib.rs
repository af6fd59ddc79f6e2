//! Shared data models for the Watchpost detection pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Camera identities
//! - Temporary artifact references
//! - Detections and bounding boxes
//! - Class catalog and class selections
//! - Process-wide detection settings and per-camera pipeline config
//! - The persisted application configuration file

pub mod artifact;
pub mod camera;
pub mod classes;
pub mod config;
pub mod detection;
pub mod rect;

// Re-export common types
pub use artifact::TemporaryReference;
pub use camera::{CameraId, CameraIdError};
pub use classes::{ClassSelection, UnknownClassError, VEHICLE_CLASSES};
pub use config::{AppConfig, CameraConfig, DetectionSettings, PipelineConfig};
pub use detection::Detection;
pub use rect::BoundingBox;
