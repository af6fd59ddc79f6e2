//! Object detection for camera frames.
//!
//! `Detector` is the seam the camera pipelines call once per sampled frame.
//! Detectors are created per pipeline through a `DetectorProvider`, so each
//! pipeline thread owns its own inference session.

pub mod object_detector;

use std::sync::Arc;

use image::RgbImage;
use watchpost_models::{Detection, DetectionSettings};

use crate::error::MediaResult;

pub use object_detector::{ObjectDetector, ObjectDetectorConfig};

/// Runs object detection on a single frame.
pub trait Detector: Send {
    /// Detect objects in `frame`, keeping candidates at or above `min_confidence`.
    ///
    /// Results are in frame pixel coordinates, sorted by descending confidence.
    fn detect(&self, frame: &RgbImage, min_confidence: f32) -> MediaResult<Vec<Detection>>;

    /// Detector name for logging.
    fn name(&self) -> &'static str;
}

/// Creates detectors for new pipelines.
pub trait DetectorProvider: Send + Sync {
    fn create(&self) -> MediaResult<Box<dyn Detector>>;
}

impl<F> DetectorProvider for F
where
    F: Fn() -> MediaResult<Box<dyn Detector>> + Send + Sync,
{
    fn create(&self) -> MediaResult<Box<dyn Detector>> {
        self()
    }
}

/// Loads an `ObjectDetector` from the configured ONNX model.
#[derive(Debug, Clone)]
pub struct OnnxDetectorProvider {
    config: Arc<ObjectDetectorConfig>,
}

impl OnnxDetectorProvider {
    pub fn new(config: ObjectDetectorConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn from_settings(settings: &DetectionSettings) -> Self {
        Self::new(ObjectDetectorConfig::from_settings(settings))
    }

    pub fn config(&self) -> &ObjectDetectorConfig {
        &self.config
    }
}

impl DetectorProvider for OnnxDetectorProvider {
    fn create(&self) -> MediaResult<Box<dyn Detector>> {
        Ok(Box::new(ObjectDetector::new((*self.config).clone())?))
    }
}
