//! Capture, detection and overlay rendering for camera frames.
//!
//! This crate provides:
//! - Frame sources (OpenCV capture for devices/streams/files, image sequences)
//! - A pluggable `Detector` with a YOLOv8 ONNX implementation
//! - `FrameAnnotator` for detection boxes and the alert border
//! - JPEG encoding

pub mod annotate;
pub mod codec;
pub mod detection;
pub mod error;
pub mod source;

pub use annotate::{Annotation, FrameAnnotator};
pub use codec::{encode_jpeg, DEFAULT_JPEG_QUALITY, JPEG_CONTENT_TYPE};
pub use detection::{
    Detector, DetectorProvider, ObjectDetector, ObjectDetectorConfig, OnnxDetectorProvider,
};
pub use error::{MediaError, MediaResult};
pub use source::{
    is_live, DefaultSourceOpener, FrameSource, ImageSequenceSource, ReadError, SourceOpener,
};

pub use image::RgbImage;
