//! OpenCV `VideoCapture` source for devices, streams and video files.

use image::RgbImage;
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};
use tracing::{info, warn};
use watchpost_models::CameraId;

use super::{is_live, FrameSource, ReadError};
use crate::error::{MediaError, MediaResult};

/// Capture handle backed by OpenCV.
pub struct CaptureSource {
    capture: VideoCapture,
    camera: CameraId,
    /// Devices and network streams never end; an empty read is a hiccup.
    live: bool,
}

impl CaptureSource {
    /// Open a device index, stream URI or video file.
    pub fn open(camera: &CameraId) -> MediaResult<Self> {
        let capture = match camera {
            CameraId::Device(index) => VideoCapture::new(*index, videoio::CAP_ANY),
            CameraId::Uri(uri) => VideoCapture::from_file(uri, videoio::CAP_ANY),
        }
        .map_err(|e| MediaError::source_unavailable(format!("{}: {}", camera, e)))?;

        if !capture.is_opened().unwrap_or(false) {
            return Err(MediaError::source_unavailable(format!(
                "Could not open camera {}",
                camera
            )));
        }

        let live = is_live(camera);

        info!(camera = %camera, live, "Opened capture source");
        Ok(Self {
            capture,
            camera: camera.clone(),
            live,
        })
    }
}

impl FrameSource for CaptureSource {
    fn read_frame(&mut self) -> Result<RgbImage, ReadError> {
        let mut frame = Mat::default();
        let ok = self
            .capture
            .read(&mut frame)
            .map_err(|e| ReadError::transient(e.to_string()))?;

        if !ok || frame.empty() {
            return Err(if self.live {
                ReadError::transient("empty frame")
            } else {
                ReadError::EndOfStream
            });
        }

        bgr_to_rgb_image(&frame).map_err(|e| ReadError::transient(e.to_string()))
    }

    fn close(&mut self) {
        if let Err(e) = self.capture.release() {
            warn!(camera = %self.camera, "Failed to release capture: {}", e);
        }
    }
}

/// Convert an OpenCV BGR frame to an `RgbImage`.
fn bgr_to_rgb_image(frame: &Mat) -> MediaResult<RgbImage> {
    let mut rgb = Mat::default();
    imgproc::cvt_color_def(frame, &mut rgb, imgproc::COLOR_BGR2RGB)
        .map_err(|e| MediaError::internal(format!("BGR to RGB: {}", e)))?;

    let width = rgb.cols() as u32;
    let height = rgb.rows() as u32;
    let data = rgb
        .data_bytes()
        .map_err(|e| MediaError::internal(format!("Frame bytes: {}", e)))?
        .to_vec();

    RgbImage::from_raw(width, height, data)
        .ok_or_else(|| MediaError::internal("Failed to create image buffer"))
}
