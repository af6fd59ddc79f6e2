//! Frame sources.
//!
//! A `FrameSource` yields RGB frames from a camera device, a stream, a video
//! file or a directory of images. Read failures are split into two kinds:
//! `Transient` (device hiccup, the caller backs off and retries) and
//! `EndOfStream` (file-backed sources only, terminal).

mod image_sequence;

#[cfg(feature = "opencv")]
mod capture;

use std::path::Path;

use image::RgbImage;
use thiserror::Error;
use watchpost_models::CameraId;

use crate::error::{MediaError, MediaResult};

#[cfg(feature = "opencv")]
pub use capture::CaptureSource;
pub use image_sequence::ImageSequenceSource;

/// Failure of a single frame read.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReadError {
    /// The source has no more frames.
    #[error("End of stream")]
    EndOfStream,

    /// The read failed but the source is still usable.
    #[error("Transient read error: {0}")]
    Transient(String),
}

impl ReadError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReadError::EndOfStream)
    }
}

/// An open capture handle.
pub trait FrameSource: Send {
    /// Read the next frame.
    fn read_frame(&mut self) -> Result<RgbImage, ReadError>;

    /// Release the underlying device or file. Called once, before drop.
    fn close(&mut self);
}

/// Opens frame sources for camera identities.
pub trait SourceOpener: Send + Sync {
    fn open(&self, camera: &CameraId) -> MediaResult<Box<dyn FrameSource>>;
}

/// Opens image directories as image sequences and everything else through OpenCV.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSourceOpener;

impl SourceOpener for DefaultSourceOpener {
    fn open(&self, camera: &CameraId) -> MediaResult<Box<dyn FrameSource>> {
        match camera {
            CameraId::Uri(uri) if Path::new(uri).is_dir() => {
                Ok(Box::new(ImageSequenceSource::open(uri)?))
            }
            _ => open_capture(camera),
        }
    }
}

#[cfg(feature = "opencv")]
fn open_capture(camera: &CameraId) -> MediaResult<Box<dyn FrameSource>> {
    Ok(Box::new(CaptureSource::open(camera)?))
}

#[cfg(not(feature = "opencv"))]
fn open_capture(camera: &CameraId) -> MediaResult<Box<dyn FrameSource>> {
    Err(MediaError::UnsupportedSource(format!(
        "{} (built without the opencv feature)",
        camera
    )))
}

/// URI schemes of network streams, which never reach end of stream.
const LIVE_SCHEMES: &[&str] = &["rtsp", "rtsps", "rtmp", "http", "https", "udp", "tcp", "srt"];

/// Devices and network streams are live; files (including `file://` URIs) end.
pub fn is_live(camera: &CameraId) -> bool {
    match camera {
        CameraId::Device(_) => true,
        CameraId::Uri(uri) => uri
            .split_once("://")
            .map(|(scheme, _)| {
                LIVE_SCHEMES
                    .iter()
                    .any(|live| scheme.eq_ignore_ascii_case(live))
            })
            .unwrap_or(false),
    }
}

/// Missing paths are reported as unavailable sources rather than decode errors.
pub(crate) fn ensure_exists(path: &Path) -> MediaResult<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(MediaError::FileNotFound(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_error_kinds() {
        assert!(ReadError::EndOfStream.is_terminal());
        assert!(!ReadError::transient("usb reset").is_terminal());
    }

    #[test]
    fn test_only_devices_and_network_streams_are_live() {
        assert!(is_live(&CameraId::device(0)));
        assert!(is_live(&CameraId::uri("rtsp://10.0.0.5/stream1")));
        assert!(is_live(&CameraId::uri("HTTP://cam.local/mjpeg")));
        assert!(!is_live(&CameraId::uri("file:///var/clips/clip.mp4")));
        assert!(!is_live(&CameraId::uri("/var/clips/clip.mp4")));
        assert!(!is_live(&CameraId::uri("clip.mp4")));
    }

    #[test]
    fn test_default_opener_uses_image_sequence_for_directories() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::new(4, 4)
            .save(dir.path().join("0001.png"))
            .unwrap();

        let camera = CameraId::uri(dir.path().to_string_lossy());
        let mut source = DefaultSourceOpener.open(&camera).unwrap();
        assert!(source.read_frame().is_ok());
        assert_eq!(source.read_frame(), Err(ReadError::EndOfStream));
        source.close();
    }
}
