//! Directory of still images played back as a video.

use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::{debug, info};

use super::{ensure_exists, FrameSource, ReadError};
use crate::error::{MediaError, MediaResult};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Plays the images of a directory in file-name order.
pub struct ImageSequenceSource {
    frames: Vec<PathBuf>,
    position: usize,
}

impl ImageSequenceSource {
    /// Open a directory; fails if it holds no supported images.
    pub fn open(dir: impl AsRef<Path>) -> MediaResult<Self> {
        let dir = dir.as_ref();
        ensure_exists(dir)?;

        let mut frames: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_image(path))
            .collect();
        frames.sort();

        if frames.is_empty() {
            return Err(MediaError::source_unavailable(format!(
                "{} contains no images",
                dir.display()
            )));
        }

        info!(dir = %dir.display(), frames = frames.len(), "Opened image sequence");
        Ok(Self { frames, position: 0 })
    }

    /// Number of frames in the sequence.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn read_frame(&mut self) -> Result<RgbImage, ReadError> {
        let path = self.frames.get(self.position).ok_or(ReadError::EndOfStream)?;
        self.position += 1;

        image::open(path)
            .map(|img| img.to_rgb8())
            .map_err(|e| ReadError::transient(format!("{}: {}", path.display(), e)))
    }

    fn close(&mut self) {
        debug!(read = self.position, "Closing image sequence");
        self.frames.clear();
    }
}
