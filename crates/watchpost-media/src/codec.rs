//! JPEG encoding for snapshots and frame previews.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

use crate::error::MediaResult;

pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Encode an RGB frame as JPEG.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> MediaResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode_image(image)?;
    Ok(buf.into_inner())
}
