//! Overlay rendering for detections and alert state.

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::info;
use watchpost_models::{BoundingBox, ClassSelection, Detection};

use crate::error::{MediaError, MediaResult};

pub const DISPLAY_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const ALERT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const CAPTION_TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

pub const BOX_THICKNESS: u32 = 2;
pub const ALERT_BORDER_THICKNESS: u32 = 20;

const CAPTION_HEIGHT: u32 = 16;
const CAPTION_OFFSET: i32 = 10;
const CAPTION_SCALE: f32 = 14.0;

/// Result of annotating a frame.
#[derive(Debug, Clone)]
pub struct Annotation {
    /// Annotated copy of the input frame
    pub image: RgbImage,
    /// Whether an alert-class detection cleared the alert threshold
    pub alert_active: bool,
}

/// Draws detection boxes, captions and the alert border.
pub struct FrameAnnotator {
    font: Option<FontVec>,
}

impl std::fmt::Debug for FrameAnnotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameAnnotator")
            .field("font", &self.font.is_some())
            .finish()
    }
}

impl Default for FrameAnnotator {
    fn default() -> Self {
        Self { font: None }
    }
}

impl FrameAnnotator {
    /// Annotator without caption text.
    pub fn new() -> Self {
        Self::default()
    }

    /// Annotator that renders captions with a TrueType/OpenType font.
    pub fn with_font_file(path: &str) -> MediaResult<Self> {
        let bytes = std::fs::read(path)?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|e| MediaError::FontLoad(format!("{}: {}", path, e)))?;
        info!(font = %path, "Loaded caption font");
        Ok(Self { font: Some(font) })
    }

    /// Build from an optional font path.
    pub fn from_font_path(path: Option<&str>) -> MediaResult<Self> {
        match path {
            Some(path) => Self::with_font_file(path),
            None => Ok(Self::new()),
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Render overlays onto a copy of `frame`.
    pub fn annotate(
        &self,
        frame: &RgbImage,
        detections: &[Detection],
        classes: &ClassSelection,
        display_threshold: f32,
        alert_threshold: f32,
    ) -> Annotation {
        let mut image = frame.clone();
        let mut alert_active = false;

        for detection in detections {
            let alerting =
                classes.is_alert(&detection.label) && detection.passes(alert_threshold);
            let displayed =
                classes.is_displayed(&detection.label) && detection.passes(display_threshold);
            alert_active |= alerting;

            if !(alerting || displayed) {
                continue;
            }
            let color = if alerting { ALERT_COLOR } else { DISPLAY_COLOR };
            self.draw_detection(&mut image, detection, color);
        }

        if alert_active {
            draw_border(&mut image, ALERT_COLOR, ALERT_BORDER_THICKNESS);
        }

        Annotation {
            image,
            alert_active,
        }
    }

    fn draw_detection(&self, image: &mut RgbImage, detection: &Detection, color: Rgb<u8>) {
        let (width, height) = image.dimensions();
        let bbox = detection.bbox.clamped(width, height);
        let Some(rect) = to_rect(&bbox) else {
            return;
        };

        for inset in 0..BOX_THICKNESS as i32 {
            let w = rect.width() as i32 - 2 * inset;
            let h = rect.height() as i32 - 2 * inset;
            if w <= 0 || h <= 0 {
                break;
            }
            draw_hollow_rect_mut(
                image,
                Rect::at(rect.left() + inset, rect.top() + inset).of_size(w as u32, h as u32),
                color,
            );
        }

        let caption = format!("{} {:.2}", detection.label, detection.confidence);
        let caption_top = (rect.top() - CAPTION_OFFSET - CAPTION_HEIGHT as i32 / 2).max(0);
        let caption_width = match &self.font {
            Some(_) => (caption.len() as u32 * 8).max(1),
            None => rect.width(),
        };
        draw_filled_rect_mut(
            image,
            Rect::at(rect.left(), caption_top).of_size(caption_width, CAPTION_HEIGHT),
            color,
        );

        if let Some(font) = &self.font {
            draw_text_mut(
                image,
                CAPTION_TEXT_COLOR,
                rect.left() + 1,
                caption_top + 1,
                PxScale::from(CAPTION_SCALE),
                font,
                &caption,
            );
        }
    }
}

fn to_rect(bbox: &BoundingBox) -> Option<Rect> {
    let width = bbox.width().round() as u32;
    let height = bbox.height().round() as u32;
    if width == 0 || height == 0 {
        return None;
    }
    Some(Rect::at(bbox.x1.round() as i32, bbox.y1.round() as i32).of_size(width, height))
}

/// Draw a border of `thickness` pixels just inside the frame edges.
fn draw_border(image: &mut RgbImage, color: Rgb<u8>, thickness: u32) {
    let (width, height) = image.dimensions();
    let t = thickness.min(width).min(height);
    if t == 0 {
        return;
    }

    draw_filled_rect_mut(image, Rect::at(0, 0).of_size(width, t), color);
    draw_filled_rect_mut(image, Rect::at(0, (height - t) as i32).of_size(width, t), color);
    draw_filled_rect_mut(image, Rect::at(0, 0).of_size(t, height), color);
    draw_filled_rect_mut(image, Rect::at((width - t) as i32, 0).of_size(t, height), color);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> RgbImage {
        RgbImage::from_pixel(200, 100, Rgb([40, 40, 40]))
    }

    fn tank(confidence: f32) -> Detection {
        Detection::new("tank", confidence, BoundingBox::new(50.0, 40.0, 120.0, 90.0))
    }

    #[test]
    fn test_input_is_not_mutated() {
        let input = frame();
        let before = input.clone();
        let classes = ClassSelection::new(["tank"], ["tank"]);

        let annotation =
            FrameAnnotator::new().annotate(&input, &[tank(0.9)], &classes, 0.5, 0.5);

        assert_eq!(input, before);
        assert_ne!(annotation.image, input);
        assert!(annotation.alert_active);
    }

    #[test]
    fn test_alert_border_is_red() {
        let classes = ClassSelection::new(Vec::<&str>::new(), ["tank"]);
        let annotation =
            FrameAnnotator::new().annotate(&frame(), &[tank(0.9)], &classes, 0.5, 0.5);

        assert!(annotation.alert_active);
        assert_eq!(*annotation.image.get_pixel(0, 0), ALERT_COLOR);
        assert_eq!(*annotation.image.get_pixel(199, 99), ALERT_COLOR);
        assert_eq!(*annotation.image.get_pixel(19, 50), ALERT_COLOR);
        assert_eq!(*annotation.image.get_pixel(21, 50), Rgb([40, 40, 40]));
    }

    #[test]
    fn test_display_box_without_alert() {
        let classes = ClassSelection::new(["tank"], Vec::<&str>::new());
        let annotation =
            FrameAnnotator::new().annotate(&frame(), &[tank(0.9)], &classes, 0.5, 0.5);

        assert!(!annotation.alert_active);
        assert_eq!(*annotation.image.get_pixel(0, 0), Rgb([40, 40, 40]));
        assert_eq!(*annotation.image.get_pixel(50, 60), DISPLAY_COLOR);
        assert_eq!(*annotation.image.get_pixel(51, 60), DISPLAY_COLOR);
        assert_eq!(*annotation.image.get_pixel(52, 60), Rgb([40, 40, 40]));
    }

    #[test]
    fn test_below_threshold_and_unselected_are_ignored() {
        let classes = ClassSelection::new(["tank"], ["tank"]);
        let input = frame();
        let detections = vec![
            tank(0.3),
            Detection::new("car", 0.99, BoundingBox::new(10.0, 10.0, 30.0, 30.0)),
        ];

        let annotation = FrameAnnotator::new().annotate(&input, &detections, &classes, 0.5, 0.5);
        assert!(!annotation.alert_active);
        assert_eq!(annotation.image, input);
    }

    #[test]
    fn test_missing_font_file() {
        assert!(FrameAnnotator::with_font_file("/nonexistent/font.ttf").is_err());
    }
}
