//! Detection results.

use serde::{Deserialize, Serialize};

use crate::rect::BoundingBox;

/// A single detected object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Class label as named by the model's class list
    pub label: String,
    /// Detection confidence [0, 1]
    pub confidence: f32,
    /// Box in frame pixel coordinates
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }

    /// Whether the detection clears a post-filter threshold (inclusive).
    pub fn passes(&self, threshold: f32) -> bool {
        self.confidence >= threshold
    }
}
