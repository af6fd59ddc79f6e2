//! Object detection using a YOLOv8-format ONNX model.
//!
//! Supports GPU acceleration where available:
//! - CUDA on Linux with NVIDIA GPU
//! - CoreML on macOS with Apple Silicon
//! - CPU fallback on all platforms

use std::path::Path;
use std::sync::Mutex;

use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};
use watchpost_models::{BoundingBox, Detection, DetectionSettings, VEHICLE_CLASSES};

use super::Detector;
use crate::error::{MediaError, MediaResult};

/// Configuration for object detection.
#[derive(Debug, Clone)]
pub struct ObjectDetectorConfig {
    /// Path to ONNX model file
    pub model_path: String,
    /// Class names in model output order
    pub class_names: Vec<String>,
    /// IoU threshold for NMS
    pub nms_threshold: f32,
    /// Input image size (model expects square input)
    pub input_size: u32,
}

impl Default for ObjectDetectorConfig {
    fn default() -> Self {
        Self {
            model_path: "models/vehicles.onnx".to_string(),
            class_names: VEHICLE_CLASSES.iter().map(|s| s.to_string()).collect(),
            nms_threshold: 0.45,
            input_size: 640,
        }
    }
}

impl ObjectDetectorConfig {
    pub fn from_settings(settings: &DetectionSettings) -> Self {
        Self {
            model_path: settings.model_path.clone(),
            class_names: settings.class_names.clone(),
            nms_threshold: settings.nms_threshold,
            input_size: settings.input_size,
        }
    }
}

/// Object detector backed by ONNX Runtime.
pub struct ObjectDetector {
    session: Mutex<Session>,
    config: ObjectDetectorConfig,
}

impl ObjectDetector {
    /// Load the model. Fails if the file is missing or cannot be parsed.
    pub fn new(config: ObjectDetectorConfig) -> MediaResult<Self> {
        let model_path = Path::new(&config.model_path);
        if !model_path.exists() {
            return Err(MediaError::model_not_found(&config.model_path));
        }
        if config.class_names.is_empty() {
            return Err(MediaError::internal("Detector needs at least one class name"));
        }

        let session = Mutex::new(create_session(model_path)?);
        info!(
            model_path = %config.model_path,
            classes = config.class_names.len(),
            input_size = config.input_size,
            "Object detector initialized"
        );

        Ok(Self { session, config })
    }

    pub fn config(&self) -> &ObjectDetectorConfig {
        &self.config
    }

    /// Resize to the model input and lay out as normalized NCHW.
    fn preprocess(&self, frame: &RgbImage) -> MediaResult<Value> {
        let size = self.config.input_size;
        let resized = image::imageops::resize(frame, size, size, FilterType::Triangle);
        let (w, h) = (size as usize, size as usize);

        let mut chw_data: Vec<f32> = Vec::with_capacity(3 * h * w);
        for c in 0..3 {
            for pixel in resized.pixels() {
                chw_data.push(pixel[c] as f32 / 255.0);
            }
        }

        let shape = vec![1usize, 3, h, w];
        Tensor::from_array((shape, chw_data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| MediaError::detection_failed(format!("Failed to create tensor: {}", e)))
    }

    fn run_inference(&self, input: Value) -> MediaResult<Vec<f32>> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| MediaError::internal("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| MediaError::detection_failed(format!("ONNX inference failed: {}", e)))?;

        let output = outputs
            .get("output0")
            .ok_or_else(|| MediaError::detection_failed("Missing output0 tensor"))?;

        let tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| MediaError::detection_failed(format!("Failed to extract tensor: {}", e)))?;

        Ok(tensor.1.iter().copied().collect())
    }
}

impl Detector for ObjectDetector {
    fn detect(&self, frame: &RgbImage, min_confidence: f32) -> MediaResult<Vec<Detection>> {
        let (width, height) = frame.dimensions();
        let input = self.preprocess(frame)?;
        let outputs = self.run_inference(input)?;

        let candidates = decode_output(
            &outputs,
            self.config.class_names.len(),
            self.config.input_size,
            (width, height),
            min_confidence,
        )?;
        let kept = non_maximum_suppression(candidates, self.config.nms_threshold);

        let detections: Vec<Detection> = kept
            .into_iter()
            .map(|c| Detection::new(self.label_for(c.class_id), c.confidence, c.bbox))
            .collect();

        debug!(count = detections.len(), "Object detection completed");
        Ok(detections)
    }

    fn name(&self) -> &'static str {
        "onnx"
    }
}

impl ObjectDetector {
    fn label_for(&self, class_id: usize) -> String {
        self.config
            .class_names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class_id))
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    class_id: usize,
    confidence: f32,
    bbox: BoundingBox,
}

/// Parse a `[1, 4 + classes, boxes]` YOLOv8 output into frame-space candidates.
fn decode_output(
    outputs: &[f32],
    num_classes: usize,
    input_size: u32,
    (orig_width, orig_height): (u32, u32),
    min_confidence: f32,
) -> MediaResult<Vec<Candidate>> {
    let num_features = 4 + num_classes;
    if outputs.is_empty() || outputs.len() % num_features != 0 {
        return Err(MediaError::detection_failed(format!(
            "Unexpected output size {} for {} classes",
            outputs.len(),
            num_classes
        )));
    }
    let num_boxes = outputs.len() / num_features;

    // [features, boxes] -> [boxes, features]
    let output_array = Array::from_shape_vec((num_features, num_boxes), outputs.to_vec())
        .map_err(|e| MediaError::detection_failed(format!("Failed to reshape output: {}", e)))?;
    let transposed = output_array.t();

    let scale_w = orig_width as f32 / input_size as f32;
    let scale_h = orig_height as f32 / input_size as f32;

    let mut candidates = Vec::new();
    for i in 0..num_boxes {
        let mut best_class = 0;
        let mut best_score = 0.0f32;
        for c in 0..num_classes {
            let score = transposed[[i, 4 + c]];
            if score > best_score {
                best_score = score;
                best_class = c;
            }
        }

        if best_score < min_confidence {
            continue;
        }

        let cx = transposed[[i, 0]];
        let cy = transposed[[i, 1]];
        let w = transposed[[i, 2]];
        let h = transposed[[i, 3]];

        let bbox = BoundingBox::new(
            (cx - w / 2.0) * scale_w,
            (cy - h / 2.0) * scale_h,
            (cx + w / 2.0) * scale_w,
            (cy + h / 2.0) * scale_h,
        )
        .clamped(orig_width, orig_height);

        candidates.push(Candidate {
            class_id: best_class,
            confidence: best_score,
            bbox,
        });
    }

    Ok(candidates)
}

/// Per-class NMS. Output is sorted by descending confidence.
fn non_maximum_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<Candidate> = Vec::new();
    let mut suppressed = vec![false; candidates.len()];

    for i in 0..candidates.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(candidates[i].clone());

        for j in (i + 1)..candidates.len() {
            if suppressed[j] || candidates[i].class_id != candidates[j].class_id {
                continue;
            }
            if candidates[i].bbox.iou(&candidates[j].bbox) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// Create an ONNX Runtime session, preferring hardware execution providers.
fn create_session(model_path: &Path) -> MediaResult<Session> {
    let model_bytes = std::fs::read(model_path)?;

    let builder = Session::builder()
        .map_err(|e| MediaError::internal(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| MediaError::internal(format!("Failed to set optimization level: {}", e)))?;

    #[cfg(all(target_os = "linux", feature = "cuda"))]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        if let Ok(cuda_builder) = builder
            .clone()
            .with_execution_providers([CUDAExecutionProvider::default().build()])
        {
            if let Ok(session) = cuda_builder.commit_from_memory(&model_bytes) {
                info!("Using CUDA execution provider for object detection");
                return Ok(session);
            }
        }
        debug!("CUDA execution provider not available, trying alternatives");
    }

    #[cfg(target_os = "macos")]
    {
        use ort::execution_providers::CoreMLExecutionProvider;
        if let Ok(coreml_builder) = builder
            .clone()
            .with_execution_providers([CoreMLExecutionProvider::default().build()])
        {
            if let Ok(session) = coreml_builder.commit_from_memory(&model_bytes) {
                info!("Using CoreML execution provider for object detection");
                return Ok(session);
            }
        }
        debug!("CoreML execution provider not available, using CPU");
    }

    info!("Using CPU execution provider for object detection");
    builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| MediaError::internal(format!("Failed to load ONNX model: {}", e)))
}
