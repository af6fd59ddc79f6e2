//! Application and pipeline configuration.
//!
//! `AppConfig` is the persisted user configuration (cameras, recipients,
//! detection settings). `PipelineConfig` is the immutable per-start snapshot a
//! camera pipeline is built from; only its class selection and recipients may
//! change while the pipeline runs.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::camera::CameraId;
use crate::classes::{ClassSelection, VEHICLE_CLASSES};

/// Process-wide detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Path to the ONNX model weights
    pub model_path: String,
    /// Class names in model output order
    pub class_names: Vec<String>,
    /// Confidence passed into the model call
    pub detector_confidence: f32,
    /// Post-filter for drawing overlays
    pub display_confidence: f32,
    /// Post-filter for raising alerts
    pub alert_confidence: f32,
    /// Minimum seconds between two alerts of one class on one camera
    pub cooldown_secs: u64,
    /// Frames between inference runs (intermediate frames reuse the last result)
    pub detection_interval: u32,
    /// Fixed delay between ticks
    pub poll_interval_ms: u64,
    /// Delay after a transient read failure
    pub read_backoff_ms: u64,
    /// Square model input size
    pub input_size: u32,
    /// IoU threshold for non-maximum suppression
    pub nms_threshold: f32,
    /// TrueType font used for overlay captions
    pub font_path: Option<String>,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            model_path: "models/vehicles.onnx".to_string(),
            class_names: VEHICLE_CLASSES.iter().map(|c| c.to_string()).collect(),
            detector_confidence: 0.25,
            display_confidence: 0.5,
            alert_confidence: 0.5,
            cooldown_secs: 600,
            detection_interval: 15,
            poll_interval_ms: 1000,
            read_backoff_ms: 1000,
            input_size: 640,
            nms_threshold: 0.45,
            font_path: None,
        }
    }
}

/// A configured camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub id: CameraId,
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "detected_objects", deserialize_with = "class_set")]
    pub display_classes: BTreeSet<String>,
    #[serde(default, alias = "alerts", deserialize_with = "class_set")]
    pub alert_classes: BTreeSet<String>,
}

impl CameraConfig {
    pub fn new(id: CameraId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            display_classes: BTreeSet::new(),
            alert_classes: BTreeSet::new(),
        }
    }

    pub fn classes(&self) -> ClassSelection {
        ClassSelection {
            display: self.display_classes.clone(),
            alert: self.alert_classes.clone(),
        }
    }
}

/// Accepts either `["tank", "bmp"]` or `{"tank": true, "bmp": false}`.
fn class_set<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        List(Vec<String>),
        Flags(BTreeMap<String, bool>),
    }

    Ok(match Repr::deserialize(deserializer)? {
        Repr::List(list) => list.into_iter().collect(),
        Repr::Flags(flags) => flags
            .into_iter()
            .filter_map(|(name, on)| on.then_some(name))
            .collect(),
    })
}

/// Persisted application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub cameras: Vec<CameraConfig>,
    /// Notification recipients (phone numbers without the leading `+`)
    #[serde(default)]
    pub phones: Vec<String>,
    #[serde(default)]
    pub detection: DetectionSettings,
}

impl AppConfig {
    pub fn camera(&self, id: &CameraId) -> Option<&CameraConfig> {
        self.cameras.iter().find(|c| &c.id == id)
    }

    pub fn camera_mut(&mut self, id: &CameraId) -> Option<&mut CameraConfig> {
        self.cameras.iter_mut().find(|c| &c.id == id)
    }

    /// Build the pipeline config for a configured camera.
    pub fn pipeline_config(&self, id: &CameraId) -> Option<PipelineConfig> {
        self.camera(id)
            .map(|camera| PipelineConfig::from_settings(camera, &self.phones, &self.detection))
    }
}

/// Per-camera pipeline configuration snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub camera: CameraId,
    pub classes: ClassSelection,
    pub recipients: Vec<String>,
    pub poll_interval: Duration,
    pub read_backoff: Duration,
    pub detection_interval: u32,
    pub detector_confidence: f32,
    pub display_confidence: f32,
    pub alert_confidence: f32,
    pub cooldown: Duration,
}

impl PipelineConfig {
    pub fn from_settings(
        camera: &CameraConfig,
        recipients: &[String],
        settings: &DetectionSettings,
    ) -> Self {
        Self {
            camera: camera.id.clone(),
            classes: camera.classes(),
            recipients: recipients.to_vec(),
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            read_backoff: Duration::from_millis(settings.read_backoff_ms),
            detection_interval: settings.detection_interval.max(1),
            detector_confidence: settings.detector_confidence,
            display_confidence: settings.display_confidence,
            alert_confidence: settings.alert_confidence,
            cooldown: Duration::from_secs(settings.cooldown_secs),
        }
    }

    /// Config with default settings, no classes and no recipients.
    pub fn for_camera(camera: CameraId) -> Self {
        Self::from_settings(&CameraConfig::new(camera, ""), &[], &DetectionSettings::default())
    }

    pub fn with_classes(mut self, classes: ClassSelection) -> Self {
        self.classes = classes;
        self
    }

    pub fn with_recipients(mut self, recipients: Vec<String>) -> Self {
        self.recipients = recipients;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_detection_interval(mut self, interval: u32) -> Self {
        self.detection_interval = interval.max(1);
        self
    }

    pub fn with_read_backoff(mut self, backoff: Duration) -> Self {
        self.read_backoff = backoff;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Whether moving from `self` to `next` needs the pipeline to be rebuilt.
    ///
    /// Class selection and recipients are read live by a running pipeline;
    /// every other field is fixed at start.
    pub fn requires_restart(&self, next: &PipelineConfig) -> bool {
        self.camera != next.camera
            || self.poll_interval != next.poll_interval
            || self.read_backoff != next.read_backoff
            || self.detection_interval != next.detection_interval
            || self.detector_confidence != next.detector_confidence
            || self.display_confidence != next.display_confidence
            || self.alert_confidence != next.alert_confidence
            || self.cooldown != next.cooldown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = DetectionSettings::default();
        assert_eq!(settings.cooldown_secs, 600);
        assert_eq!(settings.detection_interval, 15);
        assert_eq!(settings.class_names.len(), 12);
        assert!((settings.display_confidence - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_class_names_default_to_vehicle_catalog_in_order() {
        let settings = DetectionSettings::default();
        let expected: Vec<String> = VEHICLE_CLASSES.iter().map(|c| c.to_string()).collect();
        assert_eq!(settings.class_names, expected);
    }

    #[test]
    fn test_reads_flag_maps() {
        let json = r#"{
            "cameras": [
                {"name": "Gate", "id": 0,
                 "detected_objects": {"tank": true, "car": false},
                 "alerts": {"tank": true}}
            ],
            "phones": ["380501112233"]
        }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        let camera = &config.cameras[0];
        assert_eq!(camera.id, CameraId::Device(0));
        assert_eq!(camera.display_classes.len(), 1);
        assert!(camera.alert_classes.contains("tank"));
        assert_eq!(config.detection, DetectionSettings::default());
    }

    #[test]
    fn test_pipeline_config_from_app_config() {
        let mut config = AppConfig::default();
        let mut camera = CameraConfig::new(CameraId::uri("patrol.mp4"), "Patrol");
        camera.alert_classes.insert("bmp".into());
        config.cameras.push(camera);
        config.phones.push("15550001".into());

        let pipeline = config.pipeline_config(&CameraId::uri("patrol.mp4")).unwrap();
        assert!(pipeline.classes.is_alert("bmp"));
        assert_eq!(pipeline.recipients, vec!["15550001".to_string()]);
        assert_eq!(pipeline.cooldown, Duration::from_secs(600));
        assert!(config.pipeline_config(&CameraId::Device(9)).is_none());
    }

    #[test]
    fn test_requires_restart() {
        let base = PipelineConfig::for_camera(CameraId::Device(0));

        let live = base
            .clone()
            .with_classes(ClassSelection::new(["tank"], ["tank"]))
            .with_recipients(vec!["1".into()]);
        assert!(!base.requires_restart(&live));

        let slower = base.clone().with_poll_interval(Duration::from_secs(5));
        assert!(base.requires_restart(&slower));
    }
}
