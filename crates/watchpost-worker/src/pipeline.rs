//! Per-camera capture → detect → annotate → alert loop.
//!
//! A `CameraPipeline` runs on its own OS thread: capture and inference are
//! blocking. It talks to the rest of the process only through channels and
//! the `PipelineShared` state the supervisor holds.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use watchpost_media::{
    Detector, DetectorProvider, FrameAnnotator, FrameSource, ReadError, RgbImage, SourceOpener,
};
use watchpost_models::{CameraId, ClassSelection, Detection, PipelineConfig};

use crate::dedup::AlertDeduplicator;
use crate::events::{AlertEvent, AlertNotice, AlertSender, FrameEvent, FrameSender};
use crate::logging::CameraLogger;
use crate::metrics;
use crate::retry::FailureTracker;

/// Consecutive read failures logged before suppression.
const MAX_LOGGED_READ_FAILURES: u32 = 3;

/// Lifecycle of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Idle,
    Opening,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Opening => "opening",
            PipelineState::Running => "running",
            PipelineState::Stopping => "stopping",
            PipelineState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of a pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub camera: CameraId,
    pub state: PipelineState,
    /// Why the pipeline stopped, if it failed
    pub error: Option<String>,
    pub frames_read: u64,
    pub detections_run: u64,
    pub started_at: DateTime<Utc>,
}

/// Cooperative stop request with a wakeable wait.
#[derive(Debug, Default)]
pub struct StopSignal {
    requested: Mutex<bool>,
    wake: Condvar,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        let mut requested = self
            .requested
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *requested = true;
        self.wake.notify_all();
    }

    pub fn is_requested(&self) -> bool {
        *self
            .requested
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sleep up to `timeout`, returning early with `true` if a stop is requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let requested = self
            .requested
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if timeout.is_zero() {
            return *requested;
        }
        let (requested, _) = self
            .wake
            .wait_timeout_while(requested, timeout, |stop| !*stop)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *requested
    }
}

/// Settings a running pipeline reads on every tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveSettings {
    pub classes: ClassSelection,
    pub recipients: Vec<String>,
}

impl LiveSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            classes: config.classes.clone(),
            recipients: config.recipients.clone(),
        }
    }
}

/// State shared between a pipeline thread and its supervisor.
#[derive(Debug)]
pub struct PipelineShared {
    camera: CameraId,
    state: Mutex<(PipelineState, Option<String>)>,
    live: RwLock<LiveSettings>,
    stop: StopSignal,
    frames_read: AtomicU64,
    detections_run: AtomicU64,
    started_at: DateTime<Utc>,
}

impl PipelineShared {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            camera: config.camera.clone(),
            state: Mutex::new((PipelineState::Idle, None)),
            live: RwLock::new(LiveSettings::from_config(config)),
            stop: StopSignal::new(),
            frames_read: AtomicU64::new(0),
            detections_run: AtomicU64::new(0),
            started_at: Utc::now(),
        }
    }

    pub fn camera(&self) -> &CameraId {
        &self.camera
    }

    pub fn state(&self) -> PipelineState {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .0
    }

    pub(crate) fn set_state(&self, state: PipelineState) {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .0 = state;
    }

    /// Stop with an error message recorded.
    pub(crate) fn fail(&self, message: impl Into<String>) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *state = (PipelineState::Stopped, Some(message.into()));
    }

    pub fn is_finished(&self) -> bool {
        self.state() == PipelineState::Stopped
    }

    pub fn request_stop(&self) {
        self.stop.request();
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    pub fn live_settings(&self) -> LiveSettings {
        self.live
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn update_live(&self, settings: LiveSettings) {
        *self
            .live
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = settings;
    }

    pub fn set_recipients(&self, recipients: Vec<String>) {
        self.live
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .recipients = recipients;
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read.load(Ordering::Relaxed)
    }

    pub fn detections_run(&self) -> u64 {
        self.detections_run.load(Ordering::Relaxed)
    }

    pub fn status(&self) -> PipelineStatus {
        let (state, error) = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        PipelineStatus {
            camera: self.camera.clone(),
            state,
            error,
            frames_read: self.frames_read(),
            detections_run: self.detections_run(),
            started_at: self.started_at,
        }
    }
}

/// Collaborators injected into every pipeline.
#[derive(Clone)]
pub struct PipelineContext {
    pub opener: Arc<dyn SourceOpener>,
    pub detectors: Arc<dyn DetectorProvider>,
    pub annotator: Arc<FrameAnnotator>,
    pub alerts: AlertSender,
    pub notices: broadcast::Sender<AlertNotice>,
}

/// One camera's processing loop.
pub struct CameraPipeline {
    config: PipelineConfig,
    shared: Arc<PipelineShared>,
    context: PipelineContext,
    frames: FrameSender,
    logger: CameraLogger,
}

impl CameraPipeline {
    pub fn new(
        config: PipelineConfig,
        shared: Arc<PipelineShared>,
        context: PipelineContext,
        frames: FrameSender,
    ) -> Self {
        let logger = CameraLogger::new(&config.camera, "pipeline");
        Self {
            config,
            shared,
            context,
            frames,
            logger,
        }
    }

    /// Run until stopped, end of stream, or an open failure. Blocking.
    pub fn run(self) {
        let span = self.logger.create_span();
        let _entered = span.enter();

        self.shared.set_state(PipelineState::Opening);

        let mut source = match self.context.opener.open(&self.config.camera) {
            Ok(source) => source,
            Err(e) => {
                self.logger.log_error(&format!("failed to open source: {}", e));
                self.shared.fail(e.to_string());
                return;
            }
        };

        let detector = match self.context.detectors.create() {
            Ok(detector) => detector,
            Err(e) => {
                self.logger.log_error(&format!("failed to load detector: {}", e));
                source.close();
                self.shared.fail(e.to_string());
                return;
            }
        };

        self.shared.set_state(PipelineState::Running);
        metrics::pipeline_started();
        self.logger.log_start(&format!(
            "detector={} interval={} poll={:?}",
            detector.name(),
            self.config.detection_interval,
            self.config.poll_interval
        ));

        let reason = self.run_loop(source.as_mut(), detector.as_ref());

        self.shared.set_state(PipelineState::Stopping);
        source.close();
        self.shared.set_state(PipelineState::Stopped);
        metrics::pipeline_stopped();
        self.logger.log_completion(reason);
    }

    fn run_loop(&self, source: &mut dyn FrameSource, detector: &dyn Detector) -> &'static str {
        let camera = self.config.camera.to_string();
        let stop = self.shared.stop_signal();
        let dedup = AlertDeduplicator::new(self.config.cooldown);
        let mut failures = FailureTracker::new(MAX_LOGGED_READ_FAILURES);
        let mut tick: u64 = 0;
        let mut detections: Vec<Detection> = Vec::new();

        loop {
            if stop.is_requested() {
                return "stop requested";
            }

            let frame = match source.read_frame() {
                Ok(frame) => frame,
                Err(ReadError::EndOfStream) => return "end of stream",
                Err(ReadError::Transient(message)) => {
                    metrics::record_read_error(&camera);
                    if failures.record_failure() {
                        self.logger.log_warning(&format!("frame read failed: {}", message));
                    }
                    if stop.wait_timeout(self.config.read_backoff) {
                        return "stop requested";
                    }
                    continue;
                }
            };

            let recovered = failures.record_success();
            if recovered > 0 {
                self.logger
                    .log_progress(&format!("source recovered after {} failed reads", recovered));
            }

            tick += 1;
            self.shared.frames_read.store(tick, Ordering::Relaxed);
            metrics::record_frame(&camera);

            if self.should_detect(tick) {
                detections = self.detect(detector, &frame, &camera);
            }

            self.process_frame(frame, &detections, tick, &dedup);

            if stop.wait_timeout(self.config.poll_interval) {
                return "stop requested";
            }
        }
    }

    /// Detection runs on the first frame and every `interval`-th frame after.
    fn should_detect(&self, tick: u64) -> bool {
        tick == 1 || tick % u64::from(self.config.detection_interval.max(1)) == 0
    }

    fn detect(&self, detector: &dyn Detector, frame: &RgbImage, camera: &str) -> Vec<Detection> {
        self.shared.detections_run.fetch_add(1, Ordering::Relaxed);
        metrics::record_detection_run(camera);

        match detector.detect(frame, self.config.detector_confidence) {
            Ok(detections) => detections,
            Err(e) => {
                metrics::record_detection_failure(camera);
                self.logger.log_warning(&format!("detection failed: {}", e));
                Vec::new()
            }
        }
    }

    fn process_frame(
        &self,
        frame: RgbImage,
        detections: &[Detection],
        tick: u64,
        dedup: &AlertDeduplicator,
    ) {
        let live = self.shared.live_settings();
        let annotation = self.context.annotator.annotate(
            &frame,
            detections,
            &live.classes,
            self.config.display_confidence,
            self.config.alert_confidence,
        );
        let snapshot = Arc::new(annotation.image);
        let now = Utc::now();

        self.frames.send_replace(Some(FrameEvent {
            camera: self.config.camera.clone(),
            image: Arc::clone(&snapshot),
            index: tick,
            timestamp: now,
        }));

        if !annotation.alert_active {
            return;
        }

        for detection in detections {
            if !live.classes.is_alert(&detection.label)
                || !detection.passes(self.config.alert_confidence)
            {
                continue;
            }
            if !dedup.should_alert(&detection.label, now) {
                continue;
            }

            let event = AlertEvent {
                camera: self.config.camera.clone(),
                label: detection.label.clone(),
                confidence: detection.confidence,
                snapshot: Arc::clone(&snapshot),
                timestamp: now,
                recipients: live.recipients.clone(),
            };

            metrics::record_alert_raised(&event.camera.to_string(), &event.label);
            tracing::info!(
                camera = %event.camera,
                label = %event.label,
                confidence = event.confidence,
                "Alert raised"
            );

            // No subscribers is fine
            let _ = self.context.notices.send(event.notice());
            self.context.alerts.offer(event);
        }
    }
}
