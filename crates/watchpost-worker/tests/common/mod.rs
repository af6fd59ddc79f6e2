//! Scripted sources and counting detectors for pipeline tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use watchpost_media::{
    Detector, DetectorProvider, FrameAnnotator, FrameSource, MediaError, MediaResult, ReadError,
    RgbImage, SourceOpener,
};
use watchpost_models::{BoundingBox, CameraId, Detection, PipelineConfig};
use watchpost_worker::{alert_channel, AlertEvent, PipelineState, PipelineSupervisor};

pub fn frame() -> RgbImage {
    RgbImage::new(64, 48)
}

/// One scripted read result.
#[derive(Debug, Clone)]
pub enum Step {
    Frame,
    Transient,
    End,
}

/// Source that plays a script, then either ends or repeats frames forever.
pub struct ScriptedSource {
    steps: VecDeque<Step>,
    endless: bool,
    tracker: Arc<OpenTracker>,
}

impl FrameSource for ScriptedSource {
    fn read_frame(&mut self) -> Result<RgbImage, ReadError> {
        match self.steps.pop_front() {
            Some(Step::Frame) => Ok(frame()),
            Some(Step::Transient) => Err(ReadError::transient("scripted hiccup")),
            Some(Step::End) => Err(ReadError::EndOfStream),
            None if self.endless => Ok(frame()),
            None => Err(ReadError::EndOfStream),
        }
    }

    fn close(&mut self) {
        self.tracker.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Counts open handles and remembers the highest concurrent count.
#[derive(Debug, Default)]
pub struct OpenTracker {
    pub open: AtomicUsize,
    pub max_open: AtomicUsize,
    pub opens: AtomicUsize,
}

impl OpenTracker {
    pub fn open_now(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn max_open(&self) -> usize {
        self.max_open.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

pub struct ScriptedOpener {
    script: Vec<Step>,
    endless: bool,
    fail: bool,
    pub tracker: Arc<OpenTracker>,
}

impl ScriptedOpener {
    /// Plays `script` then reports end of stream.
    pub fn finite(script: Vec<Step>) -> Self {
        Self {
            script,
            endless: false,
            fail: false,
            tracker: Arc::new(OpenTracker::default()),
        }
    }

    /// Plays `script` then yields frames until stopped.
    pub fn endless(script: Vec<Step>) -> Self {
        Self {
            endless: true,
            ..Self::finite(script)
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::finite(Vec::new())
        }
    }
}

impl SourceOpener for ScriptedOpener {
    fn open(&self, camera: &CameraId) -> MediaResult<Box<dyn FrameSource>> {
        if self.fail {
            return Err(MediaError::source_unavailable(format!("no device {}", camera)));
        }
        let now_open = self.tracker.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.tracker.max_open.fetch_max(now_open, Ordering::SeqCst);
        self.tracker.opens.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(ScriptedSource {
            steps: self.script.iter().cloned().collect(),
            endless: self.endless,
            tracker: Arc::clone(&self.tracker),
        }))
    }
}

/// Detector returning fixed detections and counting calls across instances.
pub struct CountingDetector {
    detections: Vec<Detection>,
    calls: Arc<AtomicUsize>,
}

impl Detector for CountingDetector {
    fn detect(&self, _frame: &RgbImage, _min_confidence: f32) -> MediaResult<Vec<Detection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.detections.clone())
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

pub struct CountingDetectors {
    pub detections: Vec<Detection>,
    pub calls: Arc<AtomicUsize>,
}

impl CountingDetectors {
    pub fn returning(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DetectorProvider for CountingDetectors {
    fn create(&self) -> MediaResult<Box<dyn Detector>> {
        Ok(Box::new(CountingDetector {
            detections: self.detections.clone(),
            calls: Arc::clone(&self.calls),
        }))
    }
}

/// Detector that sleeps on every call, standing in for a slow inference.
pub struct SlowDetector {
    pub delay: Duration,
    pub calls: Arc<AtomicUsize>,
}

impl Detector for SlowDetector {
    fn detect(&self, _frame: &RgbImage, _min_confidence: f32) -> MediaResult<Vec<Detection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

/// Detector whose every inference fails.
pub struct FailingDetector;

impl Detector for FailingDetector {
    fn detect(&self, _frame: &RgbImage, _min_confidence: f32) -> MediaResult<Vec<Detection>> {
        Err(MediaError::detection_failed("scripted inference failure"))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Supervisor over an arbitrary detector provider.
pub fn supervisor_with(
    opener: ScriptedOpener,
    detectors: Arc<dyn DetectorProvider>,
    queue: usize,
) -> (PipelineSupervisor, tokio::sync::mpsc::Receiver<AlertEvent>) {
    let (sender, alerts) = alert_channel(queue);
    let supervisor = PipelineSupervisor::new(
        Arc::new(opener),
        detectors,
        Arc::new(FrameAnnotator::new()),
        sender,
    );
    (supervisor, alerts)
}

pub fn tank(confidence: f32) -> Detection {
    Detection::new("tank", confidence, BoundingBox::new(10.0, 10.0, 30.0, 30.0))
}

/// Fast-ticking config for tests.
pub fn fast_config(camera: CameraId) -> PipelineConfig {
    PipelineConfig::for_camera(camera)
        .with_poll_interval(Duration::ZERO)
        .with_read_backoff(Duration::from_millis(1))
}

pub struct Harness {
    pub supervisor: PipelineSupervisor,
    pub tracker: Arc<OpenTracker>,
    pub detectors: Arc<CountingDetectors>,
    pub alerts: tokio::sync::mpsc::Receiver<AlertEvent>,
}

pub fn harness(opener: ScriptedOpener, detectors: CountingDetectors, queue: usize) -> Harness {
    let tracker = Arc::clone(&opener.tracker);
    let detectors = Arc::new(detectors);
    let (sender, alerts) = alert_channel(queue);
    let supervisor = PipelineSupervisor::new(
        Arc::new(opener),
        Arc::clone(&detectors) as Arc<dyn DetectorProvider>,
        Arc::new(FrameAnnotator::new()),
        sender,
    );
    Harness {
        supervisor,
        tracker,
        detectors,
        alerts,
    }
}

/// Poll until `check` holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    check()
}

pub fn wait_for_state(
    supervisor: &PipelineSupervisor,
    camera: &CameraId,
    state: PipelineState,
) -> bool {
    wait_until(Duration::from_secs(10), || {
        supervisor
            .status(camera)
            .map(|s| s.state == state)
            .unwrap_or(false)
    })
}

pub fn recv_all(alerts: &mut tokio::sync::mpsc::Receiver<AlertEvent>) -> Vec<AlertEvent> {
    let mut events = Vec::new();
    while let Ok(event) = alerts.try_recv() {
        events.push(event);
    }
    events
}
