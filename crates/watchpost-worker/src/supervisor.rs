//! Registry of running camera pipelines.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use watchpost_media::{DetectorProvider, FrameAnnotator, SourceOpener};
use watchpost_models::{CameraId, PipelineConfig};

use crate::error::{WorkerError, WorkerResult};
use crate::events::{frame_channel, notice_channel, AlertNotice, AlertSender, FrameEvent, FrameReceiver, FrameSender};
use crate::pipeline::{CameraPipeline, LiveSettings, PipelineContext, PipelineShared, PipelineStatus};

/// What `reconfigure` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconfigureOutcome {
    /// Live fields updated on the running pipeline
    Applied,
    /// Pipeline stopped and started again; cooldown history reset
    Restarted,
    /// No pipeline was running; a new one was started
    Started,
}

struct PipelineHandle {
    config: PipelineConfig,
    shared: Arc<PipelineShared>,
    frames: FrameSender,
    thread: Option<JoinHandle<()>>,
}

impl PipelineHandle {
    /// Wait for the pipeline thread. A panicking pipeline is recorded as failed.
    fn join(mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        if thread.join().is_err() {
            error!(camera = %self.config.camera, "Pipeline thread panicked");
            self.shared.fail("pipeline thread panicked");
        }
    }

    fn is_finished(&self) -> bool {
        self.shared.is_finished()
            || self.thread.as_ref().map(|t| t.is_finished()).unwrap_or(true)
    }
}

/// Starts, stops and reconfigures camera pipelines.
///
/// Lifecycle changes are serialized by `lifecycle`, which is held across the
/// join of a stopping pipeline, so a stop followed by a start never overlaps
/// two holders of one device. The `registry` lock is only held for map
/// access; readers never wait on a join.
pub struct PipelineSupervisor {
    lifecycle: Mutex<()>,
    registry: Mutex<HashMap<CameraId, PipelineHandle>>,
    context: PipelineContext,
}

impl PipelineSupervisor {
    pub fn new(
        opener: Arc<dyn SourceOpener>,
        detectors: Arc<dyn DetectorProvider>,
        annotator: Arc<FrameAnnotator>,
        alerts: AlertSender,
    ) -> Self {
        Self {
            lifecycle: Mutex::new(()),
            registry: Mutex::new(HashMap::new()),
            context: PipelineContext {
                opener,
                detectors,
                annotator,
                alerts,
                notices: notice_channel(),
            },
        }
    }

    fn lifecycle(&self) -> MutexGuard<'_, ()> {
        self.lifecycle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<CameraId, PipelineHandle>> {
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start a pipeline. Returns `false` if one is already live for the camera.
    pub fn start(&self, config: PipelineConfig) -> WorkerResult<bool> {
        let _lifecycle = self.lifecycle();
        let finished = {
            let mut registry = self.registry();
            match registry.get(&config.camera) {
                Some(handle) if !handle.is_finished() => return Ok(false),
                Some(_) => registry.remove(&config.camera),
                None => None,
            }
        };
        if let Some(finished) = finished {
            finished.join();
        }
        self.spawn(config)?;
        Ok(true)
    }

    /// Spawn a pipeline thread and register it. Callers hold `lifecycle` and
    /// have already joined any previous pipeline for the camera.
    fn spawn(&self, config: PipelineConfig) -> WorkerResult<()> {
        let camera = config.camera.clone();
        let shared = Arc::new(PipelineShared::new(&config));
        let (frames, _) = frame_channel();
        let pipeline = CameraPipeline::new(
            config.clone(),
            Arc::clone(&shared),
            self.context.clone(),
            frames.clone(),
        );

        let thread = std::thread::Builder::new()
            .name(format!("pipeline-{}", camera))
            .spawn(move || pipeline.run())
            .map_err(|e| WorkerError::SpawnFailed {
                camera: camera.clone(),
                message: e.to_string(),
            })?;

        info!(camera = %camera, "Pipeline started");
        self.registry().insert(
            camera,
            PipelineHandle {
                config,
                shared,
                frames,
                thread: Some(thread),
            },
        );
        Ok(())
    }

    /// Stop a pipeline and wait until its source is released.
    ///
    /// Returns `false` if no pipeline was registered for the camera.
    pub fn stop(&self, camera: &CameraId) -> bool {
        let _lifecycle = self.lifecycle();
        let Some(handle) = self.registry().remove(camera) else {
            return false;
        };
        handle.shared.request_stop();
        handle.join();
        info!(camera = %camera, "Pipeline stopped");
        true
    }

    /// Apply a new configuration, restarting only when needed.
    pub fn reconfigure(&self, config: PipelineConfig) -> WorkerResult<ReconfigureOutcome> {
        let _lifecycle = self.lifecycle();

        let previous = {
            let mut registry = self.registry();
            match registry.get_mut(&config.camera) {
                Some(live) if !live.is_finished() => {
                    if !live.config.requires_restart(&config) {
                        live.shared.update_live(LiveSettings::from_config(&config));
                        live.config = config;
                        return Ok(ReconfigureOutcome::Applied);
                    }
                    live.shared.request_stop();
                    registry.remove(&config.camera).map(|handle| (handle, true))
                }
                Some(_) => registry.remove(&config.camera).map(|handle| (handle, false)),
                None => None,
            }
        };

        let restarted = match previous {
            Some((handle, was_live)) => {
                handle.join();
                was_live
            }
            None => false,
        };
        self.spawn(config)?;
        Ok(if restarted {
            ReconfigureOutcome::Restarted
        } else {
            ReconfigureOutcome::Started
        })
    }

    /// Push a new recipient list to every registered pipeline.
    pub fn set_recipients(&self, recipients: &[String]) {
        for handle in self.registry().values_mut() {
            handle.shared.set_recipients(recipients.to_vec());
            handle.config.recipients = recipients.to_vec();
        }
    }

    /// Stop every pipeline: all are signalled first, then joined.
    pub fn shutdown(&self) {
        let _lifecycle = self.lifecycle();
        let handles: Vec<(CameraId, PipelineHandle)> = self.registry().drain().collect();
        if handles.is_empty() {
            return;
        }
        info!(count = handles.len(), "Stopping all pipelines");

        for (_, handle) in &handles {
            handle.shared.request_stop();
        }
        for (camera, handle) in handles {
            handle.join();
            info!(camera = %camera, "Pipeline stopped");
        }
    }

    pub fn status(&self, camera: &CameraId) -> Option<PipelineStatus> {
        self.registry().get(camera).map(|handle| handle.shared.status())
    }

    pub fn list(&self) -> Vec<PipelineStatus> {
        let mut statuses: Vec<PipelineStatus> = self
            .registry()
            .values()
            .map(|handle| handle.shared.status())
            .collect();
        statuses.sort_by(|a, b| a.camera.cmp(&b.camera));
        statuses
    }

    /// Configuration a registered pipeline was started (or last reconfigured) with.
    pub fn config(&self, camera: &CameraId) -> Option<PipelineConfig> {
        self.registry().get(camera).map(|handle| handle.config.clone())
    }

    /// Receiver of the camera's latest annotated frame.
    pub fn subscribe_frames(&self, camera: &CameraId) -> Option<FrameReceiver> {
        self.registry().get(camera).map(|handle| handle.frames.subscribe())
    }

    pub fn latest_frame(&self, camera: &CameraId) -> Option<FrameEvent> {
        self.registry()
            .get(camera)
            .and_then(|handle| handle.frames.borrow().clone())
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<AlertNotice> {
        self.context.notices.subscribe()
    }

    /// Alerts dropped because the dispatcher queue was full or closed.
    pub fn dropped_alerts(&self) -> u64 {
        self.context.alerts.dropped_count()
    }

    /// Number of registered pipelines, finished ones included.
    pub fn len(&self) -> usize {
        self.registry().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for PipelineSupervisor {
    fn drop(&mut self) {
        let registry = self
            .registry
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !registry.is_empty() {
            warn!(count = registry.len(), "Supervisor dropped with live pipelines");
            for handle in registry.values() {
                handle.shared.request_stop();
            }
            for (_, handle) in registry.drain() {
                handle.join();
            }
        }
    }
}
