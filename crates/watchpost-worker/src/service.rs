//! Process wiring: config store, supervisor and dispatcher.

use std::sync::Arc;

use tracing::{error, info, warn};
use watchpost_media::{
    DefaultSourceOpener, DetectorProvider, FrameAnnotator, OnnxDetectorProvider, SourceOpener,
};
use watchpost_notify::{LogChannel, NotificationChannel, NotifyError, TwilioChannel};
use watchpost_storage::ArtifactStore;

use crate::config::WorkerConfig;
use crate::config_store::ConfigStore;
use crate::dispatcher::{DispatcherConfig, DispatcherHandle, NotificationDispatcher};
use crate::error::{WorkerError, WorkerResult};
use crate::events::alert_channel;
use crate::supervisor::PipelineSupervisor;

/// Media collaborators for the supervisor.
pub struct MediaBackends {
    pub opener: Arc<dyn SourceOpener>,
    pub detectors: Arc<dyn DetectorProvider>,
    pub annotator: Arc<FrameAnnotator>,
}

impl MediaBackends {
    /// OpenCV / image-sequence sources and the ONNX detector from the config file.
    pub async fn from_config(store: &ConfigStore) -> WorkerResult<Self> {
        let settings = store.snapshot().await.detection;
        let annotator = match settings.font_path.as_deref() {
            Some(path) => match FrameAnnotator::with_font_file(path) {
                Ok(annotator) => annotator,
                Err(e) => {
                    warn!(font = %path, "Caption font unavailable, drawing boxes only: {}", e);
                    FrameAnnotator::new()
                }
            },
            None => FrameAnnotator::new(),
        };

        Ok(Self {
            opener: Arc::new(DefaultSourceOpener),
            detectors: Arc::new(OnnxDetectorProvider::from_settings(&settings)),
            annotator: Arc::new(annotator),
        })
    }
}

/// Twilio when configured, otherwise a channel that only logs.
pub fn notification_channel_from_env() -> WorkerResult<Arc<dyn NotificationChannel>> {
    match TwilioChannel::from_env() {
        Ok(channel) => {
            info!("Using Twilio WhatsApp notifications");
            Ok(Arc::new(channel))
        }
        Err(NotifyError::NotConfigured(reason)) => {
            warn!("Twilio not configured ({}), alerts will only be logged", reason);
            Ok(Arc::new(LogChannel))
        }
        Err(e) => Err(e.into()),
    }
}

/// A running Watchpost process.
pub struct Watchpost {
    config: WorkerConfig,
    store: Arc<ConfigStore>,
    supervisor: Arc<PipelineSupervisor>,
    dispatcher: DispatcherHandle,
}

impl Watchpost {
    /// Wire everything up. Pipelines are not started yet.
    pub fn new(
        config: WorkerConfig,
        store: Arc<ConfigStore>,
        media: MediaBackends,
        artifacts: Arc<dyn ArtifactStore>,
        channel: Arc<dyn NotificationChannel>,
    ) -> Self {
        let (alerts, queue) = alert_channel(config.alert_queue_capacity);
        let dispatcher =
            NotificationDispatcher::new(artifacts, channel, DispatcherConfig::from(&config))
                .spawn(queue);
        let supervisor = Arc::new(PipelineSupervisor::new(
            media.opener,
            media.detectors,
            media.annotator,
            alerts,
        ));

        Self {
            config,
            store,
            supervisor,
            dispatcher,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<ConfigStore> {
        Arc::clone(&self.store)
    }

    pub fn supervisor(&self) -> Arc<PipelineSupervisor> {
        Arc::clone(&self.supervisor)
    }

    /// Start a pipeline for every configured camera. Returns how many started.
    pub async fn start_all(&self) -> WorkerResult<usize> {
        let configs = self.store.pipeline_configs().await;
        let supervisor = self.supervisor();

        tokio::task::spawn_blocking(move || {
            let mut started = 0;
            for config in configs {
                let camera = config.camera.clone();
                match supervisor.start(config) {
                    Ok(true) => started += 1,
                    Ok(false) => {}
                    Err(e) => error!(camera = %camera, "Failed to start pipeline: {}", e),
                }
            }
            started
        })
        .await
        .map_err(|e| WorkerError::internal(e.to_string()))
    }

    /// Stop every pipeline, then drain and stop the dispatcher.
    pub async fn shutdown(self) {
        let supervisor = Arc::clone(&self.supervisor);
        if let Err(e) = tokio::task::spawn_blocking(move || supervisor.shutdown()).await {
            error!("Pipeline shutdown failed: {}", e);
        }
        self.dispatcher.shutdown().await;
        info!("Watchpost shutdown complete");
    }
}
