//! Alert dispatcher: snapshot upload and per-recipient notification.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};
use watchpost_media::{encode_jpeg, JPEG_CONTENT_TYPE};
use watchpost_notify::NotificationChannel;
use watchpost_storage::ArtifactStore;

use crate::config::WorkerConfig;
use crate::events::AlertEvent;
use crate::metrics;

/// Dispatcher settings.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub max_concurrent: usize,
    pub url_ttl: Duration,
    pub snapshot_dir: Option<PathBuf>,
    pub jpeg_quality: u8,
    pub shutdown_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::from(&WorkerConfig::default())
    }
}

impl From<&WorkerConfig> for DispatcherConfig {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            max_concurrent: config.dispatch_max_concurrent.max(1),
            url_ttl: config.snapshot_url_ttl,
            snapshot_dir: config.snapshot_dir.clone(),
            jpeg_quality: config.jpeg_quality,
            shutdown_timeout: config.shutdown_timeout,
        }
    }
}

/// Result of handling one alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Snapshot stored; `sent` of the recipients were notified
    Delivered { sent: usize, failed: usize },
    /// Alert dropped before any notification
    Dropped { reason: String },
}

/// Consumes the alert queue on the tokio runtime.
pub struct NotificationDispatcher {
    store: Arc<dyn ArtifactStore>,
    channel: Arc<dyn NotificationChannel>,
    config: DispatcherConfig,
}

/// Running dispatcher task.
pub struct DispatcherHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DispatcherHandle {
    /// Stop accepting alerts, drain in-flight work and wait for the task.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!("Dispatcher task failed: {}", e);
        }
    }

    /// Wait for the task to end on its own (queue closed).
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!("Dispatcher task failed: {}", e);
        }
    }
}

impl NotificationDispatcher {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        channel: Arc<dyn NotificationChannel>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            store,
            channel,
            config,
        }
    }

    /// Spawn the consumer task.
    pub fn spawn(self, alerts: mpsc::Receiver<AlertEvent>) -> DispatcherHandle {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(Arc::new(self).run(alerts, shutdown_rx));
        DispatcherHandle { shutdown, task }
    }

    async fn run(
        self: Arc<Self>,
        mut alerts: mpsc::Receiver<AlertEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(
            max_concurrent = self.config.max_concurrent,
            channel = self.channel.name(),
            "Alert dispatcher started"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Shutdown signal received, stopping dispatcher");
                        break;
                    }
                }
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
                event = alerts.recv() => {
                    let Some(event) = event else {
                        debug!("Alert queue closed");
                        break;
                    };
                    let permit = match Arc::clone(&semaphore).acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };
                    let dispatcher = Arc::clone(&self);
                    in_flight.spawn(async move {
                        let _permit = permit;
                        dispatcher.handle(event).await;
                    });
                }
            }
        }

        if !in_flight.is_empty() {
            info!(count = in_flight.len(), "Waiting for in-flight alerts to complete...");
            let drained = tokio::time::timeout(self.config.shutdown_timeout, async {
                while in_flight.join_next().await.is_some() {}
            })
            .await;
            if drained.is_err() {
                warn!("In-flight alerts did not finish before the shutdown timeout");
                in_flight.abort_all();
            }
        }

        info!("Alert dispatcher stopped");
    }

    /// Encode, archive, store and notify for one alert. Never retries.
    pub async fn handle(&self, event: AlertEvent) -> DispatchOutcome {
        let snapshot = Arc::clone(&event.snapshot);
        let quality = self.config.jpeg_quality;
        let encoded = tokio::task::spawn_blocking(move || encode_jpeg(&snapshot, quality)).await;

        let bytes = match encoded {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => return self.drop_alert(&event, "encode", e.to_string()),
            Err(e) => return self.drop_alert(&event, "encode", e.to_string()),
        };

        if let Some(dir) = &self.config.snapshot_dir {
            if let Err(e) = archive_snapshot(dir, &event, &bytes).await {
                warn!(camera = %event.camera, label = %event.label, "Failed to archive snapshot: {}", e);
            }
        }

        let reference = match self
            .store
            .store(bytes, JPEG_CONTENT_TYPE, self.config.url_ttl)
            .await
        {
            Ok(reference) => reference,
            Err(e) => return self.drop_alert(&event, "store", e.to_string()),
        };

        let mut sent = 0;
        let mut failed = 0;
        for recipient in &event.recipients {
            match self.channel.notify(&reference, recipient, &event.label).await {
                Ok(message_id) => {
                    sent += 1;
                    metrics::record_notification(self.channel.name(), true);
                    info!(
                        camera = %event.camera,
                        label = %event.label,
                        recipient = %recipient,
                        message_id = %message_id,
                        "Alert notification sent"
                    );
                }
                Err(e) => {
                    failed += 1;
                    metrics::record_notification(self.channel.name(), false);
                    warn!(
                        camera = %event.camera,
                        label = %event.label,
                        recipient = %recipient,
                        "Alert notification failed: {}", e
                    );
                }
            }
        }

        metrics::record_alert_dispatched(&event.label);
        DispatchOutcome::Delivered { sent, failed }
    }

    fn drop_alert(&self, event: &AlertEvent, stage: &'static str, reason: String) -> DispatchOutcome {
        metrics::record_alert_failed(stage);
        error!(
            camera = %event.camera,
            label = %event.label,
            stage,
            "Dropped alert: {}", reason
        );
        DispatchOutcome::Dropped { reason }
    }
}

/// File name of an archived snapshot: `{label}_{YYYY-MM-DD-HH-MM-SS}.jpg`.
pub fn snapshot_file_name(event: &AlertEvent) -> String {
    format!("{}_{}.jpg", event.label, event.timestamp.format("%Y-%m-%d-%H-%M-%S"))
}

async fn archive_snapshot(dir: &Path, event: &AlertEvent, bytes: &[u8]) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(snapshot_file_name(event));
    tokio::fs::write(&path, bytes).await?;
    debug!(path = %path.display(), "Archived snapshot");
    Ok(path)
}
