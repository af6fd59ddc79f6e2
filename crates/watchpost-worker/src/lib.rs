//! Camera pipelines and alert delivery.
//!
//! This crate provides:
//! - Per-camera capture/detect/annotate/alert pipelines on dedicated threads
//! - A supervisor registry (start, stop, live reconfigure, shutdown)
//! - Per-label alert cooldown
//! - The alert dispatcher (snapshot upload + notifications)
//! - Persisted configuration and process wiring

pub mod config;
pub mod config_store;
pub mod dedup;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod retry;
pub mod service;
pub mod supervisor;

pub use config::WorkerConfig;
pub use config_store::ConfigStore;
pub use dedup::AlertDeduplicator;
pub use dispatcher::{DispatchOutcome, DispatcherConfig, DispatcherHandle, NotificationDispatcher};
pub use error::{WorkerError, WorkerResult};
pub use events::{alert_channel, AlertEvent, AlertNotice, AlertSender, FrameEvent, FrameReceiver};
pub use logging::{init_tracing, CameraLogger};
pub use pipeline::{CameraPipeline, LiveSettings, PipelineState, PipelineStatus, StopSignal};
pub use retry::FailureTracker;
pub use service::{notification_channel_from_env, MediaBackends, Watchpost};
pub use supervisor::{PipelineSupervisor, ReconfigureOutcome};
