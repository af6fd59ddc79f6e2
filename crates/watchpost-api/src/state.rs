//! Application state.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use watchpost_worker::{ConfigStore, PipelineSupervisor, Watchpost};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: Arc<ConfigStore>,
    pub supervisor: Arc<PipelineSupervisor>,
    /// JPEG quality for frames served over HTTP
    pub jpeg_quality: u8,
    /// Flips to `true` when the server starts shutting down
    pub shutdown: watch::Receiver<bool>,
    /// Serializes camera mutations that touch both the store and the supervisor
    pub camera_ops: Arc<Mutex<()>>,
}

impl AppState {
    /// Share the config store and supervisor of a running Watchpost.
    pub fn new(
        config: ApiConfig,
        watchpost: &Watchpost,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            store: watchpost.store(),
            supervisor: watchpost.supervisor(),
            jpeg_quality: watchpost.config().jpeg_quality,
            shutdown,
            camera_ops: Arc::new(Mutex::new(())),
        }
    }
}
