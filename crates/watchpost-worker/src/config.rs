//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Process-level settings for pipelines and the alert dispatcher.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Path of the JSON application config (cameras, phones, detection settings)
    pub config_path: PathBuf,
    /// Capacity of the queue between pipelines and the dispatcher
    pub alert_queue_capacity: usize,
    /// Maximum alerts handled concurrently by the dispatcher
    pub dispatch_max_concurrent: usize,
    /// Optional local archive for alert snapshots
    pub snapshot_dir: Option<PathBuf>,
    /// Lifetime of presigned snapshot URLs
    pub snapshot_url_ttl: Duration,
    /// JPEG quality for snapshots
    pub jpeg_quality: u8,
    /// How long the dispatcher may spend draining in-flight alerts on shutdown
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config.json"),
            alert_queue_capacity: 64,
            dispatch_max_concurrent: 2,
            snapshot_dir: None,
            snapshot_url_ttl: Duration::from_secs(86_400),
            jpeg_quality: 90,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            config_path: std::env::var("WATCHPOST_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("config.json")),
            alert_queue_capacity: std::env::var("ALERT_QUEUE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(64),
            dispatch_max_concurrent: std::env::var("DISPATCH_MAX_CONCURRENT")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(2),
            snapshot_dir: std::env::var("SNAPSHOT_DIR")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            snapshot_url_ttl: Duration::from_secs(
                std::env::var("SNAPSHOT_URL_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(86_400),
            ),
            jpeg_quality: std::env::var("SNAPSHOT_JPEG_QUALITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(90),
            shutdown_timeout: Duration::from_secs(
                std::env::var("DISPATCH_SHUTDOWN_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }
}
