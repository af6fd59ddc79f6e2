//! Watchpost server: camera pipelines plus the HTTP control surface.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info, warn};

use watchpost_api::{create_router, metrics, ApiConfig, AppState};
use watchpost_storage::{S3ArtifactStore, S3Client};
use watchpost_worker::{
    init_tracing, notification_channel_from_env, ConfigStore, MediaBackends, Watchpost,
    WorkerConfig,
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Install rustls crypto provider (required for rustls 0.23+)
    let _ = rustls::crypto::ring::default_provider().install_default();

    init_tracing();

    if let Err(e) = run().await {
        error!("Server failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    info!("Starting watchpost-api");

    let config = ApiConfig::from_env();
    info!("API config: host={}, port={}", config.host, config.port);
    let worker_config = WorkerConfig::from_env();

    let metrics_handle = if config.metrics_enabled {
        match metrics::init_metrics() {
            Ok(handle) => {
                info!("Prometheus metrics enabled at /metrics");
                Some(handle)
            }
            Err(e) => {
                warn!("Prometheus recorder unavailable: {}", e);
                None
            }
        }
    } else {
        None
    };

    let store = Arc::new(
        ConfigStore::open(&worker_config.config_path)
            .await
            .context("failed to load config")?,
    );
    let media = MediaBackends::from_config(&store).await?;
    let s3 = S3Client::from_env().await.context("failed to create S3 client")?;
    let artifacts = Arc::new(S3ArtifactStore::new(s3));
    let channel = notification_channel_from_env()?;

    let watchpost = Watchpost::new(worker_config, store, media, artifacts, channel);
    let started = watchpost.start_all().await?;
    info!(started, "Cameras started");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let app = create_router(
        AppState::new(config.clone(), &watchpost, shutdown_rx),
        metrics_handle,
    );

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await;

    watchpost.shutdown().await;
    served.context("server error")?;
    info!("Server shutdown complete");
    Ok(())
}

/// Wait for Ctrl-C, then end open alert streams so the server can drain.
async fn shutdown_signal(streams: watch::Sender<bool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Received shutdown signal");
    streams.send_replace(true);
}
