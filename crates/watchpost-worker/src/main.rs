//! Headless Watchpost worker: runs every configured camera until Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info};

use watchpost_storage::{S3ArtifactStore, S3Client};
use watchpost_worker::{
    init_tracing, notification_channel_from_env, ConfigStore, MediaBackends, Watchpost,
    WorkerConfig,
};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    let _ = rustls::crypto::ring::default_provider().install_default();

    dotenvy::dotenv().ok();
    init_tracing();

    if let Err(e) = run().await {
        error!("Worker failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    info!("Starting watchpost-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Some(port) = std::env::var("METRICS_PORT").ok().and_then(|s| s.parse::<u16>().ok()) {
        PrometheusBuilder::new()
            .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
            .install()
            .context("failed to start metrics exporter")?;
        info!(port, "Prometheus exporter listening");
    }

    let store = Arc::new(
        ConfigStore::open(&config.config_path)
            .await
            .context("failed to load config")?,
    );
    let media = MediaBackends::from_config(&store).await?;

    let s3 = S3Client::from_env().await.context("failed to create S3 client")?;
    let artifacts = Arc::new(S3ArtifactStore::new(s3));
    let channel = notification_channel_from_env()?;

    let watchpost = Watchpost::new(config, store, media, artifacts, channel);
    let started = watchpost.start_all().await?;
    info!(started, "Cameras started");

    tokio::signal::ctrl_c().await.ok();
    info!("Received shutdown signal");

    watchpost.shutdown().await;
    Ok(())
}
