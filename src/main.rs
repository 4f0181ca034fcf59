//! Process bootstrap: tracing, settings, Kubernetes client, watch loops,
//! and the health HTTP server with graceful shutdown.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cluster_vitals::server::{self, AppState};
use cluster_vitals::settings::Settings;
use cluster_vitals::watch::Coordinator;
use cluster_vitals::HealthCache;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::parse();
    info!("Starting cluster-vitals v{}", env!("CARGO_PKG_VERSION"));

    let cache = Arc::new(HealthCache::with_config(settings.cache_config()));
    let ready = Arc::new(AtomicBool::new(false));

    // Bootstrap failure here is fatal; nothing starts without a client.
    let client = kube::Client::try_default()
        .await
        .context("failed to construct Kubernetes client")?;
    info!("Connected to Kubernetes cluster");

    let coordinator = Coordinator::start(
        client,
        cache.clone(),
        ready.clone(),
        settings.watch_settings(),
    );

    let app = server::router(AppState { cache, ready });
    let listener = tokio::net::TcpListener::bind(settings.bind_addr)
        .await
        .context("failed to bind health endpoint")?;
    info!("Health HTTP server listening on {}", settings.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("health HTTP server failed")?;

    info!("Shutting down watch loops");
    coordinator.shutdown().await;
    info!("cluster-vitals stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        () = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}
