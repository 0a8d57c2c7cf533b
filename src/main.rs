// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};
use tracing_subscriber::EnvFilter;

use crate::application::clock::SystemClock;
use crate::application::feed_service::TelemetryFeed;
use crate::infrastructure::config::load_config;
use crate::infrastructure::http_source::HttpTelemetrySource;
use crate::presentation::app_state::AppState;
use crate::presentation::router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "power_feed=info,tower_http=info".into()),
        )
        .init();

    // Load configuration
    let config = load_config()?;

    // Create telemetry source (infrastructure layer)
    let source = Arc::new(HttpTelemetrySource::new(
        &config.feed.base_url,
        &config.feed.path,
        config.feed.request_timeout(),
    )?);

    // Create feed (application layer)
    let feed = Arc::new(TelemetryFeed::new(
        source,
        Arc::new(SystemClock),
        config.feed.feed_settings()?,
    ));
    feed.start();

    // Build router (presentation layer)
    let state = Arc::new(AppState { feed: feed.clone() });
    let app = router(state);

    // Start server
    let addr: SocketAddr = config.server.bind.parse()?;
    tracing::info!("Starting power-feed service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal(feed))
        .await?;

    Ok(())
}

// Stopping the feed ends open window streams, which lets connections drain.
async fn shutdown_signal(feed: Arc<TelemetryFeed>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
    feed.stop();
}
