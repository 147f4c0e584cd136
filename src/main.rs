use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use visitor_stats::analytics::VisitorTracker;
use visitor_stats::api;
use visitor_stats::config::Config;
use visitor_stats::storage::{SqliteStorage, Storage};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize storage
    info!("Using SQLite storage: {}", config.database.url);
    let storage: Arc<dyn Storage> = Arc::new(
        SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
    );

    info!("Initializing database...");
    storage.init().await?;
    info!("Database initialized successfully");

    info!(
        "Dedup window {}s, report window {} days, proxy mode {:?}",
        config.tracking.dedup_window_secs,
        config.tracking.report_window_days,
        config.tracking.trusted_proxy_mode
    );
    let tracker = Arc::new(VisitorTracker::new(
        Arc::clone(&storage),
        config.tracking.clone(),
    ));

    let router = api::create_api_router(tracker);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 Visitor stats server listening on http://{}", addr);
    info!("   - Tracking endpoints available at http://{}/api/...", addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
