/**
 * Classroom Sync Server Entry Point
 *
 * Loads configuration, installs tracing, and serves the sync API and the
 * WebSocket endpoint until Ctrl-C.
 */

use classroom_sync::backend::server::init::create_app;
use classroom_sync::backend::sync::SyncService;
use classroom_sync::shared::SyncConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenv::dotenv().ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = SyncConfig::from_env()?;
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));

    let (app, sync) = create_app(config).await;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("[Server] Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(sync))
        .await?;

    tracing::info!("[Server] Shut down");
    Ok(())
}

/// Resolve on Ctrl-C after closing every socket with 1001
async fn shutdown_signal(sync: SyncService) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("[Server] Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("[Server] Shutdown signal received");
    let closed = sync.shutdown().await;
    tracing::info!("[Server] Closed {} sockets", closed);
}
