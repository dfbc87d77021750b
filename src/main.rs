use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use frontdesk::api::api_router;
use frontdesk::config::{Config, APP_NAME, APP_VERSION};
use frontdesk::db;
use frontdesk::mailer::LogMailer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!(version = APP_VERSION, "Starting {APP_NAME}");

    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::create_dir_all(&config.files_dir)?;

    // Open once at startup so migrations run before the first request.
    let conn = db::open_database(&config.db_path)?;
    drop(conn);
    tracing::info!(path = %config.db_path.display(), "Database ready");

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "Listening");

    let app = api_router(config, Arc::new(LogMailer));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install shutdown handler");
    }
}
