use anyhow::Context;
use tokio::net::TcpListener;
use todo_server::{Config, TodoStore};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = Config::from_env()?;
    let store = TodoStore::open(&config.database_path).with_context(|| {
        format!("failed to open database at {}", config.database_path.display())
    })?;

    let addr = config.listen_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(port = config.port, "todo API server running");
    tracing::info!(environment = %config.environment, "environment");
    tracing::info!(origins = ?config.allowed_origins, "CORS enabled");
    for endpoint in todo_server::ENDPOINTS {
        tracing::info!("  {endpoint}");
    }

    let app = todo_server::app(store.clone(), &config.allowed_origins);
    let served = todo_server::run(listener, app, todo_server::shutdown_signal()).await;

    match store.close().await {
        Ok(()) => tracing::info!("database connection closed"),
        Err(err) => tracing::error!(error = %err, "error closing database"),
    }

    served.context("server error")
}

/// Stdout logging filtered by `RUST_LOG`, `info` when unset.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}
