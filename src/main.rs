mod api;
mod config;
mod core;
mod error;
mod models;
mod observability;
mod state;
mod store;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::store::file::FileStore;
use crate::store::memory::MemoryStore;
use crate::store::BlobStore;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let store: Arc<dyn BlobStore> = if config.data_dir.is_empty() {
        tracing::info!("using in-memory store (no DATA_DIR set)");
        Arc::new(MemoryStore::new())
    } else {
        tracing::info!(data_dir = %config.data_dir, "using file-backed store");
        Arc::new(FileStore::new(&config.data_dir)?)
    };

    let app_state = state::AppState::new(store, config.transition_policy)?;

    if config.seed_demo_users {
        app_state.directory.seed_demo()?;
    }

    let shared_state = Arc::new(app_state);
    let app = api::rest::router(shared_state);

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| error::AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| error::AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
