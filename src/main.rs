use std::sync::Arc;

use anyhow::Result;
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use aquarium_tracker::{
    api::{self, AppState},
    config::Config,
    db,
    object_store::LocalObjectStorage,
    seed,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (ignore error if file absent; env vars may be set externally)
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    info!(backend = %config.store_backend, "Configuration loaded");

    let repo = db::connect(&config).await?;

    if config.seed_on_start {
        match seed::preload_default_data(repo.as_ref()).await? {
            Some(project_id) => info!(project_id = %project_id, "Demo project created"),
            None => info!("Store already has projects; demo data not loaded"),
        }
    }

    let storage = LocalObjectStorage::new(
        config.photo_storage_dir.clone(),
        &config.photo_public_base_url,
    );
    info!(
        dir = %config.photo_storage_dir.display(),
        base_url = %config.photo_public_base_url,
        "Photo storage ready"
    );

    let state = AppState::new(repo, Arc::new(storage));

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
