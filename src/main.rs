use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sheetstore::{
    AccessControl, AppState, GrantTable, MemoryStore, RecordStore, SheetService, build_router,
    config::AppConfig,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::parse();
    init_tracing(&config.log_filter);

    let store: Arc<dyn RecordStore> = match &config.snapshot_path {
        Some(path) => {
            info!(path = %path.display(), "using snapshot-backed store");
            let store = MemoryStore::open(path)
                .await
                .with_context(|| format!("failed to open snapshot at {}", path.display()))?;
            Arc::new(store)
        }
        None => {
            info!("using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };
    let access: Arc<dyn AccessControl> = match config.grants_path() {
        Some(path) => {
            let grants = GrantTable::open(&path)
                .await
                .with_context(|| format!("failed to open grants at {}", path.display()))?;
            Arc::new(grants)
        }
        None => Arc::new(GrantTable::new()),
    };

    let app = build_router(AppState::new(SheetService::new(store, access)));

    let addr = config.address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(address = %addr, "sheetstore started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to install Ctrl+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to install SIGTERM handler");
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
}
