//! beacond — Beacon rendezvous directory daemon.

use std::sync::Arc;

use anyhow::{Context, Result};

use beacon_core::config::BeaconConfig;
use beacon_directory::{ApiState, Directory, MemoryStore, RegistryStore, RemoteStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = BeaconConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = BeaconConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        BeaconConfig::default()
    });

    // The backend is fixed for the life of the process.
    let store: Arc<dyn RegistryStore> = match config.directory.remote_store() {
        Some(url) => {
            tracing::info!(url, "using remote registry store");
            Arc::new(RemoteStore::new(url))
        }
        None => {
            tracing::info!("using in-process registry store");
            Arc::new(MemoryStore::new())
        }
    };
    let directory = Arc::new(Directory::new(store));

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    beacon_directory::api::serve(
        ApiState { directory },
        config.directory.listen_port,
        shutdown_tx.subscribe(),
    )
    .await
    .context("directory API server failed")
}
