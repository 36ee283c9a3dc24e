//! courtsided entry point.
//!
//! Boots the interception worker over the persistent store and drives it
//! from an event channel until the process is told to stop. Logging goes
//! to stderr as JSON so stdout stays free for piped callers.

use anyhow::Result;
use courtside_client::net::HttpBackend;
use courtside_core::{AppConfig, CacheDb};
use courtside_worker::{InterceptionWorker, WorkerEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(version = %config.cache_version, db = %config.db_path.display(), "starting courtsided");

    let store = CacheDb::open(&config.db_path).await?;
    let backend = Arc::new(HttpBackend::new(&config)?);
    let worker = InterceptionWorker::new(&config, store, backend)?;

    // A failed install keeps the previous generation serving; activation
    // only runs after a complete install.
    match worker.install().await {
        Ok(()) => worker.activate().await?,
        Err(error) => tracing::warn!(%error, "install failed, keeping previous generation"),
    }

    let (events, rx) = mpsc::channel::<WorkerEvent>(64);
    let loop_handle = tokio::spawn(Arc::new(worker).run(rx, None));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    drop(events);
    loop_handle.await?;

    Ok(())
}
