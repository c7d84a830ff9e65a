//! Worker pool and per-port wiring
//!
//! Builds the runtime, then opens one room and one listener per
//! configured port. Rooms are never shared between ports.

use std::sync::Arc;

use tokio::runtime::Runtime;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::journal::Journal;
use crate::listener::Listener;
use crate::server::RoomServer;

/// Build the multi-threaded runtime that runs every room and connection
pub fn build_runtime(workers: usize) -> std::io::Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(workers)
        .thread_name("portchat-worker")
        .enable_all()
        .build()
}

/// Bind every configured port and serve until the process is stopped
///
/// Fails only if a port cannot be bound.
pub async fn serve(config: &ServerConfig) -> Result<(), AppError> {
    let journal = Arc::new(Journal::new(&config.history_dir));
    let mut listeners = JoinSet::new();

    for &port in &config.ports {
        let room = RoomServer::open(port, journal.clone());
        let listener = Listener::bind((config.host.as_str(), port), room).await?;
        info!("Listening on {}", listener.local_addr()?);
        listeners.spawn(listener.run());
    }

    info!(
        "Server started: {} port(s), {} worker(s)",
        config.ports.len(),
        config.workers
    );

    while let Some(result) = listeners.join_next().await {
        if let Err(e) = result {
            error!("Listener task failed: {}", e);
        }
    }
    Ok(())
}
