//! Serve command implementation.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use teller_core::Ledger;
use teller_server::{Server, ServerConfig};
use tracing::info;

/// Opens the ledger, runs recovery, and serves until interrupted.
pub fn run(
    path: &Path,
    bind_addr: SocketAddr,
    max_connections: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let ledger = Ledger::open(path)?;
    let stats = ledger.replay_stats();
    info!(
        replayed = stats.replayed,
        already_applied = stats.already_applied,
        discarded = stats.discarded,
        malformed = stats.malformed,
        "recovery complete"
    );

    let config = ServerConfig::new(bind_addr).with_max_connections(max_connections);
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let server = Server::bind(&config, Arc::new(ledger)).await?;
        server.run().await
    })?;
    Ok(())
}
