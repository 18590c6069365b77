//! TCP accept loop.

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::session::Session;
use std::net::SocketAddr;
use std::sync::Arc;
use teller_core::Ledger;
use tokio::io::{split, BufReader};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// The teller server: one shared ledger, one task per connection.
pub struct Server {
    listener: TcpListener,
    ledger: Arc<Ledger>,
    permits: Arc<Semaphore>,
}

impl Server {
    /// Binds the listening socket. The ledger is opened by the caller so
    /// that recovery has already run by the time clients can connect.
    ///
    /// # Errors
    ///
    /// Propagates the bind error.
    pub async fn bind(config: &ServerConfig, ledger: Arc<Ledger>) -> ServerResult<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        info!(addr = %listener.local_addr()?, "listening");
        Ok(Self {
            listener,
            ledger,
            permits: Arc::new(Semaphore::new(config.max_connections)),
        })
    }

    /// Returns the bound address, useful when binding port 0.
    ///
    /// # Errors
    ///
    /// Propagates the socket error.
    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until the task is cancelled.
    ///
    /// Each connection gets its own task; a failed session is logged and
    /// never takes the server down. When `max_connections` sessions are
    /// live, further accepts wait for a slot.
    ///
    /// # Errors
    ///
    /// Returns only fatal accept errors.
    pub async fn run(self) -> ServerResult<()> {
        loop {
            // The semaphore is never closed, so acquire cannot fail.
            let permit = Arc::clone(&self.permits).acquire_owned().await.ok();
            let (stream, peer) = self.listener.accept().await?;
            let ledger = Arc::clone(&self.ledger);

            tokio::spawn(async move {
                let _permit = permit;
                info!(%peer, "connection accepted");
                let (reader, writer) = split(stream);
                let session = Session::new(ledger, BufReader::new(reader), writer);
                if let Err(err) = session.run().await {
                    warn!(%peer, %err, "session ended with error");
                }
            });
        }
    }
}
