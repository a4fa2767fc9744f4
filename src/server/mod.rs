//! Public listener, configuration, and per-connection dispatch.

mod config;
mod dispatch;
mod metrics;

pub use config::ServerConfig;
pub use dispatch::FIRST_READ_TIMEOUT;
pub use metrics::ServerMetrics;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::error::Result;
use crate::replay;
use crate::state::ServerState;

/// The camouflage relay server.
pub struct Server {
    listener: TcpListener,
    state: Arc<ServerState>,
    metrics: Arc<ServerMetrics>,
}

impl Server {
    /// Validate the configuration, bind the public listener, and derive the
    /// proof key. Any failure here is process-fatal by design.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        let listener = TcpListener::bind(config.listen_socket_addr()).await?;
        Ok(Self {
            listener,
            state: Arc::new(ServerState::new(&config)),
            metrics: Arc::new(ServerMetrics::new()),
        })
    }

    /// The bound listen address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle to the connection counters.
    pub fn metrics(&self) -> Arc<ServerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Hex fingerprint of the derived proof key, safe to log.
    pub fn key_fingerprint(&self) -> String {
        self.state.key().fingerprint()
    }

    /// Accept connections forever.
    ///
    /// Starts the replay-cache sweeper once, then spawns one dispatch task
    /// per accepted connection. The loop survives every per-connection
    /// failure.
    pub async fn run(self) -> Result<()> {
        tokio::spawn(replay::run_sweeper(Arc::clone(&self.state)));

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let state = Arc::clone(&self.state);
                    let metrics = Arc::clone(&self.metrics);

                    tokio::spawn(async move {
                        metrics.connection_opened();

                        if let Err(e) =
                            dispatch::dispatch(state, Arc::clone(&metrics), stream, peer).await
                        {
                            tracing::debug!(peer = %peer, "connection ended: {}", e);
                        }

                        metrics.connection_closed();
                    });
                }
                Err(e) => {
                    tracing::warn!("accept error: {}", e);
                }
            }
        }
    }
}
