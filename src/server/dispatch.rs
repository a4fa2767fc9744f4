//! Per-connection dispatch state machine.
//!
//! `Accepted → AwaitingOpening → {WebMode | TunnelHandshakeReply →
//! TunnelDiscard(2) → TunnelMode}`. All steps up to the relay run strictly
//! sequentially on one task; no error here ever affects another connection
//! or the accept loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::handshake::{authenticate, compose_reply, parse_client_hello, DISCARD_MESSAGES};
use crate::record;
use crate::relay::Pipe;
use crate::server::ServerMetrics;
use crate::state::ServerState;

/// Deadline for the very first read. A peer that connects and sends
/// nothing is treated as scanning traffic and dropped.
pub const FIRST_READ_TIMEOUT: Duration = Duration::from_secs(3);

const OPENING_BUF_SIZE: usize = 1500;

/// Drive one accepted connection from first byte to relay teardown.
pub(crate) async fn dispatch(
    state: Arc<ServerState>,
    metrics: Arc<ServerMetrics>,
    mut client: TcpStream,
    peer: SocketAddr,
) -> Result<()> {
    client.set_nodelay(true)?;

    let mut buf = vec![0u8; OPENING_BUF_SIZE];
    let n = match timeout(FIRST_READ_TIMEOUT, client.read(&mut buf)).await {
        Ok(Ok(0)) => return Ok(()),
        Ok(Ok(n)) => n,
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => return Err(Error::Timeout),
    };
    buf.truncate(n);

    let hello = match parse_client_hello(&buf) {
        Ok(hello) => hello,
        Err(_) => return go_web(state, metrics, client, buf).await,
    };

    if !authenticate(&hello, &state) {
        metrics.record_non_protocol();
        tracing::info!(peer = %peer, "non-protocol traffic observed");
        return go_web(state, metrics, client, buf).await;
    }

    client.write_all(&compose_reply(&hello, state.key())).await?;

    // The client's two fixed follow-up messages carry nothing we need.
    for _ in 0..DISCARD_MESSAGES {
        record::read_frame(&mut client).await?;
    }

    let backend = match TcpStream::connect(state.tunnel_addr()).await {
        Ok(backend) => backend,
        Err(e) => {
            // Fatal for this connection only, never for the process.
            tracing::error!("tunnel backend dial failed: {}", e);
            return Ok(());
        }
    };

    metrics.record_tunneled();
    tracing::debug!(peer = %peer, "tunnel established");
    Pipe::tunnel(client, backend).run().await;
    Ok(())
}

/// Route a connection to the web backend, forwarding the already-read
/// opening bytes verbatim as the first chunk.
async fn go_web(
    state: Arc<ServerState>,
    metrics: Arc<ServerMetrics>,
    client: TcpStream,
    opening: Vec<u8>,
) -> Result<()> {
    let mut backend = match TcpStream::connect(state.web_addr()).await {
        Ok(backend) => backend,
        Err(e) => {
            tracing::error!("web backend dial failed: {}", e);
            return Ok(());
        }
    };

    backend.write_all(&opening).await?;

    metrics.record_proxied();
    Pipe::web(client, backend).run().await;
    Ok(())
}
