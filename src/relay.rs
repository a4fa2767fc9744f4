//! Bidirectional relay between an accepted connection and a backend.
//!
//! One relay pair runs as two independent unidirectional copy tasks. The
//! first I/O failure or EOF in either direction tears down both legs:
//! the surviving task is aborted and both socket halves are dropped, which
//! closes the connections without blocking on the peer. The two directions
//! share no mutable state beyond the socket handles.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use crate::record::{self, APPLICATION_DATA, RECORD_VERSION};

const WEB_BUF_SIZE: usize = 16 * 1024;

/// Largest chunk read from the tunnel backend per frame. Safely under the
/// record layer's 16 KiB ceiling.
const TUNNEL_CHUNK_SIZE: usize = 10 * 1024;

/// A connection pair plus its routing mode.
///
/// The tag picks the framing strategy; the relay loops themselves are
/// shared.
pub enum Pipe {
    /// Transparent web passthrough: byte-for-byte copy in both directions.
    Web {
        /// The accepted connection
        client: TcpStream,
        /// The camouflage web server
        backend: TcpStream,
    },
    /// Authenticated tunnel: framed toward the client, raw toward the
    /// backend.
    Tunnel {
        /// The accepted connection
        client: TcpStream,
        /// The backend tunnel server
        backend: TcpStream,
    },
}

impl Pipe {
    /// Pair an accepted connection with the web backend.
    pub fn web(client: TcpStream, backend: TcpStream) -> Self {
        Pipe::Web { client, backend }
    }

    /// Pair an authenticated connection with the tunnel backend.
    pub fn tunnel(client: TcpStream, backend: TcpStream) -> Self {
        Pipe::Tunnel { client, backend }
    }

    /// Pump bytes until either direction fails, then close both legs.
    pub async fn run(self) {
        match self {
            Pipe::Web { client, backend } => {
                let (client_r, client_w) = client.into_split();
                let (backend_r, backend_w) = backend.into_split();
                race(
                    tokio::spawn(copy_raw(client_r, backend_w)),
                    tokio::spawn(copy_raw(backend_r, client_w)),
                )
                .await;
            }
            Pipe::Tunnel { client, backend } => {
                let (client_r, client_w) = client.into_split();
                let (backend_r, backend_w) = backend.into_split();
                race(
                    tokio::spawn(unwrap_frames(client_r, backend_w)),
                    tokio::spawn(wrap_chunks(backend_r, client_w)),
                )
                .await;
            }
        }
    }
}

/// Wait for the first copy task to finish and abort the other. Aborting
/// drops the surviving task's socket halves, so both legs close without
/// waiting on the peer.
async fn race(mut a: JoinHandle<()>, mut b: JoinHandle<()>) {
    tokio::select! {
        _ = &mut a => b.abort(),
        _ = &mut b => a.abort(),
    }
}

/// Plain byte-for-byte copy (web mode, both directions).
async fn copy_raw(mut reader: OwnedReadHalf, mut writer: OwnedWriteHalf) {
    let mut buf = vec![0u8; WEB_BUF_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => {
                if writer.write_all(&buf[..n]).await.is_err() {
                    return;
                }
            }
        }
    }
}

/// Tunnel client → backend: strip record framing, forward decoded payload.
async fn unwrap_frames(mut client: OwnedReadHalf, mut backend: OwnedWriteHalf) {
    loop {
        let frame = match record::read_frame(&mut client).await {
            Ok(frame) => frame,
            Err(_) => return,
        };
        if backend.write_all(record::peel_frame(&frame)).await.is_err() {
            return;
        }
    }
}

/// Tunnel backend → client: read opportunistically, wrap each chunk as an
/// application-data record.
async fn wrap_chunks(mut backend: OwnedReadHalf, mut client: OwnedWriteHalf) {
    let mut buf = vec![0u8; TUNNEL_CHUNK_SIZE];
    loop {
        let n = match backend.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        let frame = match record::add_frame(&buf[..n], APPLICATION_DATA, RECORD_VERSION) {
            Ok(frame) => frame,
            Err(_) => return,
        };
        if client.write_all(&frame).await.is_err() {
            return;
        }
    }
}
