//! Connection counters.
//!
//! Aggregates only; nothing here identifies a peer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Server metrics collector.
pub struct ServerMetrics {
    start_time: Instant,
    total_connections: AtomicU64,
    active_connections: AtomicU64,
    tunneled_connections: AtomicU64,
    proxied_connections: AtomicU64,
    /// Opening messages that parsed as a handshake but failed
    /// authentication.
    non_protocol: AtomicU64,
}

impl ServerMetrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            tunneled_connections: AtomicU64::new(0),
            proxied_connections: AtomicU64::new(0),
            non_protocol: AtomicU64::new(0),
        }
    }

    /// Record an accepted connection.
    pub fn connection_opened(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a finished connection.
    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record a connection routed to the tunnel backend.
    pub fn record_tunneled(&self) {
        self.tunneled_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection routed to the web backend.
    pub fn record_proxied(&self) {
        self.proxied_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Record well-formed but unauthenticated traffic.
    pub fn record_non_protocol(&self) {
        self.non_protocol.fetch_add(1, Ordering::Relaxed);
    }

    /// Uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Total connections accepted.
    pub fn total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    /// Connections currently live.
    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Connections that completed the disguise handshake.
    pub fn tunneled_connections(&self) -> u64 {
        self.tunneled_connections.load(Ordering::Relaxed)
    }

    /// Connections forwarded to the web backend.
    pub fn proxied_connections(&self) -> u64 {
        self.proxied_connections.load(Ordering::Relaxed)
    }

    /// Well-formed but unauthenticated opening messages observed.
    pub fn non_protocol(&self) -> u64 {
        self.non_protocol.load(Ordering::Relaxed)
    }
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
