//! Process-wide server state.
//!
//! Initialized once at startup and immutable afterwards except for the
//! replay cache. Shared via `Arc` with every connection task and the
//! background sweeper; no ambient globals.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::handshake::MasterKey;
use crate::replay::ReplayCache;
use crate::server::ServerConfig;

/// Clock source, injectable for testability.
pub type Clock = fn() -> u64;

/// Current unix time in whole seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Shared state for all connection handlers.
pub struct ServerState {
    tunnel_addr: String,
    web_addr: String,
    key: MasterKey,
    clock: Clock,
    replay: ReplayCache,
}

impl ServerState {
    /// Build state from a validated configuration, deriving the proof key
    /// once. Uses the wall clock.
    pub fn new(config: &ServerConfig) -> Self {
        Self::with_clock(config, unix_now)
    }

    /// Build state with an explicit clock source.
    pub fn with_clock(config: &ServerConfig, clock: Clock) -> Self {
        Self {
            tunnel_addr: format!("{}:{}", config.tunnel_host, config.tunnel_port),
            web_addr: config.web_server_addr.clone(),
            key: MasterKey::derive(config.secret.as_bytes()),
            clock,
            replay: ReplayCache::new(),
        }
    }

    /// Address of the backend tunnel server.
    pub fn tunnel_addr(&self) -> &str {
        &self.tunnel_addr
    }

    /// Address of the camouflage web server.
    pub fn web_addr(&self) -> &str {
        &self.web_addr
    }

    /// The symmetric key used for proof verification.
    pub fn key(&self) -> &MasterKey {
        &self.key
    }

    /// Current time according to the configured clock.
    pub fn now(&self) -> u64 {
        (self.clock)()
    }

    /// The replay cache, the only mutable piece of shared state.
    pub fn replay(&self) -> &ReplayCache {
        &self.replay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ServerConfig {
        ServerConfig {
            listen_addr: "127.0.0.1".into(),
            listen_port: 443,
            tunnel_host: "127.0.0.1".into(),
            tunnel_port: 8388,
            web_server_addr: "127.0.0.1:8080".into(),
            secret: "a shared secret".into(),
        }
    }

    fn frozen_clock() -> u64 {
        1_700_000_000
    }

    #[test]
    fn test_state_from_config() {
        let state = ServerState::new(&test_config());
        assert_eq!(state.tunnel_addr(), "127.0.0.1:8388");
        assert_eq!(state.web_addr(), "127.0.0.1:8080");
        assert!(state.replay().is_empty());
    }

    #[test]
    fn test_injected_clock() {
        let state = ServerState::with_clock(&test_config(), frozen_clock);
        assert_eq!(state.now(), 1_700_000_000);
        assert_eq!(state.now(), state.now());
    }

    #[test]
    fn test_key_is_deterministic_per_secret() {
        let a = ServerState::new(&test_config());
        let b = ServerState::new(&test_config());
        assert_eq!(a.key().as_bytes(), b.key().as_bytes());

        let mut other = test_config();
        other.secret = "a different secret".into();
        let c = ServerState::new(&other);
        assert_ne!(a.key().as_bytes(), c.key().as_bytes());
    }
}
