//! Relay configuration.
//!
//! Configuration comes from a TOML file, from `QG_*` environment variables,
//! or both (environment overrides the file). Invalid configuration is
//! process-fatal before any connection is accepted.

use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Server configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Public-facing listen address. Should be 0.0.0.0 in production.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Public-facing listen port. Since this is a TLS disguise it should
    /// be 443.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Tunnel backend host. Should stay 127.0.0.1; running the backend on
    /// a separate machine is not supported.
    #[serde(default = "default_tunnel_host")]
    pub tunnel_host: String,
    /// Tunnel backend port.
    #[serde(default = "default_tunnel_port")]
    pub tunnel_port: u16,
    /// host:port of the real web server unrecognized traffic is forwarded
    /// to.
    #[serde(default)]
    pub web_server_addr: String,
    /// Shared secret the proof key is derived from.
    #[serde(default)]
    pub secret: String,
}

fn default_listen_addr() -> String {
    "0.0.0.0".into()
}

fn default_listen_port() -> u16 {
    crate::DEFAULT_PORT
}

fn default_tunnel_host() -> String {
    "127.0.0.1".into()
}

fn default_tunnel_port() -> u16 {
    8388
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            listen_port: default_listen_port(),
            tunnel_host: default_tunnel_host(),
            tunnel_port: default_tunnel_port(),
            web_server_addr: String::new(),
            secret: String::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file. Does not validate; callers
    /// overlay the environment first.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::config(format!("failed to read config file: {}", e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::config(format!("failed to parse config file: {}", e)))
    }

    /// Build configuration from environment variables alone.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.overlay_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply any set `QG_*` environment variables on top of this
    /// configuration.
    pub fn overlay_env(&mut self) -> Result<()> {
        if let Ok(addr) = env::var("QG_LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        if let Some(port) = env_port("QG_LISTEN_PORT")? {
            self.listen_port = port;
        }
        if let Ok(host) = env::var("QG_TUNNEL_HOST") {
            self.tunnel_host = host;
        }
        if let Some(port) = env_port("QG_TUNNEL_PORT")? {
            self.tunnel_port = port;
        }
        if let Ok(addr) = env::var("QG_WEB_SERVER") {
            self.web_server_addr = addr;
        }
        if let Ok(secret) = env::var("QG_SECRET") {
            self.secret = secret;
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.is_empty() {
            return Err(Error::config("listen_addr cannot be empty"));
        }
        if self.tunnel_host.is_empty() {
            return Err(Error::config("tunnel_host cannot be empty"));
        }
        if self.tunnel_port == 0 {
            return Err(Error::config("tunnel_port cannot be 0"));
        }
        if self.web_server_addr.is_empty() {
            return Err(Error::config(
                "web_server_addr must name the camouflage web server",
            ));
        }
        if !self.web_server_addr.contains(':') {
            return Err(Error::config("web_server_addr must be host:port"));
        }
        if self.secret.is_empty() {
            return Err(Error::config("secret cannot be empty"));
        }
        Ok(())
    }

    /// The listen address as host:port.
    pub fn listen_socket_addr(&self) -> String {
        format!("{}:{}", self.listen_addr, self.listen_port)
    }
}

fn env_port(name: &str) -> Result<Option<u16>> {
    match env::var(name) {
        Ok(value) => value
            .parse::<u16>()
            .map(Some)
            .map_err(|e| Error::config(format!("{}: {}", name, e))),
        Err(_) => Ok(None),
    }
}
