//! # Quietgate
//!
//! A traffic-camouflage relay. Quietgate sits on a public port and inspects
//! the first bytes of every inbound TCP connection. Connections that carry a
//! valid credential, steganographically embedded in what looks like a normal
//! TLS ClientHello, are bridged to a backend tunnel server using TLS
//! application-data framing. Everything else is transparently forwarded to a
//! real web server, so the endpoint is indistinguishable from an ordinary
//! HTTPS site to both passive observers and active probers.
//!
//! ## Connection flow
//!
//! ```text
//! Client                        Quietgate                     Backends
//!   |                               |                             |
//!   |  opening message (1st read)   |                             |
//!   |------------------------------>|                             |
//!   |                               |-- parse + verify proof      |
//!   |                               |                             |
//!   |          not a client?        |  forward bytes verbatim     |
//!   |                               |---------------------------->| web server
//!   |                               |                             |
//!   |  disguise reply (3 records)   |     authenticated?          |
//!   |<------------------------------|                             |
//!   |  2 follow-up messages         |                             |
//!   |------------------------------>|  (read and discarded)       |
//!   |                               |                             |
//!   |====== framed relay ==========>|====== raw payload =========>| tunnel server
//! ```
//!
//! Quietgate never terminates real TLS. It parses only enough of the
//! handshake structure to extract identifying fields, and every failure mode
//! a probe can trigger looks like an ordinary web server's behavior.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod error;
pub mod handshake;
pub mod record;
pub mod relay;
pub mod replay;
pub mod server;
pub mod state;

pub use error::{Error, Result};

/// Default public-facing port. Since this is a TLS disguise it should be 443.
pub const DEFAULT_PORT: u16 = 443;
