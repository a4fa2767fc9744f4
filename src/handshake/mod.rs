//! Disguise-handshake parsing, authentication, and reply composition.
//!
//! The opening message a tunnel client sends is shaped exactly like a TLS
//! ClientHello. The credential lives inside the 32-byte random field:
//!
//! ```text
//! +----------------+------------------+----------+
//! |   salt (16)    | masked ts (8)    | tag (8)  |
//! +----------------+------------------+----------+
//! ```
//!
//! The timestamp is XOR-masked with a keystream derived from the salt, and
//! the tag authenticates salt plus masked timestamp, all keyed by a secret
//! shared out-of-band. To anyone without the key the whole field is
//! indistinguishable from the random a browser would send.
//!
//! Verification enforces three independent checks: the tag, freshness of
//! the unmasked timestamp, and non-replay via the nonce cache. Any single
//! failure routes the connection to web passthrough; a probe can never
//! distinguish "malformed" from "wrong key".

mod auth;
mod hello;
mod reply;

pub use auth::{authenticate, embed_proof, verify_proof, MasterKey, TIMESTAMP_TOLERANCE_SECS};
pub use hello::{parse_client_hello, ClientHelloBuilder, Extension, ParsedClientHello};
pub use reply::compose_reply;

/// Size of the random field carrying the proof.
pub const RANDOM_SIZE: usize = 32;

/// Size of the random salt prefix inside the proof.
pub const SALT_SIZE: usize = 16;

/// Size of the authentication tag suffix inside the proof.
pub const TAG_SIZE: usize = 8;

/// Number of follow-up messages a client sends after the reply, read and
/// discarded before the connection switches to tunnel framing.
pub const DISCARD_MESSAGES: usize = 2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proof_layout() {
        // salt + masked timestamp + tag must exactly fill the random field
        assert_eq!(SALT_SIZE + 8 + TAG_SIZE, RANDOM_SIZE);
    }
}
