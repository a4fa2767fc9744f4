//! Proof embedding and verification.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::handshake::{ParsedClientHello, RANDOM_SIZE, SALT_SIZE, TAG_SIZE};
use crate::state::ServerState;

type HmacSha256 = Hmac<Sha256>;

/// Maximum clock difference between an embedded timestamp and the server's
/// clock. Must stay below the replay cache's 12h retention window so a
/// nonce can never become fresh again after being purged.
pub const TIMESTAMP_TOLERANCE_SECS: u64 = 3600;

const KDF_SALT: &[u8] = b"quietgate v1";
const KDF_INFO: &[u8] = b"proof key";
const MASK_LABEL: &[u8] = b"quietgate mask";
const TAG_LABEL: &[u8] = b"quietgate tag";

/// Symmetric key used for proof verification, derived once at startup from
/// the shared secret and never re-derived.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; 32]);

impl MasterKey {
    /// Derive the proof key from the out-of-band shared secret.
    pub fn derive(secret: &[u8]) -> Self {
        let hk = Hkdf::<Sha256>::new(Some(KDF_SALT), secret);
        let mut key = [0u8; 32];
        hk.expand(KDF_INFO, &mut key)
            .expect("32 bytes is a valid HKDF-SHA256 output length");
        MasterKey(key)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short hex fingerprint safe to log; never reveals key material.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0);
        hex::encode(&digest[..4])
    }
}

fn keyed_mac(key: &MasterKey, label: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let mut mac =
        HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
    mac.update(label);
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().into()
}

fn mask_for(key: &MasterKey, salt: &[u8]) -> [u8; 8] {
    let full = keyed_mac(key, MASK_LABEL, &[salt]);
    full[..8].try_into().expect("mask is 8 bytes")
}

fn tag_for(key: &MasterKey, salt: &[u8], masked_ts: &[u8]) -> [u8; TAG_SIZE] {
    let full = keyed_mac(key, TAG_LABEL, &[salt, masked_ts]);
    full[..TAG_SIZE].try_into().expect("tag is 8 bytes")
}

fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    // Constant-time comparison
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .fold(0u8, |acc, (x, y)| acc | (x ^ y))
            == 0
}

/// Build a proof-carrying random field for the opening message.
///
/// Used by client tooling and tests; the server only ever verifies.
pub fn embed_proof(key: &MasterKey, now: u64) -> [u8; RANDOM_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);

    let mask = mask_for(key, &salt);
    let ts = now.to_be_bytes();
    let mut masked = [0u8; 8];
    for i in 0..8 {
        masked[i] = ts[i] ^ mask[i];
    }
    let tag = tag_for(key, &salt, &masked);

    let mut random = [0u8; RANDOM_SIZE];
    random[..SALT_SIZE].copy_from_slice(&salt);
    random[SALT_SIZE..SALT_SIZE + 8].copy_from_slice(&masked);
    random[SALT_SIZE + 8..].copy_from_slice(&tag);
    random
}

/// Verify the proof embedded in a random field: tag first, then freshness
/// of the unmasked timestamp against `now`.
pub fn verify_proof(key: &MasterKey, random: &[u8; RANDOM_SIZE], now: u64) -> bool {
    let salt = &random[..SALT_SIZE];
    let masked = &random[SALT_SIZE..SALT_SIZE + 8];
    let tag = &random[SALT_SIZE + 8..];

    if !ct_eq(tag, &tag_for(key, salt, masked)) {
        return false;
    }

    let mask = mask_for(key, salt);
    let mut ts = [0u8; 8];
    for i in 0..8 {
        ts[i] = masked[i] ^ mask[i];
    }
    let ts = u64::from_be_bytes(ts);

    now.abs_diff(ts) <= TIMESTAMP_TOLERANCE_SECS
}

/// Decide whether a parsed opening message belongs to a legitimate tunnel
/// client.
///
/// All three checks must pass: proof tag, timestamp freshness, and
/// non-replay of the nonce. Any failure means "not a client" and the caller
/// falls through to web passthrough; nothing here ever escalates to an
/// error the peer could observe.
pub fn authenticate(hello: &ParsedClientHello, state: &ServerState) -> bool {
    let now = state.now();
    if !verify_proof(state.key(), &hello.random, now) {
        return false;
    }
    // Only proofs with a valid tag reach the cache.
    !state.replay().observe(hello.random, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::ServerConfig;

    const NOW: u64 = 1_700_000_000;

    fn key() -> MasterKey {
        MasterKey::derive(b"test secret")
    }

    fn frozen_clock() -> u64 {
        NOW
    }

    fn state() -> ServerState {
        let config = ServerConfig {
            listen_addr: "127.0.0.1".into(),
            listen_port: 443,
            tunnel_host: "127.0.0.1".into(),
            tunnel_port: 8388,
            web_server_addr: "127.0.0.1:8080".into(),
            secret: "test secret".into(),
        };
        ServerState::with_clock(&config, frozen_clock)
    }

    fn hello_with(random: [u8; RANDOM_SIZE]) -> ParsedClientHello {
        ParsedClientHello {
            random,
            session_id: vec![0u8; 32],
            extensions: Vec::new(),
        }
    }

    #[test]
    fn test_proof_round_trip() {
        let key = key();
        let random = embed_proof(&key, NOW);
        assert!(verify_proof(&key, &random, NOW));
        assert!(verify_proof(&key, &random, NOW + TIMESTAMP_TOLERANCE_SECS));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let random = embed_proof(&key(), NOW);
        let other = MasterKey::derive(b"some other secret");
        assert!(!verify_proof(&other, &random, NOW));
    }

    #[test]
    fn test_tampered_proof_rejected() {
        let key = key();
        let mut random = embed_proof(&key, NOW);
        random[0] ^= 0x01;
        assert!(!verify_proof(&key, &random, NOW));

        let mut random = embed_proof(&key, NOW);
        random[RANDOM_SIZE - 1] ^= 0x01;
        assert!(!verify_proof(&key, &random, NOW));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let key = key();
        let random = embed_proof(&key, NOW - TIMESTAMP_TOLERANCE_SECS - 1);
        assert!(!verify_proof(&key, &random, NOW));

        // Clock skew in the other direction is rejected symmetrically.
        let random = embed_proof(&key, NOW + TIMESTAMP_TOLERANCE_SECS + 1);
        assert!(!verify_proof(&key, &random, NOW));
    }

    #[test]
    fn test_authenticate_is_deterministic_with_frozen_clock() {
        let state = state();
        let random = embed_proof(state.key(), NOW);
        let hello = hello_with(random);

        assert!(authenticate(&hello, &state));
        // Second call: identical inputs, but the nonce is now replayed.
        assert!(!authenticate(&hello, &state));
        assert!(!authenticate(&hello, &state));
    }

    #[test]
    fn test_replay_rejected_even_with_valid_proof() {
        let state = state();
        let random = embed_proof(state.key(), NOW);

        assert!(authenticate(&hello_with(random), &state));
        assert!(!authenticate(&hello_with(random), &state));

        // A different nonce from the same key is still accepted.
        let random2 = embed_proof(state.key(), NOW);
        assert!(authenticate(&hello_with(random2), &state));
    }

    #[test]
    fn test_stale_proof_never_touches_the_cache() {
        let state = state();
        let random = embed_proof(state.key(), NOW - TIMESTAMP_TOLERANCE_SECS - 100);

        assert!(!authenticate(&hello_with(random), &state));
        assert!(state.replay().is_empty());
    }

    #[test]
    fn test_invalid_tag_never_touches_the_cache() {
        let state = state();
        let mut random = embed_proof(state.key(), NOW);
        random[20] ^= 0xff;

        assert!(!authenticate(&hello_with(random), &state));
        assert!(state.replay().is_empty());
    }

    #[test]
    fn test_fingerprint_is_stable_and_short() {
        let a = key().fingerprint();
        let b = key().fingerprint();
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert_ne!(a, MasterKey::derive(b"other").fingerprint());
    }
}
