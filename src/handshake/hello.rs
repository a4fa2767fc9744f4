//! ClientHello parsing and construction.

use bytes::{BufMut, BytesMut};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{Error, Result};
use crate::handshake::RANDOM_SIZE;
use crate::record::{FRAME_HEADER_SIZE, HANDSHAKE};

const CLIENT_HELLO: u8 = 0x01;

/// One extension record from the opening message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    /// Extension type code
    pub ext_type: u16,
    /// Raw extension bytes
    pub data: Vec<u8>,
}

/// A parsed opening handshake message.
///
/// Transient and per-connection: created from the first segment's raw
/// bytes, owned by the dispatcher for one connection attempt, discarded
/// after use.
#[derive(Debug, Clone)]
pub struct ParsedClientHello {
    /// The 32-byte random field carrying the embedded proof
    pub random: [u8; RANDOM_SIZE],
    /// Legacy session id, echoed back in the reply
    pub session_id: Vec<u8>,
    /// Extension records in wire order
    pub extensions: Vec<Extension>,
}

/// Parse raw opening bytes as a ClientHello.
///
/// Failure is the expected outcome for ordinary web traffic; callers treat
/// it as "assume ordinary traffic" and never surface it to the peer. The
/// declared record and handshake lengths must exactly cover the buffer, so
/// a hello split across segments also falls through to web passthrough.
pub fn parse_client_hello(data: &[u8]) -> Result<ParsedClientHello> {
    // record header + handshake header + version + random + session id length
    if data.len() < FRAME_HEADER_SIZE + 4 + 2 + RANDOM_SIZE + 1 {
        return Err(Error::invalid("opening message too short"));
    }
    if data[0] != HANDSHAKE || data[1] != 0x03 {
        return Err(Error::invalid("not a handshake record"));
    }

    let record_len = u16::from_be_bytes([data[3], data[4]]) as usize;
    if data.len() != FRAME_HEADER_SIZE + record_len {
        return Err(Error::invalid("record length mismatch"));
    }

    let hs = &data[FRAME_HEADER_SIZE..];
    if hs[0] != CLIENT_HELLO {
        return Err(Error::invalid("not a client hello"));
    }
    let hs_len = ((hs[1] as usize) << 16) | ((hs[2] as usize) << 8) | (hs[3] as usize);
    if hs.len() != 4 + hs_len {
        return Err(Error::invalid("handshake length mismatch"));
    }

    let body = &hs[4..];
    let mut pos = 2; // legacy version

    if body.len() < pos + RANDOM_SIZE + 1 {
        return Err(Error::invalid("truncated before random"));
    }
    let random: [u8; RANDOM_SIZE] = body[pos..pos + RANDOM_SIZE]
        .try_into()
        .expect("slice is RANDOM_SIZE bytes");
    pos += RANDOM_SIZE;

    let session_id_len = body[pos] as usize;
    pos += 1;
    if body.len() < pos + session_id_len + 2 {
        return Err(Error::invalid("truncated session id"));
    }
    let session_id = body[pos..pos + session_id_len].to_vec();
    pos += session_id_len;

    let cipher_suites_len = u16::from_be_bytes([body[pos], body[pos + 1]]) as usize;
    pos += 2;
    if body.len() < pos + cipher_suites_len + 1 {
        return Err(Error::invalid("truncated cipher suites"));
    }
    pos += cipher_suites_len;

    let compression_len = body[pos] as usize;
    pos += 1;
    if body.len() < pos + compression_len {
        return Err(Error::invalid("truncated compression methods"));
    }
    pos += compression_len;

    // TLS 1.2 hellos may omit the extension block entirely.
    if pos == body.len() {
        return Ok(ParsedClientHello {
            random,
            session_id,
            extensions: Vec::new(),
        });
    }

    if body.len() < pos + 2 {
        return Err(Error::invalid("truncated extensions length"));
    }
    let extensions_len = u16::from_be_bytes([body[pos], body[pos + 1]]) as usize;
    pos += 2;
    if body.len() != pos + extensions_len {
        return Err(Error::invalid("extensions length mismatch"));
    }

    let mut extensions = Vec::new();
    while pos < body.len() {
        if body.len() < pos + 4 {
            return Err(Error::invalid("truncated extension header"));
        }
        let ext_type = u16::from_be_bytes([body[pos], body[pos + 1]]);
        let ext_len = u16::from_be_bytes([body[pos + 2], body[pos + 3]]) as usize;
        pos += 4;
        if body.len() < pos + ext_len {
            return Err(Error::invalid("truncated extension body"));
        }
        extensions.push(Extension {
            ext_type,
            data: body[pos..pos + ext_len].to_vec(),
        });
        pos += ext_len;
    }

    Ok(ParsedClientHello {
        random,
        session_id,
        extensions,
    })
}

/// Builder for opening messages with a caller-supplied random field.
///
/// Produces bytes indistinguishable from a browser's TLS 1.2 ClientHello;
/// used by client tooling and the integration tests.
pub struct ClientHelloBuilder {
    sni: String,
    random: [u8; RANDOM_SIZE],
    session_id: Vec<u8>,
}

impl ClientHelloBuilder {
    /// Create a builder for the given SNI hostname and random field. The
    /// session id defaults to 32 fresh random bytes.
    pub fn new(sni: impl Into<String>, random: [u8; RANDOM_SIZE]) -> Self {
        let mut session_id = vec![0u8; 32];
        OsRng.fill_bytes(&mut session_id);
        Self {
            sni: sni.into(),
            random,
            session_id,
        }
    }

    /// Override the session id (must be at most 32 bytes).
    pub fn session_id(mut self, session_id: Vec<u8>) -> Self {
        debug_assert!(session_id.len() <= 32);
        self.session_id = session_id;
        self
    }

    /// Serialize the opening message.
    pub fn build(&self) -> Vec<u8> {
        let body = self.build_body();

        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + 4 + body.len());
        buf.put_u8(HANDSHAKE);
        buf.put_u16(0x0301); // first-flight record version
        buf.put_u16((body.len() + 4) as u16);

        buf.put_u8(CLIENT_HELLO);
        buf.put_u8(0);
        buf.put_u16(body.len() as u16); // 3-byte handshake length, high byte zero
        buf.put_slice(&body);

        buf.to_vec()
    }

    fn build_body(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(256);

        buf.put_u16(0x0303); // legacy version
        buf.put_slice(&self.random);

        buf.put_u8(self.session_id.len() as u8);
        buf.put_slice(&self.session_id);

        let cipher_suites = Self::cipher_suites();
        buf.put_u16(cipher_suites.len() as u16);
        buf.put_slice(&cipher_suites);

        // null compression only
        buf.put_u8(1);
        buf.put_u8(0);

        let extensions = self.build_extensions();
        buf.put_u16(extensions.len() as u16);
        buf.put_slice(&extensions);

        buf.to_vec()
    }

    fn cipher_suites() -> Vec<u8> {
        // Matches a common browser fingerprint
        vec![
            0xc0, 0x2b, // TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256
            0xc0, 0x2f, // TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256
            0xc0, 0x2c, // TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384
            0xc0, 0x30, // TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384
            0xcc, 0xa9, // TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256
            0xcc, 0xa8, // TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256
        ]
    }

    fn build_extensions(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(128);

        // SNI
        let sni_bytes = self.sni.as_bytes();
        buf.put_u16(0); // server_name
        buf.put_u16((5 + sni_bytes.len()) as u16);
        buf.put_u16((3 + sni_bytes.len()) as u16);
        buf.put_u8(0); // host name type
        buf.put_u16(sni_bytes.len() as u16);
        buf.put_slice(sni_bytes);

        // supported groups
        let groups: &[u8] = &[0x00, 0x1d, 0x00, 0x17, 0x00, 0x18];
        buf.put_u16(10);
        buf.put_u16((2 + groups.len()) as u16);
        buf.put_u16(groups.len() as u16);
        buf.put_slice(groups);

        // signature algorithms
        let algorithms: &[u8] = &[0x04, 0x03, 0x08, 0x04, 0x04, 0x01, 0x05, 0x03];
        buf.put_u16(13);
        buf.put_u16((2 + algorithms.len()) as u16);
        buf.put_u16(algorithms.len() as u16);
        buf.put_slice(algorithms);

        // renegotiation_info
        buf.put_u16(0xff01);
        buf.put_u16(1);
        buf.put_u8(0);

        buf.to_vec()
    }
}
