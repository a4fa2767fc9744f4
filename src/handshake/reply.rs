//! Disguise reply composition.
//!
//! After a successful authentication the server answers with three records
//! shaped like a TLS 1.2 session-resumption acceptance: ServerHello,
//! ChangeCipherSpec, and an encrypted-Finished-shaped handshake record.
//! Every variable byte is derived from the client's random plus the proof
//! key, so replies differ per connection without any fresh randomness and
//! are deterministic for a given opening message.

use bytes::{BufMut, BytesMut};
use hkdf::Hkdf;
use sha2::Sha256;

use crate::handshake::{MasterKey, ParsedClientHello};
use crate::record::{add_frame, CHANGE_CIPHER_SPEC, HANDSHAKE, RECORD_VERSION};

const SERVER_HELLO: u8 = 0x02;
const FINISHED_BODY_SIZE: usize = 40;

/// Build the reply to a verified opening message.
///
/// Deterministic given the parsed input and key material; echoes the
/// client's session id the way a resuming server would.
pub fn compose_reply(hello: &ParsedClientHello, key: &MasterKey) -> Vec<u8> {
    let hk = Hkdf::<Sha256>::new(Some(&hello.random), key.as_bytes());

    let mut server_random = [0u8; 32];
    hk.expand(b"reply random", &mut server_random)
        .expect("32 bytes is a valid HKDF-SHA256 output length");

    let mut finished = [0u8; FINISHED_BODY_SIZE];
    hk.expand(b"reply finished", &mut finished)
        .expect("40 bytes is a valid HKDF-SHA256 output length");

    let mut body = BytesMut::with_capacity(128);
    body.put_u8(SERVER_HELLO);
    let body_len = 2 + 32 + 1 + hello.session_id.len() + 2 + 1 + 2 + 5;
    body.put_u8(0);
    body.put_u16(body_len as u16); // 3-byte handshake length, high byte zero
    body.put_u16(0x0303);
    body.put_slice(&server_random);
    body.put_u8(hello.session_id.len() as u8);
    body.put_slice(&hello.session_id);
    body.put_u16(0xc030); // TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384
    body.put_u8(0); // null compression

    // renegotiation_info, the one extension a resuming server always sends
    body.put_u16(5);
    body.put_u16(0xff01);
    body.put_u16(1);
    body.put_u8(0);

    let mut reply = add_frame(&body, HANDSHAKE, RECORD_VERSION)
        .expect("server hello fits the record cap");
    reply.extend(
        add_frame(&[0x01], CHANGE_CIPHER_SPEC, RECORD_VERSION)
            .expect("change cipher spec fits the record cap"),
    );
    reply.extend(
        add_frame(&finished, HANDSHAKE, RECORD_VERSION).expect("finished fits the record cap"),
    );
    reply
}
