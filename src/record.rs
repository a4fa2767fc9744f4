//! TLS-style record layer framing.
//!
//! Tunneled payload travels inside application-data records:
//!
//! ```text
//! +--------+--------+--------+--------+--------+==============+
//! |  type  |    version      |   length (BE)   |   payload    |
//! +--------+--------+--------+--------+--------+==============+
//! ```
//!
//! The codec is stateless. Framing on the wire is recovered with
//! [`read_frame`], which accumulates the 5-byte header first and then reads
//! exactly the declared number of payload bytes; a partial read is never
//! treated as a complete frame.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};

/// Size of the record header: type (1) + version (2) + length (2).
pub const FRAME_HEADER_SIZE: usize = 5;

/// Maximum record payload imposed by the backend's real protocol.
pub const MAX_RECORD_PAYLOAD: usize = 16384;

/// Application data content type.
pub const APPLICATION_DATA: u8 = 0x17;

/// Handshake content type.
pub const HANDSHAKE: u8 = 0x16;

/// ChangeCipherSpec content type.
pub const CHANGE_CIPHER_SPEC: u8 = 0x14;

/// Protocol version tag carried by every record (TLS 1.2 on the wire).
pub const RECORD_VERSION: [u8; 2] = [0x03, 0x03];

/// Prepend the 5-byte record header to a payload chunk.
///
/// Fails with [`Error::RecordOverflow`] if the payload does not fit the
/// 16-bit length field; callers must split larger chunks into multiple
/// frames.
pub fn add_frame(payload: &[u8], content_type: u8, version: [u8; 2]) -> Result<Vec<u8>> {
    if payload.len() > MAX_RECORD_PAYLOAD {
        return Err(Error::RecordOverflow(payload.len()));
    }

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.push(content_type);
    frame.extend_from_slice(&version);
    frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Strip the 5-byte record header, returning only the payload.
pub fn peel_frame(frame: &[u8]) -> &[u8] {
    &frame[FRAME_HEADER_SIZE.min(frame.len())..]
}

/// Read one complete record frame off the wire.
///
/// Reads exactly the 5-byte header, validates the declared length against
/// the payload cap, then reads exactly that many more bytes. Returns the
/// whole frame, header included; pair with [`peel_frame`] to recover the
/// payload. A connection that stalls mid-frame fails with the transport's
/// own error rather than yielding a short frame.
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_SIZE];
    reader.read_exact(&mut header).await?;

    let length = u16::from_be_bytes([header[3], header[4]]) as usize;
    if length > MAX_RECORD_PAYLOAD {
        return Err(Error::RecordOverflow(length));
    }

    let mut frame = vec![0u8; FRAME_HEADER_SIZE + length];
    frame[..FRAME_HEADER_SIZE].copy_from_slice(&header);
    reader.read_exact(&mut frame[FRAME_HEADER_SIZE..]).await?;
    Ok(frame)
}
