//! Error types for the quietgate relay.

use thiserror::Error;

/// Result type alias for quietgate operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving connections.
///
/// A failed ClientHello parse is an *expected* outcome for ordinary web
/// traffic; callers route it to web passthrough and never surface it to the
/// peer.
#[derive(Error, Debug)]
pub enum Error {
    /// Network I/O error
    #[error("network error: {0}")]
    Network(#[from] std::io::Error),

    /// Bytes did not form a valid protocol message
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A record frame declared a payload above the 16 KiB cap
    #[error("record payload of {0} bytes exceeds the 16 KiB cap")]
    RecordOverflow(usize),

    /// The peer sent nothing within the opening-read deadline
    #[error("timed out waiting for the opening message")]
    Timeout,

    /// Configuration error (process-fatal at startup)
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a new invalid-message error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidMessage(msg.into())
    }

    /// Create a new configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid("truncated extension list");
        assert_eq!(err.to_string(), "invalid message: truncated extension list");

        let err = Error::RecordOverflow(20_000);
        assert_eq!(
            err.to_string(),
            "record payload of 20000 bytes exceeds the 16 KiB cap"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err: Error = io.into();
        assert!(matches!(err, Error::Network(_)));
    }
}
