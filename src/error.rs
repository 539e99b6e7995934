//! Error types for extbridge.
//!
//! Every variant is fatal: the session loop propagates it with `?` and the
//! process exits. Clean termination of the Host stream is not an error and
//! never shows up here.

use thiserror::Error;

/// Main error type for all bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// I/O error on the Host streams or the Backend pipes.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error on the Backend channel.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A request frame ended before one of its fields was complete.
    #[error("Truncated frame: {field} needed {expected} bytes, got {received}")]
    TruncatedFrame {
        /// Name of the field being read.
        field: &'static str,
        /// Bytes the field declared.
        expected: u64,
        /// Bytes actually available before end of stream.
        received: u64,
    },

    /// The Backend closed its stdout while a document was expected.
    #[error("Backend closed its output")]
    BackendClosed,

    /// The Backend executable could not be started.
    #[error("Failed to spawn backend {program}: {source}")]
    Spawn {
        /// Program that was being launched.
        program: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// A piped stdio handle of the Backend was not available.
    #[error("Backend {0} pipe unavailable")]
    MissingPipe(&'static str),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using BridgeError.
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_frame_message() {
        let err = BridgeError::TruncatedFrame {
            field: "query name",
            expected: 10,
            received: 3,
        };
        assert_eq!(
            err.to_string(),
            "Truncated frame: query name needed 10 bytes, got 3"
        );
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let err: BridgeError = io.into();
        assert!(matches!(err, BridgeError::Io(_)));
    }
}
