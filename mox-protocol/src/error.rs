//! Error types for the mox-protocol crate.

/// Errors raised while encoding or decoding MOX LT identifiers and frames.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The module identifier could not be parsed into three bytes
    #[error("Invalid module identifier: {0}")]
    InvalidIdentifier(String),

    /// The buffer is too short to contain a frame header
    #[error("Malformed frame: expected at least {expected} bytes, got {actual}")]
    MalformedFrame {
        /// Minimum number of bytes a frame must carry
        expected: usize,
        /// Number of bytes actually received
        actual: usize,
    },

    /// The command cannot be built for the requested accessory kind
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
}

/// Convenience type alias for Results using ProtocolError.
pub type Result<T> = std::result::Result<T, ProtocolError>;
