//! Error types for the mox-transport crate.

use std::net::SocketAddr;

use crate::transport::TransportState;

/// Errors raised by the device transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The local endpoint could not be bound, or an address could not be parsed
    #[error("Failed to bind {address}: {reason}")]
    Bind {
        /// The address that was being bound or parsed
        address: String,
        /// Why binding failed
        reason: String,
    },

    /// The transport is not bound to a local endpoint
    #[error("Transport is not connected")]
    NotConnected,

    /// The socket refused the datagram
    #[error("Failed to send frame to {address}: {reason}")]
    Send {
        /// The controller endpoint
        address: SocketAddr,
        /// The socket error
        reason: String,
    },

    /// The operation is not valid in the current lifecycle state
    #[error("Invalid transport state: {0}")]
    InvalidState(TransportState),

    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Convenience type alias for Results using TransportError.
pub type Result<T> = std::result::Result<T, TransportError>;
