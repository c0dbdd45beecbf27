//! Error types for the mox-home crate.

use std::time::Duration;

use mox_protocol::{AccessoryKey, AccessoryKind, Classification, ProtocolError};
use mox_transport::TransportError;

use crate::bus::BusError;
use crate::engine::EngineState;
use crate::model::HouseId;
use crate::store::StoreError;

/// Errors that can occur while reconciling a MOX home
#[derive(Debug, thiserror::Error)]
pub enum HomeError {
    /// The configured house is not in the store
    #[error("House {0} not found")]
    HouseNotFound(HouseId),

    /// The engine cannot perform the operation in its current state
    #[error("Operation not valid while {0}")]
    InvalidState(EngineState),

    /// No accessory is registered for the key
    #[error("Accessory {0} not found")]
    AccessoryNotFound(AccessoryKey),

    /// The frame classification does not fit the accessory kind
    #[error("Accessory {key} is a {kind} but received {classification}")]
    TypeMismatch {
        key: AccessoryKey,
        kind: AccessoryKind,
        classification: Classification,
    },

    /// An interact request lacks the field its kind requires
    #[error("Interact request for {kind} {key} is missing the '{field}' field")]
    MissingField {
        key: AccessoryKey,
        kind: AccessoryKind,
        field: &'static str,
    },

    /// An interact request value does not fit in a byte
    #[error("Value {value} for {key} is outside 0-255")]
    ValueOutOfRange { key: AccessoryKey, value: i64 },

    /// A bus payload could not be decoded
    #[error("Invalid interact payload: {0}")]
    InvalidPayload(String),

    /// A store or transport operation did not finish in time
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),
}

impl HomeError {
    /// Soft errors describe a message that was dropped, not a failure of
    /// the engine itself
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            HomeError::AccessoryNotFound(_)
                | HomeError::TypeMismatch { .. }
                | HomeError::MissingField { .. }
                | HomeError::ValueOutOfRange { .. }
                | HomeError::InvalidPayload(_)
        )
    }
}

/// Result type for mox-home operations
pub type Result<T> = std::result::Result<T, HomeError>;
