//! Authoritative accessory state carried by frames

use std::fmt;

/// The state field an accessory exposes
///
/// Lights and switches report an on/off status, dimmers and windows a
/// 0-255 value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessoryState {
    Status(bool),
    Value(u8),
}

impl fmt::Display for AccessoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessoryState::Status(on) => write!(f, "status={on}"),
            AccessoryState::Value(value) => write!(f, "value={value}"),
        }
    }
}
