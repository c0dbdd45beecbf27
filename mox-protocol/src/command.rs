//! Outbound command frames
//!
//! Every frame starts with a five byte header, `priority | H | M | L | channel`,
//! followed by a command specific payload:
//!
//! | Command                  | Priority | Payload                      |
//! |--------------------------|----------|------------------------------|
//! | Set light/switch status  | `0x03`   | `01 00 00 02 03 <01/00>`     |
//! | Request light status     | `0x02`   | `01 00 00 01 02`             |
//! | Set dimmer value         | `0x03`   | `02 00 00 02 06 <v> 00 64 00`|
//! | Request dimmer value     | `0x02`   | `03 00 00 01 02`             |
//! | Set curtain position     | `0x03`   | `01 00 00 02 04 <v> 00`      |
//! | Request curtain position | `0x02`   | `01 00 00 01 02`             |

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

use crate::error::{ProtocolError, Result};
use crate::id::{AccessoryKey, AccessoryKind};
use crate::response::ResponseKind;
use crate::state::AccessoryState;

/// Priority byte used for state requests
pub const PRIORITY_REQUEST: u8 = 0x02;

/// Priority byte used for state changes
pub const PRIORITY_COMMAND: u8 = 0x03;

/// Length of the `priority | H | M | L | channel` header
pub const HEADER_LEN: usize = 5;

/// A single action understood by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    SetLightStatus(bool),
    RequestLightStatus,
    SetDimmerValue(u8),
    RequestDimmerValue,
    SetCurtainPosition(u8),
    RequestCurtainPosition,
}

impl Command {
    /// The state request appropriate for an accessory kind
    pub fn request_for(kind: AccessoryKind) -> Self {
        match kind {
            AccessoryKind::Light | AccessoryKind::Switch => Command::RequestLightStatus,
            AccessoryKind::Dimmer => Command::RequestDimmerValue,
            AccessoryKind::Window => Command::RequestCurtainPosition,
        }
    }

    /// The state change for an accessory kind
    ///
    /// Fails when the state does not match the field the kind carries,
    /// e.g. a value for a light.
    pub fn set_for(kind: AccessoryKind, state: AccessoryState) -> Result<Self> {
        match (kind, state) {
            (AccessoryKind::Light | AccessoryKind::Switch, AccessoryState::Status(on)) => {
                Ok(Command::SetLightStatus(on))
            }
            (AccessoryKind::Dimmer, AccessoryState::Value(value)) => {
                Ok(Command::SetDimmerValue(value))
            }
            (AccessoryKind::Window, AccessoryState::Value(value)) => {
                Ok(Command::SetCurtainPosition(value))
            }
            (kind, state) => Err(ProtocolError::InvalidCommand(format!(
                "{state} cannot be applied to a {kind}"
            ))),
        }
    }

    pub fn priority(&self) -> u8 {
        if self.is_request() {
            PRIORITY_REQUEST
        } else {
            PRIORITY_COMMAND
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(
            self,
            Command::RequestLightStatus
                | Command::RequestDimmerValue
                | Command::RequestCurtainPosition
        )
    }

    /// The response classification the controller answers this command with
    pub fn expected_response(&self) -> ResponseKind {
        match self {
            Command::SetLightStatus(_) | Command::RequestLightStatus => ResponseKind::LightStatus,
            Command::SetDimmerValue(_) | Command::RequestDimmerValue => {
                ResponseKind::LightBrightness
            }
            Command::SetCurtainPosition(_) | Command::RequestCurtainPosition => {
                ResponseKind::CurtainPosition
            }
        }
    }

    fn put_payload(&self, buf: &mut BytesMut) {
        match *self {
            Command::SetLightStatus(on) => {
                buf.put_slice(&[0x01, 0x00, 0x00, 0x02, 0x03]);
                buf.put_u8(u8::from(on));
            }
            Command::RequestLightStatus => buf.put_slice(&[0x01, 0x00, 0x00, 0x01, 0x02]),
            Command::SetDimmerValue(value) => {
                buf.put_slice(&[0x02, 0x00, 0x00, 0x02, 0x06]);
                buf.put_u8(value);
                buf.put_slice(&[0x00, 0x64, 0x00]);
            }
            Command::RequestDimmerValue => buf.put_slice(&[0x03, 0x00, 0x00, 0x01, 0x02]),
            Command::SetCurtainPosition(value) => {
                buf.put_slice(&[0x01, 0x00, 0x00, 0x02, 0x04]);
                buf.put_u8(value);
                buf.put_u8(0x00);
            }
            Command::RequestCurtainPosition => buf.put_slice(&[0x01, 0x00, 0x00, 0x01, 0x02]),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SetLightStatus(on) => write!(f, "set light status {on}"),
            Command::RequestLightStatus => f.write_str("request light status"),
            Command::SetDimmerValue(value) => write!(f, "set dimmer value {value}"),
            Command::RequestDimmerValue => f.write_str("request dimmer value"),
            Command::SetCurtainPosition(value) => write!(f, "set curtain position {value}"),
            Command::RequestCurtainPosition => f.write_str("request curtain position"),
        }
    }
}

/// An encoded, immutable outbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    key: AccessoryKey,
    command: Command,
    bytes: Bytes,
}

impl CommandFrame {
    /// Encodes a command addressed to an accessory
    pub fn encode(key: AccessoryKey, command: Command) -> Self {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + 9);
        buf.put_u8(command.priority());
        buf.put_slice(&key.module_id.bytes());
        buf.put_u8(key.channel_id.value());
        command.put_payload(&mut buf);

        Self {
            key,
            command,
            bytes: buf.freeze(),
        }
    }

    pub fn key(&self) -> AccessoryKey {
        self.key
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// A cheap handle to the encoded bytes
    pub fn to_bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl AsRef<[u8]> for CommandFrame {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}
