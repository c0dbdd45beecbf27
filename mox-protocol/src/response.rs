//! Inbound response frames
//!
//! Responses share the command header and are recognised by their exact
//! length plus a fixed signature in `bytes[5..=9]`:
//!
//! | Classification   | Length | Signature        | Extra          | Value   |
//! |------------------|--------|------------------|----------------|---------|
//! | Light status     | 11     | `01 00 00 03 03` |                | byte 10 |
//! | Light brightness | 12     | `03 00 00 03 04` | byte 11 == 00  | byte 10 |
//! | Curtain position | 12     | `01 00 00 03 04` | byte 11 == 00  | byte 10 |

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

use crate::command::{HEADER_LEN, PRIORITY_REQUEST};
use crate::error::{ProtocolError, Result};
use crate::id::{AccessoryKey, ChannelId, ModuleId};

const LIGHT_STATUS_SIGNATURE: [u8; 5] = [0x01, 0x00, 0x00, 0x03, 0x03];
const LIGHT_BRIGHTNESS_SIGNATURE: [u8; 5] = [0x03, 0x00, 0x00, 0x03, 0x04];
const CURTAIN_POSITION_SIGNATURE: [u8; 5] = [0x01, 0x00, 0x00, 0x03, 0x04];

const VALUE_INDEX: usize = 10;

/// The recognised response shapes, without their value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    LightStatus,
    LightBrightness,
    CurtainPosition,
}

impl ResponseKind {
    fn signature(&self) -> [u8; 5] {
        match self {
            ResponseKind::LightStatus => LIGHT_STATUS_SIGNATURE,
            ResponseKind::LightBrightness => LIGHT_BRIGHTNESS_SIGNATURE,
            ResponseKind::CurtainPosition => CURTAIN_POSITION_SIGNATURE,
        }
    }

    /// Total frame length for this shape
    pub fn frame_len(&self) -> usize {
        match self {
            ResponseKind::LightStatus => 11,
            ResponseKind::LightBrightness | ResponseKind::CurtainPosition => 12,
        }
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResponseKind::LightStatus => "light-status",
            ResponseKind::LightBrightness => "light-brightness",
            ResponseKind::CurtainPosition => "curtain-position",
        })
    }
}

/// A decoded response with its value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    LightStatus(bool),
    LightBrightness(u8),
    CurtainPosition(u8),
    /// A well formed datagram that matches none of the known shapes
    Unrecognized,
}

impl Classification {
    pub fn kind(&self) -> Option<ResponseKind> {
        match self {
            Classification::LightStatus(_) => Some(ResponseKind::LightStatus),
            Classification::LightBrightness(_) => Some(ResponseKind::LightBrightness),
            Classification::CurtainPosition(_) => Some(ResponseKind::CurtainPosition),
            Classification::Unrecognized => None,
        }
    }

    fn value_byte(&self) -> u8 {
        match *self {
            Classification::LightStatus(on) => u8::from(on),
            Classification::LightBrightness(value) | Classification::CurtainPosition(value) => {
                value
            }
            Classification::Unrecognized => 0,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::LightStatus(on) => write!(f, "light-status({on})"),
            Classification::LightBrightness(value) => write!(f, "light-brightness({value})"),
            Classification::CurtainPosition(value) => write!(f, "curtain-position({value})"),
            Classification::Unrecognized => f.write_str("unrecognized"),
        }
    }
}

/// A datagram received from the controller
///
/// Constructed per datagram and discarded after it has been resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    bytes: Bytes,
}

impl ResponseFrame {
    /// Validates that the buffer holds at least a frame header
    pub fn parse(buf: &[u8]) -> Result<Self> {
        Self::from_bytes(Bytes::copy_from_slice(buf))
    }

    pub fn from_bytes(bytes: Bytes) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(ProtocolError::MalformedFrame {
                expected: HEADER_LEN,
                actual: bytes.len(),
            });
        }
        Ok(Self { bytes })
    }

    /// Builds the frame a controller sends for a classification
    ///
    /// `Unrecognized` produces a bare header.
    pub fn build(key: AccessoryKey, classification: Classification) -> Self {
        let mut buf = BytesMut::with_capacity(12);
        buf.put_u8(PRIORITY_REQUEST);
        buf.put_slice(&key.module_id.bytes());
        buf.put_u8(key.channel_id.value());

        if let Some(kind) = classification.kind() {
            buf.put_slice(&kind.signature());
            buf.put_u8(classification.value_byte());
            if kind.frame_len() == 12 {
                buf.put_u8(0x00);
            }
        }

        Self {
            bytes: buf.freeze(),
        }
    }

    pub fn priority(&self) -> u8 {
        self.bytes[0]
    }

    pub fn module_id(&self) -> ModuleId {
        ModuleId::new(self.bytes[1], self.bytes[2], self.bytes[3])
    }

    pub fn channel_id(&self) -> ChannelId {
        ChannelId::new(self.bytes[4])
    }

    pub fn key(&self) -> AccessoryKey {
        AccessoryKey::new(self.module_id(), self.channel_id())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn matches(&self, kind: ResponseKind) -> bool {
        let bytes = &self.bytes[..];
        if bytes.len() != kind.frame_len() || bytes[5..=9] != kind.signature() {
            return false;
        }
        kind.frame_len() == 11 || bytes[11] == 0x00
    }

    /// Classifies the frame by its length and signature
    pub fn classify(&self) -> Classification {
        let value = || self.bytes[VALUE_INDEX];

        if self.matches(ResponseKind::LightStatus) {
            Classification::LightStatus(value() != 0)
        } else if self.matches(ResponseKind::LightBrightness) {
            Classification::LightBrightness(value())
        } else if self.matches(ResponseKind::CurtainPosition) {
            Classification::CurtainPosition(value())
        } else {
            Classification::Unrecognized
        }
    }
}

impl fmt::Display for ResponseFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ResponseFrame {{ bytes = {:02x?}, priority = {}, module = {}, channel = {} }}",
            &self.bytes[..],
            self.priority(),
            self.module_id(),
            self.channel_id()
        )
    }
}
