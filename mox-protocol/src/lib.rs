//! # mox-protocol
//!
//! Codec for the fixed-format binary protocol spoken by MOX LT lighting and
//! curtain controllers over UDP.
//!
//! Frames carry no length prefix, checksum or sequence number. The layout is
//! implied by the command, and inbound frames are recognised by their exact
//! length and a fixed signature.
//!
//! ```rust
//! use mox_protocol::{AccessoryKey, ChannelId, Classification, Command, CommandFrame, ModuleId, ResponseFrame};
//!
//! let key = AccessoryKey::new(ModuleId::parse("0x0000cc")?, ChannelId::new(0x16));
//! let frame = CommandFrame::encode(key, Command::SetLightStatus(true));
//! assert_eq!(frame.len(), 11);
//!
//! let reply = ResponseFrame::parse(&[0x02, 0x00, 0x00, 0xcc, 0x16, 0x01, 0x00, 0x00, 0x03, 0x03, 0x01])?;
//! assert_eq!(reply.key(), key);
//! assert_eq!(reply.classify(), Classification::LightStatus(true));
//! # Ok::<(), mox_protocol::ProtocolError>(())
//! ```

mod command;
mod error;
mod id;
mod response;
mod state;

pub use command::{Command, CommandFrame, HEADER_LEN, PRIORITY_COMMAND, PRIORITY_REQUEST};
pub use error::{ProtocolError, Result};
pub use id::{AccessoryKey, AccessoryKind, ChannelId, ModuleId, MAX_MODULE_ID};
pub use response::{Classification, ResponseFrame, ResponseKind};
pub use state::AccessoryState;
