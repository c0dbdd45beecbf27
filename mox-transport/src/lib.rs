//! # mox-transport
//!
//! Owns the UDP endpoint used to reach a MOX LT controller.
//!
//! A [`DeviceTransport`] binds one local endpoint, sends command frames
//! fire-and-forget to the controller's fixed endpoint, and forwards every
//! inbound datagram, decoded, as a [`TransportEvent`] on a tokio channel.
//! Socket receive errors are logged and the transport keeps listening; only
//! [`DeviceTransport::disconnect`] ends its life.

pub mod config;
pub mod error;
pub mod transport;

pub use config::{TransportConfig, DEFAULT_CLIENT_PORT, DEFAULT_SERVER_ADDRESS, DEFAULT_SERVER_PORT};
pub use error::{Result, TransportError};
pub use transport::{DeviceTransport, FrameSender, TransportEvent, TransportState};
