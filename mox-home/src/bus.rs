//! Command bus seam

use async_trait::async_trait;
use tokio::sync::mpsc;

/// A message delivered on a bus channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub channel: String,
    pub payload: String,
}

impl BusMessage {
    pub fn new(channel: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    #[error("Bus is not connected")]
    NotConnected,

    #[error("Failed to publish on {channel}: {reason}")]
    Publish { channel: String, reason: String },

    #[error("Failed to subscribe to {channel}: {reason}")]
    Subscribe { channel: String, reason: String },

    #[error("Bus backend error: {0}")]
    Backend(String),
}

pub type BusResult<T> = std::result::Result<T, BusError>;

/// Publish/subscribe transport for interact requests and announcements
///
/// Subscriptions hand back a receiver that ends once the channel is
/// unsubscribed or the bus is closed.
#[async_trait]
pub trait CommandBus: Send + Sync {
    async fn connect(&self) -> BusResult<()>;

    async fn close(&self) -> BusResult<()>;

    async fn publish(&self, channel: &str, payload: &str) -> BusResult<()>;

    async fn subscribe(&self, channel: &str) -> BusResult<mpsc::UnboundedReceiver<BusMessage>>;

    async fn unsubscribe(&self, channel: &str) -> BusResult<()>;
}
