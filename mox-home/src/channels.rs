//! Command bus channel names

/// Prefix shared by every MOX home channel
pub const DEFAULT_CHANNEL_PREFIX: &str = "com.yahavgindibar.mox-home";

/// The channels a MOX home publishes to and listens on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubSubChannels {
    /// Interact requests addressed to the engine
    pub interact: String,
    /// Announced once the engine is connected
    pub connected: String,
    /// Announced when the engine disconnects
    pub disconnected: String,
}

impl PubSubChannels {
    pub fn new(prefix: &str) -> Self {
        Self {
            interact: format!("{prefix}.sub.interact"),
            connected: format!("{prefix}.pub.connected"),
            disconnected: format!("{prefix}.pub.disconnected"),
        }
    }
}

impl Default for PubSubChannels {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_PREFIX)
    }
}
