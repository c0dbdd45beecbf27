//! Configuration types for the reconciliation engine

use std::time::Duration;

use crate::channels::{PubSubChannels, DEFAULT_CHANNEL_PREFIX};
use crate::error::{HomeError, Result};
use crate::model::HouseId;

/// Configuration for a MoxHome engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeConfig {
    /// House record whose controller this engine drives
    pub house_id: HouseId,

    /// How often the staleness sweep runs
    /// Default: 5 seconds
    pub status_update_interval: Duration,

    /// Accessories not updated for this long are asked for their state
    /// Default: 30 seconds
    pub force_status_update_interval: Duration,

    /// Upper bound for each store or transport operation made by a worker
    /// Default: 2 seconds
    pub operation_timeout: Duration,

    /// Prefix of the command bus channels
    /// Default: "com.yahavgindibar.mox-home"
    pub channel_prefix: String,
}

impl HomeConfig {
    pub fn new(house_id: impl Into<HouseId>) -> Self {
        Self {
            house_id: house_id.into(),
            status_update_interval: Duration::from_secs(5),
            force_status_update_interval: Duration::from_secs(30),
            operation_timeout: Duration::from_secs(2),
            channel_prefix: DEFAULT_CHANNEL_PREFIX.to_string(),
        }
    }

    /// Short intervals for tests and local development
    pub fn fast(house_id: impl Into<HouseId>) -> Self {
        Self {
            status_update_interval: Duration::from_millis(100),
            force_status_update_interval: Duration::from_millis(500),
            operation_timeout: Duration::from_millis(500),
            ..Self::new(house_id)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.house_id.as_str().trim().is_empty() {
            return Err(HomeError::Configuration(
                "House id must not be empty".to_string(),
            ));
        }

        if self.status_update_interval.is_zero() {
            return Err(HomeError::Configuration(
                "Status update interval must be greater than 0".to_string(),
            ));
        }

        if self.force_status_update_interval.is_zero() {
            return Err(HomeError::Configuration(
                "Force status update interval must be greater than 0".to_string(),
            ));
        }

        if self.operation_timeout.is_zero() {
            return Err(HomeError::Configuration(
                "Operation timeout must be greater than 0".to_string(),
            ));
        }

        if self.channel_prefix.trim().is_empty() {
            return Err(HomeError::Configuration(
                "Channel prefix must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn channels(&self) -> PubSubChannels {
        PubSubChannels::new(&self.channel_prefix)
    }

    /// Builder pattern methods for fluent configuration

    pub fn with_status_update_interval(mut self, interval: Duration) -> Self {
        self.status_update_interval = interval;
        self
    }

    pub fn with_force_status_update_interval(mut self, interval: Duration) -> Self {
        self.force_status_update_interval = interval;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn with_channel_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.channel_prefix = prefix.into();
        self
    }
}
