//! # MOX Home
//!
//! Keeps the accessory store in step with a MOX LT controller.
//!
//! A [`MoxHome`] engine serves one house. It listens for interact requests
//! on a [`CommandBus`], turns them into controller frames, and records the
//! state the controller reports back in an [`AccessoryStore`]. Accessories
//! that have not reported for a while are asked for their state by a
//! periodic sweep.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mox_home::{HomeConfig, MemoryBus, MemoryStore, MoxHome};
//!
//! let store = Arc::new(MemoryStore::new());
//! let bus = Arc::new(MemoryBus::new());
//! let home = MoxHome::new(HomeConfig::new("house-1"), store, bus)?;
//! home.connect().await?;
//! // ...
//! home.disconnect().await?;
//! ```

pub mod bus;
pub mod channels;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod interact;
pub mod logging;
pub mod memory;
pub mod model;
pub mod reconciler;
pub mod resolver;
pub mod store;

mod locks;
mod worker;

pub use bus::{BusError, BusMessage, BusResult, CommandBus};
pub use channels::{PubSubChannels, DEFAULT_CHANNEL_PREFIX};
pub use client::HomeClient;
pub use config::HomeConfig;
pub use engine::{EngineState, MoxHome};
pub use error::{HomeError, Result};
pub use interact::InteractRequest;
pub use memory::{MemoryBus, MemoryStore};
pub use model::{accessory_uuid, Accessory, House, HouseId, MissingAccessory};
pub use reconciler::{InboundOutcome, Reconciler, SweepReport};
pub use store::{AccessoryStore, StoreError, StoreResult};

pub use mox_protocol::{
    AccessoryKey, AccessoryKind, AccessoryState, ChannelId, Classification, ModuleId,
};
