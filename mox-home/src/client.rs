//! Client API for applications driving a MOX home
//!
//! Writes are published as interact requests and applied by whichever
//! engine serves the house. Reads come straight from the accessory store.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

use mox_protocol::{AccessoryKey, AccessoryKind};

use crate::bus::CommandBus;
use crate::channels::PubSubChannels;
use crate::error::{HomeError, Result};
use crate::interact::InteractRequest;
use crate::model::Accessory;
use crate::store::AccessoryStore;

pub struct HomeClient {
    store: Arc<dyn AccessoryStore>,
    bus: Arc<dyn CommandBus>,
    channels: PubSubChannels,
    connected: Mutex<bool>,
}

impl HomeClient {
    pub fn new(store: Arc<dyn AccessoryStore>, bus: Arc<dyn CommandBus>) -> Self {
        Self::with_channels(store, bus, PubSubChannels::default())
    }

    pub fn with_channels(
        store: Arc<dyn AccessoryStore>,
        bus: Arc<dyn CommandBus>,
        channels: PubSubChannels,
    ) -> Self {
        Self {
            store,
            bus,
            channels,
            connected: Mutex::new(false),
        }
    }

    pub async fn connect(&self) -> Result<()> {
        if *self.connected.lock() {
            return Ok(());
        }

        self.bus.connect().await?;
        if let Err(e) = self.store.connect().await {
            if let Err(close_error) = self.bus.close().await {
                warn!("Failed to close bus after store error: {}", close_error);
            }
            return Err(e.into());
        }

        *self.connected.lock() = true;
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<()> {
        {
            let mut connected = self.connected.lock();
            if !*connected {
                return Ok(());
            }
            *connected = false;
        }

        let bus = self.bus.close().await;
        let store = self.store.close().await;
        bus?;
        store?;
        Ok(())
    }

    pub async fn set_light_status(&self, key: AccessoryKey, on: bool) -> Result<()> {
        self.publish(&InteractRequest::status(key, AccessoryKind::Light, on))
            .await
    }

    pub async fn set_switch_status(&self, key: AccessoryKey, on: bool) -> Result<()> {
        self.publish(&InteractRequest::status(key, AccessoryKind::Switch, on))
            .await
    }

    pub async fn set_dimmer_value(&self, key: AccessoryKey, value: u8) -> Result<()> {
        self.publish(&InteractRequest::value(key, AccessoryKind::Dimmer, value))
            .await
    }

    pub async fn set_window_position(&self, key: AccessoryKey, position: u8) -> Result<()> {
        self.publish(&InteractRequest::value(key, AccessoryKind::Window, position))
            .await
    }

    /// Last known status of a light or switch
    pub async fn light_status(&self, key: AccessoryKey) -> Result<Option<bool>> {
        Ok(self.accessory(key).await?.status)
    }

    pub async fn dimmer_value(&self, key: AccessoryKey) -> Result<Option<u8>> {
        Ok(self.accessory(key).await?.value)
    }

    pub async fn window_position(&self, key: AccessoryKey) -> Result<Option<u8>> {
        Ok(self.accessory(key).await?.value)
    }

    pub async fn accessory(&self, key: AccessoryKey) -> Result<Accessory> {
        self.store
            .find_by_key(key, None)
            .await?
            .ok_or(HomeError::AccessoryNotFound(key))
    }

    async fn publish(&self, request: &InteractRequest) -> Result<()> {
        let payload = request.to_json()?;
        debug!("Publishing interact request {}", payload);
        self.bus.publish(&self.channels.interact, &payload).await?;
        Ok(())
    }
}
