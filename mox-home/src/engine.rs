//! Connection lifecycle of a MOX home
//!
//! `MoxHome` ties one house record to its controller. Connecting brings up
//! the bus, the store and the UDP transport, starts the workers and
//! announces the house. Disconnecting tears the same pieces down in
//! reverse. A failed connect releases whatever it had acquired.

use parking_lot::Mutex;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use mox_transport::{DeviceTransport, FrameSender, TransportConfig};

use crate::bus::CommandBus;
use crate::channels::PubSubChannels;
use crate::config::HomeConfig;
use crate::error::{HomeError, Result};
use crate::model::House;
use crate::reconciler::{Reconciler, SweepReport};
use crate::store::AccessoryStore;
use crate::worker;

/// Lifecycle of a MoxHome engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EngineState::Disconnected => "disconnected",
            EngineState::Connecting => "connecting",
            EngineState::Connected => "connected",
            EngineState::Disconnecting => "disconnecting",
        })
    }
}

/// Everything a connect acquires, each released at most once
#[derive(Default)]
struct Resources {
    bus_open: bool,
    store_open: bool,
    interact_subscribed: bool,
    announced: bool,
    transport: Option<Arc<DeviceTransport>>,
    sweep_task: Option<JoinHandle<()>>,
    inbound_task: Option<JoinHandle<()>>,
    interact_task: Option<JoinHandle<()>>,
}

impl Resources {
    fn abort_tasks(&mut self) {
        for task in [
            self.sweep_task.take(),
            self.inbound_task.take(),
            self.interact_task.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
    }
}

struct Session {
    house: House,
    local_address: Option<SocketAddr>,
    reconciler: Arc<Reconciler>,
}

/// Reconciliation engine for one house
pub struct MoxHome {
    config: HomeConfig,
    channels: PubSubChannels,
    store: Arc<dyn AccessoryStore>,
    bus: Arc<dyn CommandBus>,
    state: Mutex<EngineState>,
    session: Mutex<Option<Session>>,
    resources: tokio::sync::Mutex<Resources>,
}

impl MoxHome {
    pub fn new(
        config: HomeConfig,
        store: Arc<dyn AccessoryStore>,
        bus: Arc<dyn CommandBus>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            channels: config.channels(),
            config,
            store,
            bus,
            state: Mutex::new(EngineState::Disconnected),
            session: Mutex::new(None),
            resources: tokio::sync::Mutex::new(Resources::default()),
        })
    }

    pub fn config(&self) -> &HomeConfig {
        &self.config
    }

    pub fn channels(&self) -> &PubSubChannels {
        &self.channels
    }

    pub fn state(&self) -> EngineState {
        *self.state.lock()
    }

    /// The house served by the current connection
    pub fn house(&self) -> Option<House> {
        self.session.lock().as_ref().map(|session| session.house.clone())
    }

    /// The bound local UDP endpoint while connected
    pub fn local_address(&self) -> Option<SocketAddr> {
        self.session
            .lock()
            .as_ref()
            .and_then(|session| session.local_address)
    }

    /// Connects every collaborator and starts the workers
    ///
    /// Only valid from `Disconnected`. On failure every resource acquired
    /// so far is released and the engine is `Disconnected` again.
    pub async fn connect(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state != EngineState::Disconnected {
                return Err(HomeError::InvalidState(*state));
            }
            *state = EngineState::Connecting;
        }

        let mut resources = self.resources.lock().await;
        match self.establish(&mut resources).await {
            Ok(session) => {
                info!(
                    "House {} connected to controller via {:?}",
                    session.house.id, session.local_address
                );
                *self.session.lock() = Some(session);
                *self.state.lock() = EngineState::Connected;
                Ok(())
            }
            Err(e) => {
                warn!("Connect failed for house {}: {}", self.config.house_id, e);
                self.release(&mut resources).await;
                *self.state.lock() = EngineState::Disconnected;
                Err(e)
            }
        }
    }

    async fn establish(&self, resources: &mut Resources) -> Result<Session> {
        self.bus.connect().await?;
        resources.bus_open = true;

        self.store.connect().await?;
        resources.store_open = true;

        let house = self
            .store
            .find_house(&self.config.house_id)
            .await?
            .ok_or_else(|| HomeError::HouseNotFound(self.config.house_id.clone()))?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(DeviceTransport::new(TransportConfig::from(&house), event_tx));
        resources.transport = Some(transport.clone());
        transport.connect().await?;

        let sender: Arc<dyn FrameSender> = transport.clone();
        let reconciler = Arc::new(Reconciler::new(self.store.clone(), sender, &self.config));
        resources.inbound_task = Some(worker::spawn_inbound_worker(reconciler.clone(), event_rx));

        let messages = self.bus.subscribe(&self.channels.interact).await?;
        resources.interact_subscribed = true;
        resources.interact_task = Some(worker::spawn_interact_worker(
            reconciler.clone(),
            self.channels.interact.clone(),
            messages,
        ));

        resources.sweep_task = Some(worker::spawn_sweep_worker(
            reconciler.clone(),
            self.config.status_update_interval,
        ));

        self.bus
            .publish(&self.channels.connected, &house_payload(&house))
            .await?;
        resources.announced = true;

        Ok(Session {
            local_address: transport.local_address(),
            house,
            reconciler,
        })
    }

    /// Stops the workers and releases every collaborator
    ///
    /// Safe to call repeatedly. Release failures are logged and do not stop
    /// the remaining steps.
    pub async fn disconnect(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state == EngineState::Disconnected {
                debug!("Disconnect on an already disconnected engine");
                return Ok(());
            }
            *state = EngineState::Disconnecting;
        }

        let mut resources = self.resources.lock().await;
        self.release(&mut resources).await;
        *self.state.lock() = EngineState::Disconnected;
        info!("House {} disconnected", self.config.house_id);
        Ok(())
    }

    async fn release(&self, resources: &mut Resources) {
        if let Some(task) = resources.sweep_task.take() {
            task.abort();
        }

        if let Some(transport) = resources.transport.take() {
            transport.disconnect().await;
        }
        resources.abort_tasks();

        let house = self.session.lock().take().map(|session| session.house);
        if resources.announced {
            resources.announced = false;
            let payload = house
                .as_ref()
                .map(house_payload)
                .unwrap_or_else(|| id_payload(self.config.house_id.as_str()));
            if let Err(e) = self.bus.publish(&self.channels.disconnected, &payload).await {
                warn!("Failed to announce disconnect: {}", e);
            }
        }

        if resources.interact_subscribed {
            resources.interact_subscribed = false;
            if let Err(e) = self.bus.unsubscribe(&self.channels.interact).await {
                warn!("Failed to unsubscribe from {}: {}", self.channels.interact, e);
            }
        }

        if resources.bus_open {
            resources.bus_open = false;
            if let Err(e) = self.bus.close().await {
                warn!("Failed to close bus: {}", e);
            }
        }

        if resources.store_open {
            resources.store_open = false;
            if let Err(e) = self.store.close().await {
                warn!("Failed to close store: {}", e);
            }
        }
    }

    /// Runs one staleness sweep immediately
    pub async fn sweep_now(&self) -> Result<SweepReport> {
        let reconciler = self
            .session
            .lock()
            .as_ref()
            .map(|session| session.reconciler.clone())
            .ok_or_else(|| HomeError::InvalidState(self.state()))?;
        reconciler.sweep().await
    }
}

impl Drop for MoxHome {
    fn drop(&mut self) {
        self.resources.get_mut().abort_tasks();
    }
}

fn house_payload(house: &House) -> String {
    id_payload(house.id.as_str())
}

fn id_payload(id: &str) -> String {
    serde_json::Value::from(id).to_string()
}
