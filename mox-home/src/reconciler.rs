//! State reconciliation between the bus, the store and the controller
//!
//! The reconciler is shared by the engine's workers. Each store and
//! transport call is bounded by the configured operation timeout, and each
//! accessory is updated under its own lock.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use mox_protocol::{AccessoryKey, AccessoryState, Command, CommandFrame, ResponseFrame};
use mox_transport::FrameSender;

use crate::config::HomeConfig;
use crate::error::{HomeError, Result};
use crate::interact::InteractRequest;
use crate::locks::KeyLocks;
use crate::resolver;
use crate::store::AccessoryStore;

/// What happened to an inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundOutcome {
    /// A registered accessory took the reported state
    Updated {
        key: AccessoryKey,
        state: AccessoryState,
    },
    /// The key is not registered and a sighting was recorded
    Sighted(AccessoryKey),
}

/// Result of one staleness sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Accessories older than the force interval
    pub stale: usize,
    /// State requests that were sent
    pub requested: usize,
    /// State requests that failed or timed out
    pub failed: usize,
}

pub struct Reconciler {
    store: Arc<dyn AccessoryStore>,
    sender: Arc<dyn FrameSender>,
    locks: KeyLocks,
    operation_timeout: Duration,
    force_status_update_interval: Duration,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn AccessoryStore>,
        sender: Arc<dyn FrameSender>,
        config: &HomeConfig,
    ) -> Self {
        Self {
            store,
            sender,
            locks: KeyLocks::default(),
            operation_timeout: config.operation_timeout,
            force_status_update_interval: config.force_status_update_interval,
        }
    }

    async fn bounded<T, E>(
        &self,
        operation: &'static str,
        future: impl Future<Output = std::result::Result<T, E>>,
    ) -> Result<T>
    where
        HomeError: From<E>,
    {
        match tokio::time::timeout(self.operation_timeout, future).await {
            Ok(result) => result.map_err(HomeError::from),
            Err(_) => Err(HomeError::Timeout {
                operation,
                after: self.operation_timeout,
            }),
        }
    }

    /// Applies a controller report to the store
    ///
    /// Unregistered keys are recorded as sightings whatever the frame
    /// carries. Registered accessories only take a classification their
    /// kind answers with.
    pub async fn resolve_frame(&self, frame: &ResponseFrame) -> Result<InboundOutcome> {
        let key = frame.key();
        let classification = frame.classify();
        let _guard = self.locks.lock(key).await;

        let found = self
            .bounded("find accessory", self.store.find_by_key(key, None))
            .await?;

        let Some(mut accessory) = found else {
            self.bounded(
                "record missing accessory",
                self.store.upsert_missing_sighting(key, Utc::now()),
            )
            .await?;
            debug!("Recorded sighting of unregistered accessory {}", key);
            return Ok(InboundOutcome::Sighted(key));
        };

        let state = resolver::resolve(accessory.kind, classification).ok_or(
            HomeError::TypeMismatch {
                key,
                kind: accessory.kind,
                classification,
            },
        )?;

        accessory.apply(state, Utc::now())?;
        self.bounded("save accessory", self.store.save(&accessory))
            .await?;

        debug!("Accessory {} reported {}", key, state);
        Ok(InboundOutcome::Updated { key, state })
    }

    /// Handles a raw interact payload from the bus
    pub async fn handle_interact(&self, payload: &str) -> Result<AccessoryState> {
        let request = InteractRequest::from_json(payload)?;
        self.handle_request(&request).await
    }

    /// Sends the requested change and records it once the frame is out
    ///
    /// A failed send leaves the store untouched.
    pub async fn handle_request(&self, request: &InteractRequest) -> Result<AccessoryState> {
        let key = request.key();
        let _guard = self.locks.lock(key).await;

        let mut accessory = self
            .bounded(
                "find accessory",
                self.store.find_by_key(key, Some(request.kind)),
            )
            .await?
            .ok_or(HomeError::AccessoryNotFound(key))?;

        let state = request.requested_state()?;
        let command = Command::set_for(accessory.kind, state)?;
        let frame = CommandFrame::encode(key, command);

        self.bounded("send frame", self.sender.send_frame(&frame))
            .await?;

        accessory.apply(state, Utc::now())?;
        self.bounded("save accessory", self.store.save(&accessory))
            .await?;

        info!("Set {} {} to {}", accessory.kind, key, state);
        Ok(state)
    }

    /// Asks the controller for the state of every stale accessory
    pub async fn sweep(&self) -> Result<SweepReport> {
        self.sweep_at(Utc::now()).await
    }

    /// Sweep using `now` as the current time
    ///
    /// Requests go out concurrently. A failed request is counted and does
    /// not stop the others.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let interval = chrono::Duration::from_std(self.force_status_update_interval)
            .map_err(|e| HomeError::Configuration(e.to_string()))?;
        let cutoff = now - interval;

        let stale = self
            .bounded("find stale accessories", self.store.find_stale(cutoff))
            .await?;

        let requests = stale.iter().map(|accessory| async move {
            let frame = CommandFrame::encode(accessory.key, Command::request_for(accessory.kind));
            match self
                .bounded("send status request", self.sender.send_frame(&frame))
                .await
            {
                Ok(_) => true,
                Err(e) => {
                    warn!("Status request for {} failed: {}", accessory.key, e);
                    false
                }
            }
        });

        let requested = join_all(requests)
            .await
            .into_iter()
            .filter(|sent| *sent)
            .count();

        Ok(SweepReport {
            stale: stale.len(),
            requested,
            failed: stale.len() - requested,
        })
    }
}
