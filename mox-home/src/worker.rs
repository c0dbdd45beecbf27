//! Background tasks driven by a connected engine
//!
//! Each worker owns one input: transport events, interact messages from
//! the bus, or the sweep timer. They run until aborted by the engine or
//! until their input ends.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use mox_transport::TransportEvent;

use crate::bus::BusMessage;
use crate::error::HomeError;
use crate::reconciler::{InboundOutcome, Reconciler};

/// Resolves datagrams reported by the transport
pub(crate) fn spawn_inbound_worker(
    reconciler: Arc<Reconciler>,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Received { from, raw, frame } => match frame {
                    Ok(frame) => match reconciler.resolve_frame(&frame).await {
                        Ok(InboundOutcome::Updated { key, state }) => {
                            tracing::debug!("Stored {} for {}", state, key);
                        }
                        Ok(InboundOutcome::Sighted(key)) => {
                            tracing::info!("Accessory {} is not registered", key);
                        }
                        Err(e) => log_dropped("frame", &e),
                    },
                    Err(e) => {
                        tracing::warn!("Dropping datagram from {}: {} ({:02x?})", from, e, &raw[..]);
                    }
                },
                TransportEvent::Connected { local_address } => {
                    tracing::debug!("Transport bound to {}", local_address);
                }
                TransportEvent::Sent { frame } => {
                    tracing::trace!("Sent {} to {}", frame.command(), frame.key());
                }
                TransportEvent::Disconnected => {
                    tracing::debug!("Transport released");
                }
            }
        }
        tracing::debug!("Inbound worker stopped");
    })
}

/// Applies interact requests published on the bus
pub(crate) fn spawn_interact_worker(
    reconciler: Arc<Reconciler>,
    channel: String,
    mut messages: mpsc::UnboundedReceiver<BusMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = messages.recv().await {
            if message.channel != channel {
                tracing::warn!("Ignoring bus message on unexpected channel {}", message.channel);
                continue;
            }

            if let Err(e) = reconciler.handle_interact(&message.payload).await {
                log_dropped("interact request", &e);
            }
        }
        tracing::debug!("Interact worker stopped");
    })
}

/// Runs the staleness sweep every `period`, first tick one period in
pub(crate) fn spawn_sweep_worker(reconciler: Arc<Reconciler>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match reconciler.sweep().await {
                Ok(report) if report.stale > 0 => {
                    tracing::debug!(
                        "Sweep requested state for {}/{} stale accessories",
                        report.requested,
                        report.stale
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Staleness sweep failed: {}", e),
            }
        }
    })
}

fn log_dropped(what: &str, error: &HomeError) {
    if error.is_soft() {
        tracing::info!("Dropped {}: {}", what, error);
    } else {
        tracing::warn!("Failed to process {}: {}", what, error);
    }
}
