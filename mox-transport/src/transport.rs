//! UDP transport for talking to a MOX LT controller.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use mox_protocol::{CommandFrame, ProtocolError, ResponseFrame};
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::TransportConfig;
use crate::error::{Result, TransportError};

/// Lifecycle of a DeviceTransport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Created, no socket yet
    Idle,
    /// Socket bound and receiving
    Bound,
    /// Socket released; the transport cannot be reused
    Closed,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransportState::Idle => "idle",
            TransportState::Bound => "bound",
            TransportState::Closed => "closed",
        })
    }
}

/// Events emitted by a DeviceTransport
#[derive(Debug)]
pub enum TransportEvent {
    /// The local endpoint was bound
    Connected { local_address: SocketAddr },
    /// A datagram arrived; `frame` holds the decode attempt
    Received {
        from: SocketAddr,
        raw: Bytes,
        frame: std::result::Result<ResponseFrame, ProtocolError>,
    },
    /// A frame was handed to the socket
    Sent { frame: CommandFrame },
    /// The socket was released
    Disconnected,
}

/// Something that can deliver command frames to the controller
#[async_trait]
pub trait FrameSender: Send + Sync {
    /// Send a frame, returning the number of bytes written
    async fn send_frame(&self, frame: &CommandFrame) -> Result<usize>;
}

struct Binding {
    socket: Arc<UdpSocket>,
    local_address: SocketAddr,
    server_address: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    receive_task: JoinHandle<()>,
}

enum Lifecycle {
    Idle,
    Bound(Binding),
    Closed,
}

impl Lifecycle {
    fn state(&self) -> TransportState {
        match self {
            Lifecycle::Idle => TransportState::Idle,
            Lifecycle::Bound(_) => TransportState::Bound,
            Lifecycle::Closed => TransportState::Closed,
        }
    }
}

/// Owns the UDP endpoint used to reach one controller.
///
/// Frames are sent fire-and-forget to the controller's fixed endpoint. Every
/// inbound datagram is decoded and forwarded as a [`TransportEvent::Received`]
/// on the event channel given at construction.
///
/// # Example
///
/// ```no_run
/// use mox_protocol::{AccessoryKey, ChannelId, Command, CommandFrame, ModuleId};
/// use mox_transport::{DeviceTransport, TransportConfig, TransportEvent};
/// use tokio::sync::mpsc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let (tx, mut rx) = mpsc::unbounded_channel();
/// let transport = DeviceTransport::new(TransportConfig::default(), tx);
/// transport.connect().await?;
///
/// let key = AccessoryKey::new(ModuleId::parse("0x0000cc")?, ChannelId::new(0x16));
/// transport.send(&CommandFrame::encode(key, Command::RequestLightStatus)).await?;
///
/// while let Some(event) = rx.recv().await {
///     if let TransportEvent::Received { frame: Ok(frame), .. } = event {
///         println!("{} -> {}", frame.key(), frame.classify());
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct DeviceTransport {
    config: TransportConfig,
    event_sender: mpsc::UnboundedSender<TransportEvent>,
    lifecycle: Mutex<Lifecycle>,
}

impl DeviceTransport {
    pub fn new(config: TransportConfig, event_sender: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self {
            config,
            event_sender,
            lifecycle: Mutex::new(Lifecycle::Idle),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn state(&self) -> TransportState {
        self.lifecycle.lock().state()
    }

    /// The bound local endpoint, if connected
    pub fn local_address(&self) -> Option<SocketAddr> {
        match &*self.lifecycle.lock() {
            Lifecycle::Bound(binding) => Some(binding.local_address),
            _ => None,
        }
    }

    /// Bind the local endpoint and start receiving
    ///
    /// Only valid on an idle transport.
    pub async fn connect(&self) -> Result<()> {
        let state = self.state();
        if state != TransportState::Idle {
            return Err(TransportError::InvalidState(state));
        }

        self.config.validate()?;
        let local = self.config.local_socket_address()?;
        let server_address = self.config.server_socket_address()?;

        let socket = UdpSocket::bind(local).await.map_err(|e| TransportError::Bind {
            address: local.to_string(),
            reason: e.to_string(),
        })?;
        let local_address = socket.local_addr().map_err(|e| TransportError::Bind {
            address: local.to_string(),
            reason: e.to_string(),
        })?;
        let socket = Arc::new(socket);

        let mut lifecycle = self.lifecycle.lock();
        if !matches!(*lifecycle, Lifecycle::Idle) {
            // Lost a race with another connect or a disconnect; the socket drops here.
            return Err(TransportError::InvalidState(lifecycle.state()));
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let receive_task = tokio::spawn(receive_loop(
            Arc::clone(&socket),
            self.config.receive_buffer_size,
            self.event_sender.clone(),
            shutdown_rx,
        ));

        *lifecycle = Lifecycle::Bound(Binding {
            socket,
            local_address,
            server_address,
            shutdown_tx,
            receive_task,
        });
        drop(lifecycle);

        tracing::info!(
            "Bound MOX transport on {} (controller {})",
            local_address,
            server_address
        );
        let _ = self.event_sender.send(TransportEvent::Connected { local_address });

        Ok(())
    }

    /// Release the socket
    ///
    /// Calling this on a transport that is already closed does nothing.
    pub async fn disconnect(&self) {
        let previous = std::mem::replace(&mut *self.lifecycle.lock(), Lifecycle::Closed);

        let Lifecycle::Bound(binding) = previous else {
            return;
        };

        let _ = binding.shutdown_tx.send(true);
        if let Err(e) = binding.receive_task.await {
            if !e.is_cancelled() {
                tracing::warn!("MOX transport receive task ended abnormally: {}", e);
            }
        }

        tracing::info!("Closed MOX transport on {}", binding.local_address);
        let _ = self.event_sender.send(TransportEvent::Disconnected);
    }

    /// Send a frame to the controller
    ///
    /// Fails with [`TransportError::NotConnected`] unless the transport is
    /// bound, including when it is disconnected while the send is in flight.
    pub async fn send(&self, frame: &CommandFrame) -> Result<usize> {
        let (socket, server_address, mut shutdown_rx) = match &*self.lifecycle.lock() {
            Lifecycle::Bound(binding) => (
                Arc::clone(&binding.socket),
                binding.server_address,
                binding.shutdown_tx.subscribe(),
            ),
            _ => return Err(TransportError::NotConnected),
        };

        let written = tokio::select! {
            result = socket.send_to(frame.as_bytes(), server_address) => {
                result.map_err(|e| TransportError::Send {
                    address: server_address,
                    reason: e.to_string(),
                })?
            }
            _ = shutdown_rx.changed() => return Err(TransportError::NotConnected),
        };

        tracing::debug!(
            "Sent {} to {} ({} bytes)",
            frame.command(),
            frame.key(),
            written
        );
        let _ = self.event_sender.send(TransportEvent::Sent {
            frame: frame.clone(),
        });

        Ok(written)
    }
}

#[async_trait]
impl FrameSender for DeviceTransport {
    async fn send_frame(&self, frame: &CommandFrame) -> Result<usize> {
        self.send(frame).await
    }
}

impl Drop for DeviceTransport {
    fn drop(&mut self) {
        if let Lifecycle::Bound(binding) = std::mem::replace(self.lifecycle.get_mut(), Lifecycle::Closed) {
            tracing::debug!(
                "DeviceTransport dropped while bound on {}, stopping receiver",
                binding.local_address
            );
            let _ = binding.shutdown_tx.send(true);
            binding.receive_task.abort();
        }
    }
}

const RECEIVE_BACKOFF_INITIAL: Duration = Duration::from_millis(10);
const RECEIVE_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Delay before the next receive after `errors` consecutive failures
fn receive_backoff(errors: u32) -> Duration {
    let exponent = errors.saturating_sub(1).min(16);
    RECEIVE_BACKOFF_INITIAL
        .saturating_mul(1 << exponent)
        .min(RECEIVE_BACKOFF_MAX)
}

/// Sleeps for `delay` unless shutdown is signalled first
///
/// Returns `false` when the loop should stop.
async fn pause_unless_shutdown(delay: Duration, shutdown_rx: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = shutdown_rx.changed() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

async fn receive_loop(
    socket: Arc<UdpSocket>,
    buffer_size: usize,
    events: mpsc::UnboundedSender<TransportEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut buffer = vec![0u8; buffer_size];
    let mut consecutive_errors: u32 = 0;

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            received = socket.recv_from(&mut buffer) => match received {
                Ok((len, from)) => {
                    consecutive_errors = 0;
                    let raw = Bytes::copy_from_slice(&buffer[..len]);
                    let frame = ResponseFrame::from_bytes(raw.clone());
                    tracing::debug!("Received {} bytes from {}", len, from);

                    if events.send(TransportEvent::Received { from, raw, frame }).is_err() {
                        tracing::debug!("Transport event receiver dropped, stopping receive loop");
                        break;
                    }
                }
                Err(e) => {
                    consecutive_errors = consecutive_errors.saturating_add(1);
                    let delay = receive_backoff(consecutive_errors);
                    tracing::warn!(
                        "MOX socket receive error ({} in a row), retrying in {:?}: {}",
                        consecutive_errors,
                        delay,
                        e
                    );
                    if !pause_unless_shutdown(delay, &mut shutdown_rx).await {
                        break;
                    }
                }
            }
        }
    }
}
