//! TCP client link.
//!
//! [`TcpLink`] is the caller-side handle. Every call posts a request to the
//! link's connection worker and returns immediately; outcomes arrive as
//! [`LinkEvent`](crate::event::LinkEvent)s.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use groundlink::{EventKind, TcpLink};
//!
//! # async fn example() -> groundlink::Result<()> {
//! let link = TcpLink::new("127.0.0.1", 5760)?;
//! let mut events = link.subscribe();
//!
//! link.connect();
//! events.wait_for(EventKind::Connected, Duration::from_secs(10)).await?;
//!
//! link.write_bytes(b"hello");
//! link.disconnect();
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::event::Subscription;
use crate::identifiers::LinkId;
use crate::transport::worker::{ConnectionWorker, LinkShared, WorkerCommand};

use super::builder::LinkBuilder;
use super::config::LinkConfig;
use super::identity::LinkIdentity;
use super::state::LinkState;
use super::LinkInterface;

// ============================================================================
// TcpLink
// ============================================================================

/// TCP client link with its own worker thread.
///
/// # Thread Safety
///
/// `TcpLink` is `Send + Sync`; share it behind an `Arc` or hand it to a link
/// manager as `Box<dyn LinkInterface>`. No method blocks on network IO.
///
/// # Lifecycle
///
/// Dropping the handle disconnects the link (emitting the usual
/// notifications to any remaining subscribers) and joins the worker thread.
#[derive(Debug)]
pub struct TcpLink {
    /// State shared with the worker.
    shared: Arc<LinkShared>,
    /// Channel for posting requests to the worker.
    command_tx: mpsc::UnboundedSender<WorkerCommand>,
    /// Tuning the link was built with.
    config: LinkConfig,
    /// Worker thread, taken on drop.
    worker: Mutex<Option<JoinHandle<()>>>,
}

// ============================================================================
// TcpLink - Constructors
// ============================================================================

impl TcpLink {
    /// Creates a disconnected link to `host:port` with default tuning.
    ///
    /// # Errors
    ///
    /// See [`LinkBuilder::build`].
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        Self::builder().host(host).port(port).build()
    }

    /// Creates a disconnected link from a configuration.
    ///
    /// # Errors
    ///
    /// See [`LinkBuilder::build`].
    pub fn from_config(config: LinkConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// Returns a builder for configuring a link.
    #[inline]
    #[must_use]
    pub fn builder() -> LinkBuilder {
        LinkBuilder::new()
    }

    /// Starts the worker for an already validated configuration.
    pub(crate) fn spawn(config: LinkConfig) -> Result<Self> {
        let shared = Arc::new(LinkShared::new(config.identity()));
        let (command_tx, handle) = ConnectionWorker::spawn(Arc::clone(&shared), config.clone())?;

        debug!(link = %shared.id(), name = %shared.name(), "Link created");

        Ok(Self {
            shared,
            command_tx,
            config,
            worker: Mutex::new(Some(handle)),
        })
    }
}

// ============================================================================
// TcpLink - Properties
// ============================================================================

impl TcpLink {
    /// Returns the stable link ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> LinkId {
        self.shared.id()
    }

    /// Returns the display name, `host:port`.
    #[inline]
    #[must_use]
    pub fn name(&self) -> String {
        self.shared.name()
    }

    /// Returns the target host address.
    #[inline]
    #[must_use]
    pub fn host_address(&self) -> String {
        self.shared.identity().host().to_string()
    }

    /// Returns the target port.
    #[inline]
    #[must_use]
    pub fn port(&self) -> u16 {
        self.shared.identity().port()
    }

    /// Returns the current host/port pair.
    #[inline]
    #[must_use]
    pub fn identity(&self) -> LinkIdentity {
        self.shared.identity()
    }

    /// Returns the configuration, with the current host and port.
    #[must_use]
    pub fn config(&self) -> LinkConfig {
        let identity = self.shared.identity();
        self.config
            .clone()
            .with_host(identity.host())
            .with_port(identity.port())
    }

    /// Returns the connection state snapshot.
    #[inline]
    #[must_use]
    pub fn state(&self) -> LinkState {
        self.shared.state()
    }

    /// Returns `true` if the transport is open.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == LinkState::Connected
    }

    /// Sets the target host address and emits `NameChanged`.
    ///
    /// Never reconnects. A connected link keeps its socket; the new address
    /// is used by the next `connect()`.
    pub fn set_host_address(&self, host: impl Into<String>) {
        let host = host.into();
        self.shared.update_identity(|identity| identity.set_host(host));
    }

    /// Sets the target port and emits `NameChanged`.
    ///
    /// Never reconnects. A connected link keeps its socket; the new port is
    /// used by the next `connect()`.
    pub fn set_port(&self, port: u16) {
        self.shared.update_identity(|identity| identity.set_port(port));
    }
}

// ============================================================================
// TcpLink - Operations
// ============================================================================

impl TcpLink {
    /// Requests a connect attempt.
    ///
    /// Returns `true` when the request was accepted; the outcome is reported
    /// by `Connected` + `ConnectedStateChanged(true)` or by one
    /// `CommunicationError`. Returns `false` only if the worker is gone.
    pub fn connect(&self) -> bool {
        self.post(WorkerCommand::Connect)
    }

    /// Requests a disconnect.
    ///
    /// Emits `Disconnected` + `ConnectedStateChanged(false)` if the link was
    /// connecting or connected; otherwise nothing.
    pub fn disconnect(&self) {
        self.post(WorkerCommand::Disconnect);
    }

    /// Queues bytes for transmission.
    ///
    /// Bytes are sent in the order queued. Bytes queued while the link is
    /// not connected are discarded.
    pub fn write_bytes(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.post(WorkerCommand::Write(bytes.to_vec()));
    }

    /// Subscribes to this link's events.
    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.shared.bus().subscribe()
    }

    /// Waits until every byte queued so far has been handed to the socket.
    ///
    /// Returns the number of bytes written since the previous flush.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if the link is not connected, or disconnects
    ///   before the queued bytes are written
    /// - [`Error::Connection`] if the socket fails while flushing
    /// - [`Error::Timeout`] if the bytes are not written in time
    /// - [`Error::WorkerGone`] if the worker has terminated
    pub async fn wait_for_bytes_written(&self, duration: Duration) -> Result<usize> {
        let (response_tx, response_rx) = oneshot::channel();

        if !self.post(WorkerCommand::Flush { response_tx }) {
            return Err(Error::WorkerGone);
        }

        match timeout(duration, response_rx).await {
            Ok(Ok(result)) => result,
            // The reply was dropped: either the connection was torn down
            // with the flush still queued, or the worker itself is gone.
            Ok(Err(_)) if self.command_tx.is_closed() => Err(Error::WorkerGone),
            Ok(Err(_)) => Err(Error::NotConnected),
            Err(_) => Err(Error::timeout(
                "waiting for bytes written",
                duration.as_millis() as u64,
            )),
        }
    }

    fn post(&self, command: WorkerCommand) -> bool {
        match self.command_tx.send(command) {
            Ok(()) => true,
            Err(e) => {
                warn!(link = %self.name(), command = ?e.0, "Link worker is gone");
                false
            }
        }
    }
}

// ============================================================================
// LinkInterface
// ============================================================================

#[async_trait]
impl LinkInterface for TcpLink {
    fn id(&self) -> LinkId {
        TcpLink::id(self)
    }

    fn name(&self) -> String {
        TcpLink::name(self)
    }

    fn host_address(&self) -> String {
        TcpLink::host_address(self)
    }

    fn port(&self) -> u16 {
        TcpLink::port(self)
    }

    fn state(&self) -> LinkState {
        TcpLink::state(self)
    }

    fn connect(&self) -> bool {
        TcpLink::connect(self)
    }

    fn disconnect(&self) {
        TcpLink::disconnect(self);
    }

    fn write_bytes(&self, bytes: &[u8]) {
        TcpLink::write_bytes(self, bytes);
    }

    fn subscribe(&self) -> Subscription {
        TcpLink::subscribe(self)
    }

    async fn wait_for_bytes_written(&self, timeout: Duration) -> Result<usize> {
        TcpLink::wait_for_bytes_written(self, timeout).await
    }
}

// ============================================================================
// Drop
// ============================================================================

impl Drop for TcpLink {
    fn drop(&mut self) {
        let state = self.state();
        if state != LinkState::Disconnected {
            warn!(link = %self.name(), %state, "Link dropped while not disconnected");
        }

        let _ = self.command_tx.send(WorkerCommand::Shutdown);

        if let Some(handle) = self.worker.lock().take()
            && handle.join().is_err()
        {
            error!(link = %self.name(), "Link worker panicked");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
