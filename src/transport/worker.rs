//! Connection worker: the per-link state machine and event loop.
//!
//! Each link runs one worker on a dedicated OS thread driving a
//! current-thread tokio runtime. The caller's side only posts
//! [`WorkerCommand`]s and reads snapshots; the socket and its buffers are
//! touched exclusively from the worker thread.
//!
//! # Event Loop
//!
//! The loop selects over:
//!
//! - Commands from the link handle (connect, disconnect, write, flush, shutdown)
//! - Completions of connect attempts, stamped with their generation
//! - Failures of the writer task, stamped with their generation
//! - Reads from the open transport
//!
//! # Writes
//!
//! Writes never run inside the loop. Each connection gets a writer task that
//! owns the write half of the socket and drains a pending-write queue in
//! order. A peer that stops reading blocks only that task; the loop keeps
//! serving commands and reads, and `disconnect()` aborts the task.
//!
//! # Generations
//!
//! Every `connect()` starts a new generation. A connect attempt runs as its
//! own task and reports back with the generation it was started for; a
//! completion whose generation is no longer the one being waited on is
//! discarded, and its socket dropped, without emitting anything. Writer
//! failures are filtered the same way.

// ============================================================================
// Imports
// ============================================================================

use std::future::pending;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tokio::task;
use tracing::{Instrument, debug, info_span, trace, warn};

use crate::error::{Error, Result};
use crate::event::{EventBus, LinkEvent};
use crate::identifiers::LinkId;
use crate::link::state::AtomicLinkState;
use crate::link::{LinkConfig, LinkIdentity, LinkState};

use super::socket::{ReadOutcome, SocketReader, SocketTransport, SocketWriter};

// ============================================================================
// LinkShared
// ============================================================================

/// State shared between a link handle and its worker.
///
/// The handle writes the identity; the worker writes the state snapshot.
/// Both emit on the bus.
#[derive(Debug)]
pub(crate) struct LinkShared {
    id: LinkId,
    identity: RwLock<LinkIdentity>,
    state: AtomicLinkState,
    bus: EventBus,
}

impl LinkShared {
    pub(crate) fn new(identity: LinkIdentity) -> Self {
        Self {
            id: LinkId::generate(),
            identity: RwLock::new(identity),
            state: AtomicLinkState::default(),
            bus: EventBus::new(),
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> LinkId {
        self.id
    }

    #[inline]
    pub(crate) fn identity(&self) -> LinkIdentity {
        self.identity.read().clone()
    }

    #[inline]
    pub(crate) fn name(&self) -> String {
        self.identity.read().name()
    }

    #[inline]
    pub(crate) fn state(&self) -> LinkState {
        self.state.load()
    }

    #[inline]
    pub(crate) fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Applies `update` to the identity and emits the resulting name.
    ///
    /// The emission happens under the identity lock so concurrent setters
    /// report names in the order they were applied.
    pub(crate) fn update_identity(&self, update: impl FnOnce(&mut LinkIdentity)) {
        let mut identity = self.identity.write();
        update(&mut identity);
        let name = identity.name();
        debug!(link = %self.id, %name, "Link name changed");
        self.bus.emit(LinkEvent::NameChanged(name));
    }
}

// ============================================================================
// WorkerCommand
// ============================================================================

/// Requests posted from a link handle to its worker.
#[derive(Debug)]
pub(crate) enum WorkerCommand {
    /// Start a new connect attempt, replacing any current transport.
    Connect,
    /// Close the transport or abort the attempt in flight.
    Disconnect,
    /// Send bytes on the open transport.
    Write(Vec<u8>),
    /// Wait for queued writes to drain, flush, and report bytes written
    /// since the previous flush.
    Flush {
        response_tx: oneshot::Sender<Result<usize>>,
    },
    /// Disconnect and stop the worker.
    Shutdown,
}

// ============================================================================
// Phase
// ============================================================================

/// Completion of a connect attempt.
struct ConnectOutcome {
    generation: u64,
    result: Result<SocketTransport>,
}

/// Write-side failure of a connection.
struct WriteFailure {
    generation: u64,
    error: io::Error,
}

/// Entry of the pending-write queue.
enum WriteRequest {
    Bytes(Vec<u8>),
    Flush(oneshot::Sender<Result<usize>>),
}

/// Writer task of one connection and its queue.
struct WriterHandle {
    queue: mpsc::UnboundedSender<WriteRequest>,
    task: task::JoinHandle<()>,
}

/// Worker-private state. Mirrors [`LinkState`] and owns the resources.
enum Phase {
    Idle,
    Connecting {
        generation: u64,
        attempt: task::JoinHandle<()>,
    },
    Connected {
        generation: u64,
        reader: SocketReader,
        writer: WriterHandle,
    },
}

// ============================================================================
// ConnectionWorker
// ============================================================================

/// Owns the transport of one link.
pub(crate) struct ConnectionWorker {
    shared: Arc<LinkShared>,
    config: LinkConfig,
    command_rx: mpsc::UnboundedReceiver<WorkerCommand>,
    outcome_tx: mpsc::UnboundedSender<ConnectOutcome>,
    outcome_rx: mpsc::UnboundedReceiver<ConnectOutcome>,
    failure_tx: mpsc::UnboundedSender<WriteFailure>,
    failure_rx: mpsc::UnboundedReceiver<WriteFailure>,
    generation: u64,
    phase: Phase,
}

impl ConnectionWorker {
    /// Starts a worker thread for `shared`.
    ///
    /// Returns the command channel and the thread handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the runtime or thread cannot be created.
    pub(crate) fn spawn(
        shared: Arc<LinkShared>,
        config: LinkConfig,
    ) -> Result<(mpsc::UnboundedSender<WorkerCommand>, JoinHandle<()>)> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let (failure_tx, failure_rx) = mpsc::unbounded_channel();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .enable_time()
            .build()?;

        let span = info_span!("link", id = %shared.id());
        let thread_name = format!("groundlink-{}", shared.id());

        let worker = Self {
            shared,
            config,
            command_rx,
            outcome_tx,
            outcome_rx,
            failure_tx,
            failure_rx,
            generation: 0,
            phase: Phase::Idle,
        };

        let handle = thread::Builder::new()
            .name(thread_name)
            .spawn(move || runtime.block_on(worker.run().instrument(span)))?;

        Ok((command_tx, handle))
    }

    /// Event loop. Returns after `Shutdown` or when every handle is gone.
    async fn run(mut self) {
        debug!("Worker started");

        loop {
            tokio::select! {
                command = self.command_rx.recv() => {
                    match command {
                        Some(WorkerCommand::Connect) => self.start_connect(),
                        Some(WorkerCommand::Disconnect) => self.disconnect(),
                        Some(WorkerCommand::Write(bytes)) => self.write(bytes),
                        Some(WorkerCommand::Flush { response_tx }) => self.flush(response_tx),
                        Some(WorkerCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            self.disconnect();
                            break;
                        }
                        None => {
                            debug!("Command channel closed");
                            self.disconnect();
                            break;
                        }
                    }
                }

                Some(outcome) = self.outcome_rx.recv() => {
                    self.finish_connect(outcome);
                }

                Some(failure) = self.failure_rx.recv() => {
                    self.handle_write_failure(failure);
                }

                outcome = Self::next_read(&mut self.phase) => {
                    self.handle_read(outcome);
                }
            }
        }

        debug!("Worker terminated");
    }

    /// Resolves with the next read when connected; never resolves otherwise.
    async fn next_read(phase: &mut Phase) -> ReadOutcome {
        match phase {
            Phase::Connected { reader, .. } if reader.is_open() => reader.read().await,
            _ => pending().await,
        }
    }
}

// ============================================================================
// ConnectionWorker - State Machine
// ============================================================================

impl ConnectionWorker {
    fn start_connect(&mut self) {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => {}
            Phase::Connecting {
                generation,
                attempt,
            } => {
                // Never connected, so nothing to report for it.
                attempt.abort();
                debug!(generation, "Replaced in-flight connect attempt");
            }
            Phase::Connected {
                generation,
                mut reader,
                writer,
            } => {
                reader.close();
                writer.task.abort();
                self.shared.state.store(LinkState::Disconnected);
                self.shared.bus.emit_batch([
                    LinkEvent::Disconnected,
                    LinkEvent::ConnectedStateChanged(false),
                ]);
                debug!(generation, "Closed transport before reconnecting");
            }
        }

        self.generation += 1;
        let generation = self.generation;
        let identity = self.shared.identity();
        let config = self.config.clone();
        let outcome_tx = self.outcome_tx.clone();

        debug!(generation, peer = %identity, "Connecting");

        let attempt = task::spawn(async move {
            let result = SocketTransport::open(identity.host(), identity.port(), &config).await;
            let _ = outcome_tx.send(ConnectOutcome { generation, result });
        });

        self.phase = Phase::Connecting {
            generation,
            attempt,
        };
        self.shared.state.store(LinkState::Connecting);
    }

    fn finish_connect(&mut self, outcome: ConnectOutcome) {
        let current = matches!(
            self.phase,
            Phase::Connecting { generation, .. } if generation == outcome.generation
        );
        if !current {
            trace!(
                generation = outcome.generation,
                "Discarded stale connect completion"
            );
            return;
        }

        match outcome.result {
            Ok(transport) => {
                let (reader, writer) = transport.split();
                self.phase = Phase::Connected {
                    generation: outcome.generation,
                    reader,
                    writer: self.start_writer(outcome.generation, writer),
                };
                self.shared.state.store(LinkState::Connected);
                self.shared.bus.emit_batch([
                    LinkEvent::Connected,
                    LinkEvent::ConnectedStateChanged(true),
                ]);
                debug!(generation = outcome.generation, "Connected");
            }
            Err(e) => {
                self.phase = Phase::Idle;
                self.shared.state.store(LinkState::Disconnected);

                let link_name = self.shared.name();
                warn!(generation = outcome.generation, link = %link_name, error = %e, "Connect failed");
                self.shared.bus.emit(LinkEvent::CommunicationError {
                    link_name,
                    message: e.to_string(),
                });
            }
        }
    }

    fn disconnect(&mut self) {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => {
                trace!("Disconnect on idle link ignored");
                return;
            }
            Phase::Connecting {
                generation,
                attempt,
            } => {
                attempt.abort();
                debug!(generation, "Aborted in-flight connect attempt");
            }
            Phase::Connected {
                generation,
                mut reader,
                writer,
            } => {
                reader.close();
                writer.task.abort();
                debug!(generation, "Disconnected");
            }
        }

        self.shared.state.store(LinkState::Disconnected);
        self.shared.bus.emit_batch([
            LinkEvent::Disconnected,
            LinkEvent::ConnectedStateChanged(false),
        ]);
    }

    /// Tears down a broken transport. Same notifications as `disconnect`,
    /// followed by a `CommunicationError` when there is an error to report.
    fn fail_transport(&mut self, error: Option<io::Error>) {
        self.disconnect();

        if let Some(error) = error {
            let link_name = self.shared.name();
            warn!(link = %link_name, %error, "Link transport failed");
            self.shared.bus.emit(LinkEvent::CommunicationError {
                link_name,
                message: error.to_string(),
            });
        }
    }
}

// ============================================================================
// ConnectionWorker - Data Path
// ============================================================================

impl ConnectionWorker {
    fn handle_read(&mut self, outcome: ReadOutcome) {
        match outcome {
            ReadOutcome::Data(data) => {
                trace!(bytes = data.len(), "Bytes received");
                self.shared.bus.emit(LinkEvent::BytesReceived {
                    link: self.shared.id,
                    data,
                });
            }
            ReadOutcome::Closed => {
                debug!("Connection closed by peer");
                self.fail_transport(None);
            }
            ReadOutcome::Failed(e) => {
                self.fail_transport(Some(e));
            }
        }
    }

    fn handle_write_failure(&mut self, failure: WriteFailure) {
        let current = matches!(
            self.phase,
            Phase::Connected { generation, .. } if generation == failure.generation
        );
        if !current {
            trace!(
                generation = failure.generation,
                "Discarded stale write failure"
            );
            return;
        }

        self.fail_transport(Some(failure.error));
    }

    fn write(&self, bytes: Vec<u8>) {
        let Phase::Connected { writer, .. } = &self.phase else {
            debug!(bytes = bytes.len(), "Discarded write on unconnected link");
            return;
        };

        if let Err(e) = writer.queue.send(WriteRequest::Bytes(bytes))
            && let WriteRequest::Bytes(bytes) = e.0
        {
            debug!(bytes = bytes.len(), "Discarded write after writer stopped");
        }
    }

    fn flush(&self, response_tx: oneshot::Sender<Result<usize>>) {
        let Phase::Connected { writer, .. } = &self.phase else {
            let _ = response_tx.send(Err(Error::NotConnected));
            return;
        };

        if let Err(e) = writer.queue.send(WriteRequest::Flush(response_tx))
            && let WriteRequest::Flush(response_tx) = e.0
        {
            let _ = response_tx.send(Err(Error::NotConnected));
        }
    }

    /// Spawns the writer task for a new connection.
    fn start_writer(&self, generation: u64, writer: SocketWriter) -> WriterHandle {
        let (queue, requests) = mpsc::unbounded_channel();
        let failure_tx = self.failure_tx.clone();

        let task = task::spawn(Self::drain_writes(generation, writer, requests, failure_tx));

        WriterHandle { queue, task }
    }

    /// Writes queued requests in order until the queue closes or a write
    /// fails. Runs as its own task.
    async fn drain_writes(
        generation: u64,
        mut writer: SocketWriter,
        mut requests: mpsc::UnboundedReceiver<WriteRequest>,
        failure_tx: mpsc::UnboundedSender<WriteFailure>,
    ) {
        let mut unflushed = 0usize;

        while let Some(request) = requests.recv().await {
            let result = match request {
                WriteRequest::Bytes(bytes) => {
                    let result = writer.write(&bytes).await;
                    if result.is_ok() {
                        unflushed += bytes.len();
                        trace!(generation, bytes = bytes.len(), "Bytes written");
                    }
                    result
                }
                WriteRequest::Flush(response_tx) => {
                    let result = writer.flush().await;
                    let reply = match &result {
                        Ok(()) => Ok(std::mem::take(&mut unflushed)),
                        Err(e) => Err(Error::connection(e.to_string())),
                    };
                    let _ = response_tx.send(reply);
                    result
                }
            };

            if let Err(error) = result {
                let _ = failure_tx.send(WriteFailure { generation, error });
                return;
            }
        }
    }
}
