//! Groundlink - threaded TCP communication links for ground-control stations.
//!
//! A link is one point-to-point byte channel between the ground station and
//! a vehicle (or a simulator posing as one). Every link runs its socket on a
//! dedicated worker thread, so the caller-facing API never blocks on network
//! IO; outcomes are reported as [`LinkEvent`]s.
//!
//! # Architecture
//!
//! - **Link handle** ([`TcpLink`]): posts requests, reads state snapshots
//! - **Connection worker** (internal): owns the socket, runs the
//!   connect/disconnect state machine, emits events
//! - **Event bus** ([`EventBus`]): fans events out to every subscriber, in
//!   order, batches kept contiguous
//!
//! Every `connect()` starts a new generation; completions of superseded
//! attempts are discarded silently, so a rapid connect/disconnect sequence
//! never reports a stale `Connected`.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use groundlink::{EventKind, LinkEvent, Result, TcpLink};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let link = TcpLink::builder()
//!         .host("127.0.0.1")
//!         .port(5760)
//!         .build()?;
//!     let mut events = link.subscribe();
//!
//!     link.connect();
//!     events.wait_for(EventKind::Connected, Duration::from_secs(10)).await?;
//!
//!     link.write_bytes(b"hello");
//!     if let LinkEvent::BytesReceived { data, .. } =
//!         events.wait_for(EventKind::BytesReceived, Duration::from_secs(1)).await?
//!     {
//!         println!("received {} bytes", data.len());
//!     }
//!
//!     link.disconnect();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | Error types and [`Result`] alias |
//! | [`event`] | Notification contract: [`LinkEvent`], [`EventBus`], [`Subscription`] |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`link`] | [`LinkInterface`], [`TcpLink`], configuration |
//! | [`transport`] | Connection worker, socket adapter, [`LoopbackServer`] |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Link notifications and their delivery.
pub mod event;

/// Type-safe identifiers for links and subscriptions.
pub mod identifiers;

/// Link handles and configuration.
///
/// Use [`TcpLink::builder()`] to create a configured link.
pub mod link;

/// TCP transport layer.
///
/// Internal worker and socket adapter, plus the public echo peer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Error types
pub use error::{Error, Result};

// Event types
pub use event::{EventBus, EventKind, EventMask, LinkEvent, Subscription};

// Identifier types
pub use identifiers::{LinkId, SubscriptionId};

// Link types
pub use link::{LinkBuilder, LinkConfig, LinkIdentity, LinkInterface, LinkState, TcpLink};

// Transport types
pub use transport::LoopbackServer;
