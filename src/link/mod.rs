//! Communication links.
//!
//! A link is one independently-threaded endpoint that a link manager can
//! create, configure, connect, feed bytes to and from, and retire. Its state
//! is observed through [`LinkEvent`](crate::event::LinkEvent) notifications,
//! never by polling.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`LinkInterface`] | Transport-independent surface used by link managers |
//! | [`TcpLink`] | TCP client link backed by its own worker thread |
//! | [`LinkBuilder`] | Fluent configuration builder |
//! | [`LinkConfig`] | Host, port, and socket tuning |
//! | [`LinkIdentity`] | Host/port pair and derived `host:port` name |
//! | [`LinkState`] | `Disconnected`, `Connecting`, `Connected` |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder for TCP links.
pub mod builder;

/// Link configuration.
pub mod config;

/// Target host/port and display name.
pub mod identity;

/// Connection state.
pub mod state;

/// TCP link handle.
pub mod tcp;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::event::Subscription;
use crate::identifiers::LinkId;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::LinkBuilder;
pub use config::LinkConfig;
pub use identity::LinkIdentity;
pub use state::LinkState;
pub use tcp::TcpLink;

// ============================================================================
// LinkInterface
// ============================================================================

/// Surface shared by every link transport.
///
/// All methods return immediately. Outcomes of `connect`, `disconnect`, and
/// `write_bytes` are reported through the link's events.
#[async_trait]
pub trait LinkInterface: Send + Sync {
    /// Stable identity of this link.
    fn id(&self) -> LinkId;

    /// Current display name.
    fn name(&self) -> String;

    /// Current target host address.
    fn host_address(&self) -> String;

    /// Current target port.
    fn port(&self) -> u16;

    /// Current connection state snapshot.
    fn state(&self) -> LinkState;

    /// Returns `true` if the transport is open.
    fn is_connected(&self) -> bool {
        self.state() == LinkState::Connected
    }

    /// Requests a connect attempt.
    ///
    /// `true` means the request was accepted, not that the link is connected.
    /// Wait for `Connected` or `CommunicationError` to learn the outcome.
    fn connect(&self) -> bool;

    /// Requests a disconnect. A no-op on a disconnected link.
    fn disconnect(&self);

    /// Queues bytes for transmission, in order.
    fn write_bytes(&self, bytes: &[u8]);

    /// Subscribes to this link's events.
    fn subscribe(&self) -> Subscription;

    /// Waits until every byte queued so far has been handed to the socket.
    ///
    /// Returns the number of bytes written since the previous flush.
    async fn wait_for_bytes_written(&self, timeout: Duration) -> Result<usize>;
}
