//! TCP transport layer.
//!
//! This module owns everything that touches a socket: the per-link
//! connection worker and the socket adapter it drives, plus an echo peer for
//! end-to-end checks.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  WorkerCommand   ┌──────────────────────────────┐
//! │  TcpLink (any    │ ───────────────► │  ConnectionWorker            │
//! │  caller thread)  │                  │  (own thread + runtime)      │
//! │                  │ ◄─────────────── │    └─ SocketTransport ──TCP──┼──► peer
//! └──────────────────┘    LinkEvent     └──────────────────────────────┘
//!                         (EventBus)
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `worker` | Connection state machine and event loop |
//! | `socket` | Adapter over one TCP stream |
//! | `loopback` | Echo server |

// ============================================================================
// Submodules
// ============================================================================

/// Echo peer.
pub mod loopback;

/// One TCP stream.
pub(crate) mod socket;

/// Per-link connection worker.
pub(crate) mod worker;

// ============================================================================
// Re-exports
// ============================================================================

pub use loopback::LoopbackServer;
