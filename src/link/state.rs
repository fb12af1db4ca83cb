//! Connection state and its lock-free snapshot.
//!
//! The connection worker is the only writer. Callers read the snapshot to
//! answer `is_connected()` without talking to the worker.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

// ============================================================================
// LinkState
// ============================================================================

/// Connection state of a link.
///
/// `Disconnected → Connecting → Connected → Disconnected`; a failed
/// `Connecting` goes straight back to `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum LinkState {
    /// No transport.
    #[default]
    Disconnected = 0,
    /// Connect attempt in flight.
    Connecting = 1,
    /// Transport open.
    Connected = 2,
}

impl LinkState {
    #[inline]
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            _ => Self::Disconnected,
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        f.write_str(name)
    }
}

// ============================================================================
// AtomicLinkState
// ============================================================================

/// Atomically readable [`LinkState`] snapshot.
#[derive(Debug, Default)]
pub(crate) struct AtomicLinkState(AtomicU8);

impl AtomicLinkState {
    #[inline]
    pub(crate) fn load(&self) -> LinkState {
        LinkState::from_u8(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn store(&self, state: LinkState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

// ============================================================================
// Tests
// ============================================================================
