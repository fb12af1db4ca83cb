//! Link notification contract.
//!
//! Links report everything that happens to them through a fixed, closed set
//! of [`LinkEvent`]s. Callers never poll a link for progress; they subscribe
//! to its [`EventBus`] and wait on a [`Subscription`] with an explicit
//! timeout.
//!
//! # Event Types
//!
//! | Event | Payload | Emitted when |
//! |-------|---------|--------------|
//! | `Connected` | none | connect attempt succeeded |
//! | `Disconnected` | none | link left the connected/connecting state |
//! | `ConnectedStateChanged` | `bool` | paired with both of the above |
//! | `NameChanged` | new name | host or port was set |
//! | `BytesReceived` | link id, bytes | one readable chunk arrived |
//! | `CommunicationError` | link name, message | connect failed or transport broke |
//!
//! # Ordering
//!
//! Events from one link reach every subscriber in the order they occurred.
//! Batches (`Connected` + `ConnectedStateChanged(true)`, `Disconnected` +
//! `ConnectedStateChanged(false)`) are delivered contiguously. There is no
//! replay: a subscriber only sees events emitted after it subscribed.

// ============================================================================
// Submodules
// ============================================================================

/// Subscriber registry and subscription handles.
pub mod bus;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::ops::BitOr;

use crate::identifiers::LinkId;

// ============================================================================
// Re-exports
// ============================================================================

pub use bus::{EventBus, Subscription};

// ============================================================================
// LinkEvent
// ============================================================================

/// A notification emitted by a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The link finished connecting.
    Connected,

    /// The link was disconnected, by request or by the peer.
    Disconnected,

    /// Connection state flag, emitted right after `Connected`/`Disconnected`.
    ConnectedStateChanged(bool),

    /// The display name changed. Always carries the complete new name.
    NameChanged(String),

    /// One chunk of bytes was read from the transport.
    BytesReceived {
        /// Link the bytes arrived on.
        link: LinkId,
        /// The chunk, exactly as read.
        data: Vec<u8>,
    },

    /// A connect attempt failed or an established transport broke.
    CommunicationError {
        /// Link name at the time of the failure.
        link_name: String,
        /// Human-readable failure description.
        message: String,
    },
}

impl LinkEvent {
    /// Returns the payload-free kind of this event.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Connected => EventKind::Connected,
            Self::Disconnected => EventKind::Disconnected,
            Self::ConnectedStateChanged(_) => EventKind::ConnectedStateChanged,
            Self::NameChanged(_) => EventKind::NameChanged,
            Self::BytesReceived { .. } => EventKind::BytesReceived,
            Self::CommunicationError { .. } => EventKind::CommunicationError,
        }
    }
}

// ============================================================================
// EventKind
// ============================================================================

/// Discriminant of a [`LinkEvent`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// See [`LinkEvent::Connected`].
    Connected,
    /// See [`LinkEvent::Disconnected`].
    Disconnected,
    /// See [`LinkEvent::ConnectedStateChanged`].
    ConnectedStateChanged,
    /// See [`LinkEvent::NameChanged`].
    NameChanged,
    /// See [`LinkEvent::BytesReceived`].
    BytesReceived,
    /// See [`LinkEvent::CommunicationError`].
    CommunicationError,
}

impl EventKind {
    /// Bit used for this kind inside an [`EventMask`].
    #[inline]
    #[must_use]
    pub const fn bit(self) -> u8 {
        match self {
            Self::Connected => 1 << 0,
            Self::Disconnected => 1 << 1,
            Self::ConnectedStateChanged => 1 << 2,
            Self::NameChanged => 1 << 3,
            Self::BytesReceived => 1 << 4,
            Self::CommunicationError => 1 << 5,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::ConnectedStateChanged => "connectedStateChanged",
            Self::NameChanged => "nameChanged",
            Self::BytesReceived => "bytesReceived",
            Self::CommunicationError => "communicationError",
        };
        f.write_str(name)
    }
}

impl BitOr for EventKind {
    type Output = EventMask;

    fn bitor(self, rhs: Self) -> EventMask {
        EventMask(self.bit() | rhs.bit())
    }
}

// ============================================================================
// EventMask
// ============================================================================

/// Set of [`EventKind`]s.
///
/// Used to check that a sequence of events contains exactly the expected
/// kinds and nothing else.
///
/// # Example
///
/// ```
/// use groundlink::event::{EventKind, EventMask, LinkEvent};
///
/// let events = [LinkEvent::Connected, LinkEvent::ConnectedStateChanged(true)];
/// assert_eq!(
///     EventMask::of(&events),
///     EventKind::Connected | EventKind::ConnectedStateChanged
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventMask(u8);

impl EventMask {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Collects the kinds present in `events`.
    #[must_use]
    pub fn of(events: &[LinkEvent]) -> Self {
        events
            .iter()
            .fold(Self::EMPTY, |mask, event| mask | event.kind())
    }

    /// Returns `true` if `kind` is in the set.
    #[inline]
    #[must_use]
    pub const fn contains(self, kind: EventKind) -> bool {
        self.0 & kind.bit() != 0
    }

    /// Returns `true` if no kind is in the set.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl From<EventKind> for EventMask {
    fn from(kind: EventKind) -> Self {
        Self(kind.bit())
    }
}

impl BitOr<EventKind> for EventMask {
    type Output = Self;

    fn bitor(self, rhs: EventKind) -> Self {
        Self(self.0 | rhs.bit())
    }
}

impl BitOr for EventMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        let link = LinkId::generate();
        assert_eq!(LinkEvent::Connected.kind(), EventKind::Connected);
        assert_eq!(
            LinkEvent::ConnectedStateChanged(false).kind(),
            EventKind::ConnectedStateChanged
        );
        assert_eq!(
            LinkEvent::BytesReceived {
                link,
                data: b"x".to_vec()
            }
            .kind(),
            EventKind::BytesReceived
        );
    }

    #[test]
    fn test_kind_bits_are_distinct() {
        let kinds = [
            EventKind::Connected,
            EventKind::Disconnected,
            EventKind::ConnectedStateChanged,
            EventKind::NameChanged,
            EventKind::BytesReceived,
            EventKind::CommunicationError,
        ];
        let combined = kinds.iter().fold(0u8, |acc, k| {
            assert_eq!(acc & k.bit(), 0, "{k} overlaps");
            acc | k.bit()
        });
        assert_eq!(combined.count_ones(), 6);
    }

    #[test]
    fn test_mask_of_events() {
        let events = [
            LinkEvent::Disconnected,
            LinkEvent::ConnectedStateChanged(false),
        ];
        let mask = EventMask::of(&events);

        assert!(mask.contains(EventKind::Disconnected));
        assert!(mask.contains(EventKind::ConnectedStateChanged));
        assert!(!mask.contains(EventKind::Connected));
        assert_eq!(mask, EventKind::Disconnected | EventKind::ConnectedStateChanged);
    }

    #[test]
    fn test_empty_mask() {
        assert!(EventMask::of(&[]).is_empty());
        assert_eq!(EventMask::default(), EventMask::EMPTY);
        assert!(!EventMask::from(EventKind::NameChanged).is_empty());
    }
}
