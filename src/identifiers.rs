//! Type-safe identifiers for links and event subscriptions.
//!
//! Newtype wrappers keep link identities and subscription handles from being
//! mixed up at compile time.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// LinkId
// ============================================================================

/// Stable identity of one link instance.
///
/// Unlike the link name, which follows `host:port` and changes with the
/// setters, a `LinkId` never changes for the lifetime of the link. It is the
/// identity carried by [`LinkEvent::BytesReceived`](crate::event::LinkEvent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkId(Uuid);

impl LinkId {
    /// Generates a new random link ID.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// SubscriptionId
// ============================================================================

/// Handle of one subscriber registered on an event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Creates a subscription ID from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_ids_are_unique() {
        let a = LinkId::generate();
        let b = LinkId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_link_id_display_matches_uuid() {
        let id = LinkId::generate();
        assert_eq!(id.to_string(), id.as_uuid().to_string());
    }

    #[test]
    fn test_subscription_id_display() {
        let id = SubscriptionId::new(7);
        assert_eq!(id.as_u64(), 7);
        assert_eq!(id.to_string(), "sub-7");
    }
}
