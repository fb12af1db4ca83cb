//! Link identity: target host and port, and the display name derived from them.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// LinkIdentity
// ============================================================================

/// Target endpoint of a link.
///
/// The display name is always `host:port` and is recomputed from the current
/// pair, never stored separately.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkIdentity {
    host: String,
    port: u16,
}

impl LinkIdentity {
    /// Creates an identity for `host:port`.
    #[inline]
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Returns the host address.
    #[inline]
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port.
    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the display name, `host:port`.
    #[inline]
    #[must_use]
    pub fn name(&self) -> String {
        self.to_string()
    }

    /// Replaces the host address.
    #[inline]
    pub fn set_host(&mut self, host: impl Into<String>) {
        self.host = host.into();
    }

    /// Replaces the port.
    #[inline]
    pub fn set_port(&mut self, port: u16) {
        self.port = port;
    }
}

impl fmt::Display for LinkIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ============================================================================
// Tests
// ============================================================================
