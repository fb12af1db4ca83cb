//! Builder pattern for TCP link creation.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use groundlink::TcpLink;
//!
//! # fn example() -> groundlink::Result<()> {
//! let link = TcpLink::builder()
//!     .host("192.168.4.1")
//!     .port(5760)
//!     .connect_timeout(Duration::from_secs(2))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::Result;

use super::config::LinkConfig;
use super::tcp::TcpLink;

// ============================================================================
// LinkBuilder
// ============================================================================

/// Builder for configuring a [`TcpLink`].
///
/// Use [`TcpLink::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct LinkBuilder {
    config: LinkConfig,
}

// ============================================================================
// LinkBuilder Implementation
// ============================================================================

impl LinkBuilder {
    /// Creates a builder with default configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the host address.
    #[inline]
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Sets the port.
    #[inline]
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets the upper bound on one connect attempt.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Sets the maximum size of one received chunk.
    #[inline]
    #[must_use]
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    /// Enables or disables `TCP_NODELAY`.
    #[inline]
    #[must_use]
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.config.nodelay = nodelay;
        self
    }

    /// Replaces the whole configuration.
    #[inline]
    #[must_use]
    pub fn config(mut self, config: LinkConfig) -> Self {
        self.config = config;
        self
    }

    /// Validates the configuration and starts the link's worker thread.
    ///
    /// The link starts disconnected.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`](crate::Error::Config) if the configuration is invalid
    /// - [`Error::Io`](crate::Error::Io) if the worker thread or its runtime cannot be created
    pub fn build(self) -> Result<TcpLink> {
        self.config.validate()?;
        TcpLink::spawn(self.config)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_default_config() {
        let builder = LinkBuilder::new();
        assert_eq!(builder.config, LinkConfig::default());
    }

    #[test]
    fn test_setters_update_config() {
        let builder = LinkBuilder::new()
            .host("10.1.1.1")
            .port(42)
            .connect_timeout(Duration::from_millis(100))
            .read_buffer_size(64)
            .nodelay(false);

        assert_eq!(builder.config.host, "10.1.1.1");
        assert_eq!(builder.config.port, 42);
        assert_eq!(builder.config.connect_timeout, Duration::from_millis(100));
        assert_eq!(builder.config.read_buffer_size, 64);
        assert!(!builder.config.nodelay);
    }

    #[test]
    fn test_build_fails_with_empty_host() {
        let result = LinkBuilder::new().host("").build();

        let err = result.err().expect("empty host must be rejected");
        assert!(err.to_string().contains("host"));
    }

    #[test]
    fn test_build_fails_with_nul_in_host() {
        let result = LinkBuilder::new().host("127.0.0.1\0").build();
        assert!(matches!(result, Err(crate::Error::Config { .. })));
    }

    #[test]
    fn test_build_starts_disconnected() {
        let link = LinkBuilder::new().host("127.0.0.1").port(1).build().unwrap();
        assert!(!link.is_connected());
        assert_eq!(link.name(), "127.0.0.1:1");
    }

    #[test]
    fn test_builder_is_clone() {
        let builder = LinkBuilder::new().port(9000);
        let cloned = builder.clone();
        assert_eq!(builder.config, cloned.config);
    }
}
