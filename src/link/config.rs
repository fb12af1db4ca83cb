//! TCP link configuration.
//!
//! Host and port are runtime configuration only; nothing is persisted by the
//! link itself. A link manager may keep its links in JSON and load them with
//! [`LinkConfig::from_json`].
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use groundlink::LinkConfig;
//!
//! let config = LinkConfig::new("192.168.4.1", 5760)
//!     .with_connect_timeout(Duration::from_secs(2))
//!     .with_read_buffer_size(8192);
//!
//! assert_eq!(config.name(), "192.168.4.1:5760");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::identity::LinkIdentity;

// ============================================================================
// Constants
// ============================================================================

/// Default host address.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default port, the conventional MAVLink TCP port.
pub const DEFAULT_PORT: u16 = 5760;

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default size of one read from the socket.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

// ============================================================================
// LinkConfig
// ============================================================================

/// Configuration of one TCP link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Host address to connect to.
    pub host: String,

    /// Port to connect to.
    pub port: u16,

    /// Upper bound on one connect attempt.
    #[serde(rename = "connect_timeout_ms", with = "duration_ms")]
    pub connect_timeout: Duration,

    /// Maximum bytes delivered in one `BytesReceived` event.
    pub read_buffer_size: usize,

    /// Disable Nagle's algorithm on the socket.
    pub nodelay: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            nodelay: true,
        }
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl LinkConfig {
    /// Creates a configuration for `host:port` with default tuning.
    #[inline]
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Parses a configuration from JSON. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the input is not valid JSON for this type
    /// - [`Error::Config`] if the parsed values are invalid
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl LinkConfig {
    /// Sets the host address.
    #[inline]
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port.
    #[inline]
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the connect timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the read buffer size.
    #[inline]
    #[must_use]
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Enables or disables `TCP_NODELAY`.
    #[inline]
    #[must_use]
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl LinkConfig {
    /// Returns the identity this configuration targets.
    #[inline]
    #[must_use]
    pub fn identity(&self) -> LinkIdentity {
        LinkIdentity::new(self.host.clone(), self.port)
    }

    /// Returns the display name, `host:port`.
    #[inline]
    #[must_use]
    pub fn name(&self) -> String {
        self.identity().name()
    }

    /// Checks the configuration for values no link can run with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::config("host must not be empty"));
        }
        if self.host.chars().any(char::is_control) {
            return Err(Error::config("host must not contain control characters"));
        }
        if self.read_buffer_size == 0 {
            return Err(Error::config("read_buffer_size must be greater than zero"));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::config("connect_timeout must be greater than zero"));
        }
        Ok(())
    }
}

// ============================================================================
// Serde Helpers
// ============================================================================

/// Serializes a [`Duration`] as whole milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(
        duration: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LinkConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 5760);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.read_buffer_size, 4096);
        assert!(config.nodelay);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = LinkConfig::default()
            .with_host("10.0.0.2")
            .with_port(14550)
            .with_connect_timeout(Duration::from_millis(250))
            .with_read_buffer_size(512)
            .with_nodelay(false);

        assert_eq!(config.name(), "10.0.0.2:14550");
        assert_eq!(config.connect_timeout, Duration::from_millis(250));
        assert_eq!(config.read_buffer_size, 512);
        assert!(!config.nodelay);
    }

    #[test]
    fn test_validate_rejects_empty_host() {
        let err = LinkConfig::new("  ", 5760).validate().unwrap_err();
        assert!(err.to_string().contains("host"));
    }

    #[test]
    fn test_validate_rejects_control_characters() {
        for host in ["local\0host", "10.0.0.1\n", "\t"] {
            let err = LinkConfig::new(host, 5760).validate().unwrap_err();
            assert!(matches!(err, Error::Config { .. }), "{host:?} accepted");
        }
    }

    #[test]
    fn test_validate_rejects_zero_buffer() {
        let err = LinkConfig::default()
            .with_read_buffer_size(0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let result = LinkConfig::default()
            .with_connect_timeout(Duration::ZERO)
            .validate();
        assert!(result.is_err());
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = LinkConfig::from_json(r#"{ "host": "192.168.4.1", "connect_timeout_ms": 1500 }"#)
            .expect("valid config");

        assert_eq!(config.host, "192.168.4.1");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.connect_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_from_json_rejects_invalid_values() {
        let err = LinkConfig::from_json(r#"{ "host": "" }"#).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));

        let err = LinkConfig::from_json("not json").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_json_uses_milliseconds() {
        let json = serde_json::to_value(LinkConfig::default()).unwrap();
        assert_eq!(json["connect_timeout_ms"], 5000);
        assert_eq!(json["port"], 5760);
    }
}
