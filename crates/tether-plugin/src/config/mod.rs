//! Handshake configuration for plugin launches.
//!
//! The plugin is told which ports it may bind through two environment
//! variables holding the lower and upper bound in ASCII decimal. The
//! remaining knobs control how long the host waits for the address line and
//! how often it polls the child's output streams.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Default lower bound of the plugin listener port range.
pub const DEFAULT_MIN_PORT: u16 = 10_000;

/// Default upper bound of the plugin listener port range.
pub const DEFAULT_MAX_PORT: u16 = 25_000;

/// Default handshake window in milliseconds.
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 60_000;

/// Default sleep between polling attempts in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

/// Default name of the environment variable carrying the lower port bound.
pub const DEFAULT_MIN_PORT_ENV: &str = "TETHER_PLUGIN_MIN_PORT";

/// Default name of the environment variable carrying the upper port bound.
pub const DEFAULT_MAX_PORT_ENV: &str = "TETHER_PLUGIN_MAX_PORT";

/// Inclusive range of ports the plugin may bind its listener to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    /// Lowest permitted port.
    pub min: u16,
    /// Highest permitted port.
    pub max: u16,
}

impl PortRange {
    /// Creates a range without validating it.
    #[must_use]
    pub const fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    /// Checks that the range is non-empty and excludes port zero.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidPortRange`] when `min` is zero or greater
    /// than `max`.
    pub const fn validate(self) -> Result<Self, ClientError> {
        if self.min == 0 || self.min > self.max {
            return Err(ClientError::InvalidPortRange {
                min: self.min,
                max: self.max,
            });
        }
        Ok(self)
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_PORT, DEFAULT_MAX_PORT)
    }
}

/// Settings governing a single plugin handshake.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tether_plugin::HandshakeConfig;
///
/// let config = HandshakeConfig::default()
///     .with_port_range(20_000, 20_100)
///     .with_timeout(Duration::from_secs(5));
///
/// assert_eq!(config.timeout(), Duration::from_secs(5));
/// assert_eq!(config.port_environment()[0].1, "20000");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeConfig {
    /// Ports the plugin may bind.
    #[serde(default)]
    pub ports: PortRange,
    /// How long to wait for the address line.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Sleep between polling attempts.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Environment variable receiving the lower port bound.
    #[serde(default = "default_min_port_env")]
    pub min_port_env: String,
    /// Environment variable receiving the upper port bound.
    #[serde(default = "default_max_port_env")]
    pub max_port_env: String,
}

const fn default_timeout_ms() -> u64 {
    DEFAULT_HANDSHAKE_TIMEOUT_MS
}

const fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_min_port_env() -> String {
    DEFAULT_MIN_PORT_ENV.to_owned()
}

fn default_max_port_env() -> String {
    DEFAULT_MAX_PORT_ENV.to_owned()
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            ports: PortRange::default(),
            timeout_ms: default_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            min_port_env: default_min_port_env(),
            max_port_env: default_max_port_env(),
        }
    }
}

impl HandshakeConfig {
    /// Sets the port range advertised to the plugin.
    #[must_use]
    pub const fn with_port_range(mut self, min: u16, max: u16) -> Self {
        self.ports = PortRange::new(min, max);
        self
    }

    /// Sets the handshake window.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the polling interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Renames the environment variables carrying the port bounds.
    #[must_use]
    pub fn with_env_names(mut self, min: impl Into<String>, max: impl Into<String>) -> Self {
        self.min_port_env = min.into();
        self.max_port_env = max.into();
        self
    }

    /// Returns the handshake window.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Returns the polling interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Checks the configuration before a launch.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidPortRange`] when the port range is
    /// unusable.
    pub fn validate(&self) -> Result<(), ClientError> {
        self.ports.validate().map(drop)
    }

    /// Environment entries appended to the plugin's environment.
    #[must_use]
    pub fn port_environment(&self) -> [(String, String); 2] {
        [
            (self.min_port_env.clone(), self.ports.min.to_string()),
            (self.max_port_env.clone(), self.ports.max.to_string()),
        ]
    }
}
