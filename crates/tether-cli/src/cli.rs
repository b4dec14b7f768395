//! Command-line interface for the plugin launcher.

use std::ffi::OsString;
use std::time::Duration;

use clap::Parser;
use tether_plugin::HandshakeConfig;
use tether_plugin::config::{DEFAULT_MAX_PORT, DEFAULT_MIN_PORT, DEFAULT_POLL_INTERVAL_MS};

use crate::logging::{DEFAULT_LOG_FILTER, LogFormat};

/// Default handshake window in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Launches a plugin, prints the address it announces, and supervises it.
#[derive(Parser, Debug)]
#[command(name = "tether", version)]
pub(crate) struct Cli {
    /// Lowest port the plugin may listen on.
    #[arg(long, env = "TETHER_MIN_PORT", default_value_t = DEFAULT_MIN_PORT)]
    pub(crate) min_port: u16,
    /// Highest port the plugin may listen on.
    #[arg(long, env = "TETHER_MAX_PORT", default_value_t = DEFAULT_MAX_PORT)]
    pub(crate) max_port: u16,
    /// Seconds to wait for the plugin to announce its address.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub(crate) timeout_secs: u64,
    /// Milliseconds between checks of the plugin's output.
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    pub(crate) poll_interval_ms: u64,
    /// Tracing filter expression for diagnostic output.
    #[arg(long, env = "TETHER_LOG_FILTER", default_value = DEFAULT_LOG_FILTER)]
    pub(crate) log_filter: String,
    /// Diagnostic output format (`json` or `compact`).
    #[arg(long, env = "TETHER_LOG_FORMAT", default_value_t = LogFormat::Compact)]
    pub(crate) log_format: LogFormat,
    /// Keep supervising the plugin until it exits instead of killing it.
    #[arg(long)]
    pub(crate) hold: bool,
    /// Plugin executable.
    #[arg(value_name = "PROGRAM", required = true)]
    pub(crate) program: OsString,
    /// Arguments passed to the plugin.
    #[arg(
        value_name = "ARG",
        num_args = 0..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub(crate) arguments: Vec<OsString>,
}

impl Cli {
    /// Builds the handshake configuration selected on the command line.
    pub(crate) fn handshake_config(&self) -> HandshakeConfig {
        HandshakeConfig::default()
            .with_port_range(self.min_port, self.max_port)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
    }
}
