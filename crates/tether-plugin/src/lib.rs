//! Launch and handshake for out-of-process plugins.
//!
//! The `tether-plugin` crate starts an external plugin executable, learns the
//! network address the plugin listens on, and supervises the process for the
//! rest of the host/plugin relationship. The handshake is deliberately
//! minimal: the host advertises a permitted port range through two
//! environment variables, and the plugin answers with one newline-terminated
//! address line on standard output. Whatever protocol is spoken on that
//! address afterwards is outside this crate.
//!
//! # Architecture
//!
//! Four cooperating pieces share one exit flag and one child process:
//!
//! - [`Supervisor`] spawns the child and owns termination ([`Supervisor::kill`]).
//! - The exit watcher thread blocks on the child, reaps it, and publishes
//!   the exit once all output is buffered.
//! - The stderr forwarder relays diagnostic lines to a [`StderrSink`].
//! - [`handshake::negotiate`] polls standard output for the address while
//!   racing a deadline and the plugin's exit.
//!
//! [`PluginClient`] is the aggregate callers hold. Every failed launch leaves
//! the plugin killed; a successful one leaves it running until the caller
//! kills or drops the client.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::process::Command;
//! use std::time::Duration;
//! use tether_plugin::{HandshakeConfig, PluginClient};
//!
//! # fn main() -> Result<(), tether_plugin::ClientError> {
//! let config = HandshakeConfig::default().with_timeout(Duration::from_secs(10));
//! let mut client = PluginClient::new(Command::new("/usr/libexec/my-plugin"))
//!     .with_config(config);
//!
//! let address = client.start()?;
//! assert_eq!(client.address(), Some(address.as_str()));
//! client.kill();
//! # Ok(()) }
//! ```

pub mod buffer;
pub mod client;
pub mod config;
pub mod error;
pub mod forwarder;
pub mod handshake;
pub mod supervisor;

#[cfg(test)]
mod tests;

pub use self::client::{ClientState, PluginClient};
pub use self::config::{HandshakeConfig, PortRange};
pub use self::error::ClientError;
pub use self::forwarder::{StderrSink, TracingSink};
pub use self::supervisor::Supervisor;
