//! Domain errors raised while launching a plugin and negotiating its address.
//!
//! Every failure that can reach the caller of
//! [`PluginClient::start`](crate::PluginClient::start) is terminal: nothing is
//! retried internally, and by the time an error is returned the child process
//! has been killed. I/O errors are wrapped in `Arc` to satisfy the
//! `result_large_err` Clippy lint and keep the error `Send + Sync`.

use std::sync::Arc;

use thiserror::Error;

/// Errors arising from plugin launch and handshake.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The plugin process could not be created.
    #[error("failed to launch plugin '{program}': {source}")]
    Spawn {
        /// Program that was being launched.
        program: String,
        /// Underlying I/O error from the operating system.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// No address line arrived within the handshake window.
    #[error("timeout while waiting for plugin to start after {timeout_ms}ms")]
    HandshakeTimeout {
        /// Configured handshake window in milliseconds.
        timeout_ms: u64,
    },

    /// The plugin terminated before announcing an address.
    #[error("plugin exited before we could connect")]
    PrematureExit,

    /// `start` was invoked on a client that has already been started.
    #[error("plugin client has already been started")]
    AlreadyStarted,

    /// The configured port range is unusable.
    #[error("invalid plugin port range {min}-{max}")]
    InvalidPortRange {
        /// Lower bound supplied.
        min: u16,
        /// Upper bound supplied.
        max: u16,
    },

    /// A background supervision thread could not be spawned.
    #[error("failed to spawn {name} thread: {source}")]
    Thread {
        /// Name of the thread that failed to start.
        name: &'static str,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },
}

#[cfg(test)]
mod tests;
