//! Address handshake with a freshly launched plugin.
//!
//! The plugin announces where it listens by writing a single
//! newline-terminated line to standard output. [`negotiate`] polls for that
//! line while racing a deadline and the plugin's exit. Each iteration checks,
//! in order:
//!
//! 1. whether the deadline has passed (records a timeout);
//! 2. otherwise, whether the plugin has exited (records a premature exit);
//! 3. whether a complete line is buffered.
//!
//! A buffered line wins over a recorded failure from the same iteration, so a
//! plugin that prints its address and exits immediately still connects.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::buffer::{LineBuffer, ReadAttempt};
use crate::error::ClientError;
use crate::supervisor::Supervisor;

const HANDSHAKE_TARGET: &str = "tether_plugin::handshake";

/// Non-blocking source of output lines.
pub trait LineSource {
    /// Attempts to take the next buffered line.
    fn try_read_line(&mut self) -> ReadAttempt;
}

impl LineSource for LineBuffer {
    fn try_read_line(&mut self) -> ReadAttempt {
        Self::try_read_line(self)
    }
}

/// Non-blocking view of whether the plugin has exited.
pub trait ExitProbe {
    /// Returns `true` once the plugin has terminated.
    fn exited(&self) -> bool;
}

impl ExitProbe for Supervisor {
    fn exited(&self) -> bool {
        Self::exited(self)
    }
}

/// Polls `source` for the address line.
///
/// Returns the line with surrounding whitespace removed. The caller is
/// responsible for killing the plugin when this fails.
///
/// # Errors
///
/// Returns [`ClientError::HandshakeTimeout`] when `timeout` elapses first and
/// [`ClientError::PrematureExit`] when the plugin exits without a line.
pub fn negotiate(
    source: &mut impl LineSource,
    probe: &impl ExitProbe,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<String, ClientError> {
    let started = Instant::now();
    let deadline = started.checked_add(timeout);

    loop {
        let failure = if deadline.is_some_and(|limit| Instant::now() >= limit) {
            Some(ClientError::HandshakeTimeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })
        } else if probe.exited() {
            Some(ClientError::PrematureExit)
        } else {
            None
        };

        if let ReadAttempt::Line(line) = source.try_read_line() {
            let address = line.trim().to_owned();
            debug!(
                target: HANDSHAKE_TARGET,
                address = %address,
                elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                "plugin announced address"
            );
            return Ok(address);
        }

        if let Some(error) = failure {
            warn!(
                target: HANDSHAKE_TARGET,
                error = %error,
                elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                "plugin handshake failed"
            );
            return Err(error);
        }

        thread::sleep(poll_interval);
    }
}
