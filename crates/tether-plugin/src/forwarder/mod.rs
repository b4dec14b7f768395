//! Forwarding of plugin diagnostic output.
//!
//! A plugin's standard error is a stream of free-text log lines. The
//! forwarder relays each line to a [`StderrSink`] as soon as it is buffered,
//! polling on a fixed interval. Forwarding is best-effort: it never reports
//! failures to the session that owns the plugin.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::info;

use crate::buffer::{LineBuffer, ReadAttempt};
use crate::error::ClientError;
use crate::handshake::ExitProbe;

/// Tracing target for forwarded plugin stderr lines.
pub const STDERR_TARGET: &str = "tether_plugin::stderr";

/// Receives diagnostic lines written by a plugin.
///
/// # Example
///
/// ```
/// use std::sync::Mutex;
/// use tether_plugin::StderrSink;
///
/// #[derive(Default)]
/// struct Collect(Mutex<Vec<String>>);
///
/// impl StderrSink for Collect {
///     fn forward(&self, pid: u32, line: &str) {
///         if let Ok(mut lines) = self.0.lock() {
///             lines.push(format!("{pid}: {line}"));
///         }
///     }
/// }
/// ```
pub trait StderrSink: Send + Sync {
    /// Handles one line, already stripped of trailing whitespace.
    fn forward(&self, pid: u32, line: &str);
}

/// Default sink emitting each line as a `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl StderrSink for TracingSink {
    fn forward(&self, pid: u32, line: &str) {
        info!(target: STDERR_TARGET, pid, "{line}");
    }
}

/// Starts the forwarder thread for one plugin.
///
/// # Errors
///
/// Returns [`ClientError::Thread`] when the thread cannot be spawned.
pub fn spawn<P>(
    stderr: LineBuffer,
    probe: P,
    sink: Arc<dyn StderrSink>,
    pid: u32,
    poll_interval: Duration,
) -> Result<JoinHandle<()>, ClientError>
where
    P: ExitProbe + Send + 'static,
{
    thread::Builder::new()
        .name("plugin-stderr-forwarder".to_owned())
        .spawn(move || forward_until_exit(stderr, &probe, sink.as_ref(), pid, poll_interval))
        .map_err(|source| ClientError::Thread {
            name: "plugin-stderr-forwarder",
            source: Arc::new(source),
        })
}

/// Relays lines until the plugin has exited and the buffer is drained.
///
/// The exit flag is sampled before each drain pass, so the pass following
/// the observation of exit still empties the buffer.
pub fn forward_until_exit(
    mut stderr: LineBuffer,
    probe: &impl ExitProbe,
    sink: &dyn StderrSink,
    pid: u32,
    poll_interval: Duration,
) {
    loop {
        let done = probe.exited();
        let closed = drain(&mut stderr, sink, pid);
        if done || closed {
            return;
        }
        thread::sleep(poll_interval);
    }
}

/// Forwards every line currently buffered. Returns `true` once the stream
/// has ended.
fn drain(stderr: &mut LineBuffer, sink: &dyn StderrSink, pid: u32) -> bool {
    loop {
        match stderr.try_read_line() {
            ReadAttempt::Line(line) | ReadAttempt::Partial(line) => {
                let text = line.trim_end();
                if !text.is_empty() {
                    sink.forward(pid, text);
                }
            }
            ReadAttempt::Pending => return false,
            ReadAttempt::Closed => return true,
        }
    }
}
