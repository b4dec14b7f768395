//! Crate-level behaviour tests and shared test support.

use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::forwarder::StderrSink;
use crate::handshake::ExitProbe;


/// Generous bound for waits on real child processes.
pub(crate) const PATIENCE: Duration = Duration::from_secs(10);

/// Builds a `sh -c <script>` command.
pub(crate) fn shell(script: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(script);
    command
}

/// Polls `condition` until it holds, panicking after [`PATIENCE`].
pub(crate) fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + PATIENCE;
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(5));
    }
}

/// Sink recording every forwarded stderr line.
#[derive(Default)]
pub(crate) struct RecordingSink {
    lines: Mutex<Vec<(u32, String)>>,
}

impl RecordingSink {
    pub(crate) fn lines(&self) -> Vec<String> {
        self.records().into_iter().map(|(_, line)| line).collect()
    }

    pub(crate) fn records(&self) -> Vec<(u32, String)> {
        self.lines.lock().expect("sink lock poisoned").clone()
    }
}

impl StderrSink for RecordingSink {
    fn forward(&self, pid: u32, line: &str) {
        self.lines
            .lock()
            .expect("sink lock poisoned")
            .push((pid, line.to_owned()));
    }
}

/// A settable exit flag standing in for a live process.
impl ExitProbe for Arc<AtomicBool> {
    fn exited(&self) -> bool {
        self.load(Ordering::Acquire)
    }
}
