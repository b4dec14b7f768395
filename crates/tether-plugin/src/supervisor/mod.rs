//! Plugin process supervision.
//!
//! [`Supervisor`] is a cheap, cloneable handle onto one spawned child. It
//! exposes the shared exit flag and forced termination; the child itself is
//! owned by the exit watcher thread, which blocks until the process ends,
//! reaps it, waits for both output pumps to finish, and only then publishes
//! the exit. Observers that see [`Supervisor::exited`] return `true` can
//! therefore rely on every byte the child wrote being buffered already,
//! unless a grandchild kept the pipes open past [`PUMP_DRAIN_GRACE`].

use std::ffi::OsStr;
use std::io;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::mpsc::{self, SendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::{debug, warn};

use crate::buffer::LineBuffer;
use crate::error::ClientError;

const SUPERVISOR_TARGET: &str = "tether_plugin::supervisor";

/// Longest time the exit watcher waits for output pumps after reaping.
pub const PUMP_DRAIN_GRACE: Duration = Duration::from_secs(2);

const PUMP_POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug)]
struct ProcessShared {
    pid: Pid,
    program: String,
    reaped: AtomicBool,
    exited: AtomicBool,
    killed: AtomicBool,
}

/// Handle onto a spawned plugin process.
#[derive(Debug, Clone)]
pub struct Supervisor {
    shared: Arc<ProcessShared>,
}

/// A freshly spawned plugin and the buffers over its output streams.
#[derive(Debug)]
pub struct Launch {
    /// Handle used to observe and terminate the process.
    pub supervisor: Supervisor,
    /// Buffered standard output, carrying the handshake line.
    pub stdout: LineBuffer,
    /// Buffered standard error, carrying diagnostic lines.
    pub stderr: LineBuffer,
}

impl Supervisor {
    /// Spawns `command` with `extra_env` appended to its environment.
    ///
    /// Standard input is closed; standard output and standard error are
    /// captured into [`LineBuffer`]s. The exit watcher is running when this
    /// returns.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Spawn`] when the executable cannot be launched
    /// and [`ClientError::Thread`] when a supervision thread cannot be
    /// started. In the latter case the child has already been killed.
    pub fn spawn<K, V>(
        command: &mut Command,
        extra_env: &[(K, V)],
    ) -> Result<Launch, ClientError>
    where
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        let program = command.get_program().to_string_lossy().into_owned();
        for (key, value) in extra_env {
            command.env(key, value);
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(
            target: SUPERVISOR_TARGET,
            program = %program,
            args = ?command.get_args().collect::<Vec<_>>(),
            "spawning plugin process"
        );

        let mut child = command.spawn().map_err(|source| ClientError::Spawn {
            program: program.clone(),
            source: Arc::new(source),
        })?;

        match Self::supervise(&mut child, &program) {
            Ok((launch, pumps)) => {
                launch.supervisor.start_exit_watcher(child, pumps)?;
                Ok(launch)
            }
            Err(error) => {
                discard(&mut child);
                Err(error)
            }
        }
    }

    fn supervise(
        child: &mut Child,
        program: &str,
    ) -> Result<(Launch, [JoinHandle<()>; 2]), ClientError> {
        let pid = i32::try_from(child.id()).map_err(|_| ClientError::Spawn {
            program: program.to_owned(),
            source: Arc::new(io::Error::other("process id out of range")),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| ClientError::Spawn {
            program: program.to_owned(),
            source: Arc::new(io::Error::other("failed to capture stdout")),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| ClientError::Spawn {
            program: program.to_owned(),
            source: Arc::new(io::Error::other("failed to capture stderr")),
        })?;

        let (stdout, stdout_pump) = LineBuffer::spawn(stdout, "plugin-stdout")?;
        let (stderr, stderr_pump) = LineBuffer::spawn(stderr, "plugin-stderr")?;

        debug!(
            target: SUPERVISOR_TARGET,
            program = %program,
            pid,
            "plugin process spawned"
        );

        let supervisor = Self {
            shared: Arc::new(ProcessShared {
                pid: Pid::from_raw(pid),
                program: program.to_owned(),
                reaped: AtomicBool::new(false),
                exited: AtomicBool::new(false),
                killed: AtomicBool::new(false),
            }),
        };
        let launch = Launch {
            supervisor,
            stdout,
            stderr,
        };
        Ok((launch, [stdout_pump, stderr_pump]))
    }

    /// Hands the child to a thread that waits for it to terminate.
    ///
    /// The child is sent only once the thread is running, so a failed spawn
    /// leaves it here to be killed and reaped.
    fn start_exit_watcher(
        &self,
        mut child: Child,
        pumps: [JoinHandle<()>; 2],
    ) -> Result<(), ClientError> {
        let watcher = self.clone();
        let (handoff, arrival) = mpsc::channel::<Child>();
        let spawned = thread::Builder::new()
            .name("plugin-exit-watcher".to_owned())
            .spawn(move || {
                if let Ok(child) = arrival.recv() {
                    watcher.watch_exit(child, pumps);
                }
            });
        let source = match spawned {
            Ok(_) => match handoff.send(child) {
                Ok(()) => return Ok(()),
                Err(SendError(returned)) => {
                    child = returned;
                    io::Error::other("exit watcher stopped before taking the child")
                }
            },
            Err(source) => source,
        };
        discard(&mut child);
        self.shared.reaped.store(true, Ordering::Release);
        self.shared.exited.store(true, Ordering::Release);
        Err(ClientError::Thread {
            name: "plugin-exit-watcher",
            source: Arc::new(source),
        })
    }

    fn watch_exit(&self, mut child: Child, pumps: [JoinHandle<()>; 2]) {
        let status = child.wait();
        self.shared.reaped.store(true, Ordering::Release);
        match status {
            Ok(status) => debug!(
                target: SUPERVISOR_TARGET,
                program = %self.shared.program,
                pid = self.shared.pid.as_raw(),
                ?status,
                "plugin process exited"
            ),
            Err(error) => warn!(
                target: SUPERVISOR_TARGET,
                program = %self.shared.program,
                pid = self.shared.pid.as_raw(),
                error = %error,
                "failed to wait for plugin process"
            ),
        }

        self.await_pumps(pumps);
        self.shared.exited.store(true, Ordering::Release);
    }

    /// Waits for both output pumps to reach end-of-stream.
    ///
    /// A grandchild that inherited the pipes can hold them open after the
    /// plugin itself is gone; pumps still running after [`PUMP_DRAIN_GRACE`]
    /// are left detached.
    fn await_pumps(&self, pumps: [JoinHandle<()>; 2]) {
        let deadline = Instant::now() + PUMP_DRAIN_GRACE;
        while pumps.iter().any(|pump| !pump.is_finished()) && Instant::now() < deadline {
            thread::sleep(PUMP_POLL_INTERVAL);
        }
        for pump in pumps {
            if !pump.is_finished() {
                warn!(
                    target: SUPERVISOR_TARGET,
                    pid = self.shared.pid.as_raw(),
                    "output stream still open after plugin exit, detaching pump"
                );
            } else if pump.join().is_err() {
                warn!(
                    target: SUPERVISOR_TARGET,
                    pid = self.shared.pid.as_raw(),
                    "output pump thread panicked"
                );
            }
        }
    }

    /// Returns `true` once the process has terminated and its output has
    /// been fully buffered. Never reverts to `false`.
    #[must_use]
    pub fn exited(&self) -> bool {
        self.shared.exited.load(Ordering::Acquire)
    }

    /// Returns `true` once [`Supervisor::kill`] has delivered a signal.
    #[must_use]
    pub fn killed(&self) -> bool {
        self.shared.killed.load(Ordering::Acquire)
    }

    /// Operating-system process identifier.
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.shared.pid.as_raw().unsigned_abs()
    }

    /// Program the process was launched from.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.shared.program
    }

    /// Forcibly terminates the process.
    ///
    /// Safe to call repeatedly, concurrently, and after the process has
    /// exited; failures are logged and otherwise ignored.
    pub fn kill(&self) {
        if self.shared.reaped.load(Ordering::Acquire) {
            debug!(
                target: SUPERVISOR_TARGET,
                pid = self.shared.pid.as_raw(),
                "plugin already exited, skipping kill"
            );
            return;
        }
        match signal::kill(self.shared.pid, Signal::SIGKILL) {
            Ok(()) => {
                self.shared.killed.store(true, Ordering::Release);
                debug!(
                    target: SUPERVISOR_TARGET,
                    pid = self.shared.pid.as_raw(),
                    "sent SIGKILL to plugin process"
                );
            }
            Err(Errno::ESRCH) => debug!(
                target: SUPERVISOR_TARGET,
                pid = self.shared.pid.as_raw(),
                "plugin process already gone"
            ),
            Err(error) => debug!(
                target: SUPERVISOR_TARGET,
                pid = self.shared.pid.as_raw(),
                error = %error,
                "failed to signal plugin process"
            ),
        }
    }
}

/// Kills and reaps a child that will not be supervised.
fn discard(child: &mut Child) {
    drop(child.kill());
    drop(child.wait());
}

/// Kills the supervised process when dropped unless disarmed.
///
/// Held across every fallible step between spawning and a successful
/// handshake, including panics unwinding through it.
#[derive(Debug)]
pub struct KillGuard {
    supervisor: Supervisor,
    armed: bool,
}

impl KillGuard {
    /// Arms a guard over `supervisor`.
    #[must_use]
    pub const fn new(supervisor: Supervisor) -> Self {
        Self {
            supervisor,
            armed: true,
        }
    }

    /// Releases the process without killing it.
    #[must_use]
    pub fn disarm(mut self) -> Supervisor {
        self.armed = false;
        self.supervisor.clone()
    }
}

impl Drop for KillGuard {
    fn drop(&mut self) {
        if self.armed {
            self.supervisor.kill();
        }
    }
}
