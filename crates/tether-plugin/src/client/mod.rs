//! The host-side handle on one plugin process.
//!
//! [`PluginClient`] wires a prepared [`Command`] to the supervision
//! machinery. [`PluginClient::start`] spawns the plugin, launches the exit
//! watcher and stderr forwarder, and negotiates the address. The client keeps
//! the process handle afterwards so the caller can kill the plugin at any
//! time, or [`PluginClient::wait`] for it to finish. Dropping the client
//! kills a plugin that is still running.

use std::fmt;
use std::process::Command;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{info, warn};

use crate::config::HandshakeConfig;
use crate::error::ClientError;
use crate::forwarder::{self, StderrSink, TracingSink};
use crate::handshake;
use crate::supervisor::{KillGuard, Supervisor};

const CLIENT_TARGET: &str = "tether_plugin::client";

/// Observable lifecycle of a [`PluginClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// `start` has not been called.
    Unstarted,
    /// The process is running and the handshake is in progress.
    Starting,
    /// The handshake succeeded and the address is known.
    Connected,
    /// The launch failed; the process has been killed.
    Failed,
    /// The caller killed the process and its exit is not yet observed.
    Killed,
    /// The process has terminated.
    Exited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Unstarted,
    Starting,
    Connected,
    Failed,
}

/// Launches a plugin and negotiates the address it listens on.
///
/// # Example
///
/// ```rust,no_run
/// use std::process::Command;
/// use tether_plugin::PluginClient;
///
/// # fn main() -> Result<(), tether_plugin::ClientError> {
/// let mut client = PluginClient::new(Command::new("/usr/libexec/my-plugin"));
/// let address = client.start()?;
/// println!("plugin listening on {address}");
/// client.kill();
/// # Ok(()) }
/// ```
pub struct PluginClient {
    command: Command,
    config: HandshakeConfig,
    sink: Arc<dyn StderrSink>,
    supervisor: Option<Supervisor>,
    forwarder: Option<JoinHandle<()>>,
    address: Option<String>,
    phase: Phase,
}

impl PluginClient {
    /// Creates an unstarted client using the default configuration and the
    /// [`TracingSink`].
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            command,
            config: HandshakeConfig::default(),
            sink: Arc::new(TracingSink),
            supervisor: None,
            forwarder: None,
            address: None,
            phase: Phase::Unstarted,
        }
    }

    /// Replaces the handshake configuration.
    #[must_use]
    pub fn with_config(mut self, config: HandshakeConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the destination of the plugin's stderr lines.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn StderrSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Launches the plugin and waits for it to announce its address.
    ///
    /// On success the plugin keeps running and its stderr continues to be
    /// forwarded. On failure the plugin has been killed.
    ///
    /// # Errors
    ///
    /// - [`ClientError::AlreadyStarted`] if called more than once.
    /// - [`ClientError::InvalidPortRange`] if the configuration is unusable.
    /// - [`ClientError::Spawn`] if the executable cannot be launched.
    /// - [`ClientError::HandshakeTimeout`] if no address arrives in time.
    /// - [`ClientError::PrematureExit`] if the plugin exits first.
    /// - [`ClientError::Thread`] if a supervision thread cannot be started.
    pub fn start(&mut self) -> Result<String, ClientError> {
        if self.phase != Phase::Unstarted {
            return Err(ClientError::AlreadyStarted);
        }
        self.config.validate()?;
        self.phase = Phase::Failed;

        let launch = Supervisor::spawn(&mut self.command, &self.config.port_environment())?;
        self.supervisor = Some(launch.supervisor.clone());
        self.phase = Phase::Starting;

        let guard = KillGuard::new(launch.supervisor.clone());
        let mut stdout = launch.stdout;
        let pid = launch.supervisor.pid();

        let outcome = forwarder::spawn(
            launch.stderr,
            launch.supervisor.clone(),
            Arc::clone(&self.sink),
            pid,
            self.config.poll_interval(),
        )
        .and_then(|relay| {
            self.forwarder = Some(relay);
            handshake::negotiate(
                &mut stdout,
                &launch.supervisor,
                self.config.timeout(),
                self.config.poll_interval(),
            )
        });

        match outcome {
            Ok(address) => {
                drop(guard.disarm());
                info!(
                    target: CLIENT_TARGET,
                    pid,
                    program = launch.supervisor.program(),
                    address = %address,
                    "plugin connected"
                );
                self.address = Some(address.clone());
                self.phase = Phase::Connected;
                Ok(address)
            }
            Err(error) => {
                drop(guard);
                self.phase = Phase::Failed;
                Err(error)
            }
        }
    }

    /// Returns `true` once the plugin process has terminated.
    #[must_use]
    pub fn exited(&self) -> bool {
        self.supervisor.as_ref().is_some_and(Supervisor::exited)
    }

    /// Forcibly terminates the plugin.
    ///
    /// Does nothing when the plugin was never started or has already exited,
    /// and may be called any number of times.
    pub fn kill(&self) {
        if let Some(supervisor) = &self.supervisor {
            supervisor.kill();
        }
    }

    /// Blocks until the plugin has exited and every stderr line it wrote has
    /// been handed to the sink.
    ///
    /// Returns immediately when the plugin was never spawned.
    pub fn wait(&mut self) {
        let Some(supervisor) = &self.supervisor else {
            return;
        };
        while !supervisor.exited() {
            thread::sleep(self.config.poll_interval());
        }
        let panicked = self
            .forwarder
            .take()
            .is_some_and(|forwarder| forwarder.join().is_err());
        if panicked {
            warn!(
                target: CLIENT_TARGET,
                pid = supervisor.pid(),
                "stderr forwarder panicked"
            );
        }
    }

    /// Address announced by the plugin, once the handshake has succeeded.
    #[must_use]
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// Process identifier of the plugin, once started.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.supervisor.as_ref().map(Supervisor::pid)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ClientState {
        if let Some(supervisor) = &self.supervisor {
            if supervisor.exited() {
                return ClientState::Exited;
            }
            if self.phase != Phase::Failed && supervisor.killed() {
                return ClientState::Killed;
            }
        }
        match self.phase {
            Phase::Unstarted => ClientState::Unstarted,
            Phase::Starting => ClientState::Starting,
            Phase::Connected => ClientState::Connected,
            Phase::Failed => ClientState::Failed,
        }
    }
}

impl Drop for PluginClient {
    fn drop(&mut self) {
        self.kill();
    }
}

impl fmt::Debug for PluginClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginClient")
            .field("program", &self.command.get_program())
            .field("state", &self.state())
            .field("pid", &self.pid())
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
