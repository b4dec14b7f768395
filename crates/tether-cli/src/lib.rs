//! Command-line launcher for `tether` plugins.
//!
//! The `tether` binary starts one plugin executable, waits for it to announce
//! its address, and writes that address to standard output. Diagnostic output
//! from both the launcher and the plugin's stderr goes to standard error
//! through `tracing`. By default the plugin is killed once the address is
//! printed; `--hold` keeps supervising it until it exits and its stderr has
//! been relayed in full.

mod cli;
pub mod logging;
pub mod telemetry;

use std::ffi::OsString;
use std::io::{self, Write};
use std::process::{Command, ExitCode};

use clap::Parser;
use thiserror::Error;
use tracing::info;

use tether_plugin::{ClientError, PluginClient};

use crate::cli::Cli;
use crate::telemetry::TelemetryError;

const CLI_TARGET: &str = "tether_cli";

/// Errors surfaced by the launcher.
#[derive(Debug, Error)]
pub enum AppError {
    /// Logging could not be configured.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    /// The plugin could not be launched or did not complete its handshake.
    #[error(transparent)]
    Launch(#[from] ClientError),
    /// Writing the address to standard output failed.
    #[error("failed to write plugin address: {0}")]
    Output(#[source] io::Error),
}

/// Runs the launcher with the provided arguments and output streams.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let _ = write!(stderr, "{error}");
            return if error.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match launch(&cli, stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let _ = writeln!(stderr, "{error}");
            ExitCode::FAILURE
        }
    }
}

fn launch<W: Write>(cli: &Cli, stdout: &mut W) -> Result<(), AppError> {
    telemetry::initialise(&cli.log_filter, cli.log_format)?;

    let mut command = Command::new(&cli.program);
    command.args(&cli.arguments);
    let mut client = PluginClient::new(command).with_config(cli.handshake_config());

    let address = client.start()?;
    writeln!(stdout, "{address}")
        .and_then(|()| stdout.flush())
        .map_err(AppError::Output)?;

    if cli.hold {
        client.wait();
        info!(target: CLI_TARGET, address = %address, "plugin exited");
    } else {
        client.kill();
    }
    Ok(())
}
