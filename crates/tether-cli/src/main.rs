//! CLI entrypoint for the `tether` plugin launcher.
//!
//! Delegates to [`tether_cli::run`]. The standard streams are passed unlocked
//! so that the stderr forwarder thread can log while the launcher waits.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    tether_cli::run(std::env::args_os(), &mut io::stdout(), &mut io::stderr())
}
