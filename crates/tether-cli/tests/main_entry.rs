//! Integration tests for the `tether` binary entry point.
//!
//! Launches small `sh` plugins and checks the printed address, exit codes,
//! and user-facing error messages.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;

#[test]
fn announced_address_is_printed() {
    let mut command = cargo_bin_cmd!("tether");
    command.args(["--", "sh", "-c", "echo 127.0.0.1:5555; exec sleep 30"]);
    command.assert().success().stdout("127.0.0.1:5555\n");
}

#[test]
fn port_range_reaches_the_plugin() {
    let mut command = cargo_bin_cmd!("tether");
    command.args([
        "--min-port",
        "21000",
        "--max-port",
        "21001",
        "--",
        "sh",
        "-c",
        "echo \"127.0.0.1:$TETHER_PLUGIN_MIN_PORT\"",
    ]);
    command.assert().success().stdout("127.0.0.1:21000\n");
}

#[test]
fn hold_waits_for_the_plugin_to_exit() {
    let mut command = cargo_bin_cmd!("tether");
    command.args([
        "--hold",
        "--",
        "sh",
        "-c",
        "echo 127.0.0.1:1; echo winding down >&2; sleep 0.2",
    ]);
    command
        .assert()
        .success()
        .stdout("127.0.0.1:1\n")
        .stderr(contains("winding down"));
}

#[test]
fn hold_relays_a_final_stderr_burst_in_full() {
    let mut command = cargo_bin_cmd!("tether");
    command.args([
        "--hold",
        "--",
        "sh",
        "-c",
        "echo 127.0.0.1:1; sleep 0.3; seq 1 20000 >&2",
    ]);
    let assert = command.assert().success().stdout("127.0.0.1:1\n");

    let stderr = String::from_utf8_lossy(&assert.get_output().stderr);
    assert_eq!(stderr.matches("tether_plugin::stderr").count(), 20_000);
}

#[test]
fn silent_exit_is_reported() {
    let mut command = cargo_bin_cmd!("tether");
    command.args(["--", "sh", "-c", "exit 0"]);
    command
        .assert()
        .failure()
        .stderr(contains("plugin exited before we could connect"));
}

#[test]
fn missing_plugin_is_reported() {
    let mut command = cargo_bin_cmd!("tether");
    command.args(["--", "/nonexistent/tether-cli-plugin"]);
    command
        .assert()
        .failure()
        .stderr(contains("failed to launch plugin"));
}

#[test]
fn inverted_port_range_is_rejected() {
    let mut command = cargo_bin_cmd!("tether");
    command.args([
        "--min-port",
        "30000",
        "--max-port",
        "20000",
        "--",
        "sh",
        "-c",
        "echo never",
    ]);
    command
        .assert()
        .failure()
        .stderr(contains("invalid plugin port range 30000-20000"));
}

#[test]
fn slow_plugin_times_out() {
    let mut command = cargo_bin_cmd!("tether");
    command.args(["--timeout-secs", "1", "--", "sh", "-c", "exec sleep 30"]);
    command
        .assert()
        .failure()
        .stderr(contains("timeout while waiting for plugin to start"));
}

#[test]
fn missing_program_is_a_usage_error() {
    let mut command = cargo_bin_cmd!("tether");
    command.assert().failure().stderr(contains("PROGRAM"));
}
