//! Argument parsing, help and version output.

use predicates::prelude::*;
use tempfile::TempDir;

use crate::burrow;

#[test]
fn test_cli_no_args_shows_help() {
    let dir = TempDir::new().expect("tempdir");
    // clap with arg_required_else_help prints help on stderr and exits 2
    burrow(&dir).assert().code(2).stderr(predicate::str::contains(
        "Expose local services through a supervised tunnel agent",
    ));
}

#[test]
fn test_cli_help_lists_commands() {
    let dir = TempDir::new().expect("tempdir");
    burrow(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("provision"))
        .stdout(predicate::str::contains("routes"));
}

#[test]
fn test_version_command_shows_version() {
    let dir = TempDir::new().expect("tempdir");
    burrow(&dir)
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "burrow {}",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn test_no_color_accepts_conventional_values() {
    let dir = TempDir::new().expect("tempdir");
    for value in ["1", "true", "yes", "0", ""] {
        burrow(&dir)
            .env("NO_COLOR", value)
            .arg("version")
            .assert()
            .success()
            .stdout(predicate::str::contains("burrow "));
    }
}

#[test]
fn test_no_color_flag_combines_with_env() {
    let dir = TempDir::new().expect("tempdir");
    burrow(&dir)
        .env("NO_COLOR", "1")
        .args(["--no-color", "version"])
        .assert()
        .success();
}

#[test]
fn test_version_command_json_outputs_valid_json() {
    let dir = TempDir::new().expect("tempdir");
    let output = burrow(&dir)
        .args(["version", "--json"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn test_unknown_command_fails() {
    let dir = TempDir::new().expect("tempdir");
    burrow(&dir)
        .arg("teleport")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_run_offline_without_token_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    burrow(&dir)
        .args(["run", "--offline"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--offline requires --token"));
}

#[test]
fn test_errors_are_json_in_json_mode() {
    let dir = TempDir::new().expect("tempdir");
    let output = burrow(&dir)
        .args(["run", "--offline", "--json"])
        .output()
        .expect("run");
    assert!(!output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(value["error"], true);
    assert!(
        value["message"]
            .as_str()
            .is_some_and(|m| m.contains("--offline requires --token"))
    );
}

#[test]
fn test_status_without_running_tunnel_exits_one() {
    let dir = TempDir::new().expect("tempdir");
    // Port 9 (discard) has no status server listening.
    burrow(&dir)
        .args(["config", "set", "web_server_port", "9"])
        .assert()
        .success();
    burrow(&dir)
        .arg("status")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("is not running"));
}

#[test]
fn test_token_failure_names_the_backend() {
    let dir = TempDir::new().expect("tempdir");
    burrow(&dir)
        .args(["config", "set", "backend_url", "http://127.0.0.1:9/"])
        .assert()
        .success();
    burrow(&dir)
        .arg("token")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "failed to get token from http://127.0.0.1:9",
        ));
}
