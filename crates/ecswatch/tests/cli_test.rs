//! Integration tests for the `ecswatch` CLI binary.
//!
//! These exercise argument parsing, help output, completions, and the
//! error paths that need no live console.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

const NO_HOME: &str = "/tmp/ecswatch-cli-test-nonexistent";

/// Build a [`Command`] for the `ecswatch` binary with env isolation.
///
/// Clears all `ECSWATCH_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn ecswatch_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("ecswatch");
    cmd.env("HOME", NO_HOME)
        .env("XDG_CONFIG_HOME", NO_HOME)
        .env("XDG_DATA_HOME", NO_HOME)
        .env_remove("ECSWATCH_PROFILE")
        .env_remove("ECSWATCH_SERVER")
        .env_remove("ECSWATCH_TOKEN")
        .env_remove("ECSWATCH_TRANSPORT")
        .env_remove("ECSWATCH_OUTPUT")
        .env_remove("ECSWATCH_INSECURE")
        .env_remove("ECSWATCH_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_usage() {
    let output = ecswatch_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "expected usage text:\n{text}");
}

#[test]
fn test_help_lists_commands() {
    ecswatch_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("watch")
            .and(predicate::str::contains("snapshot"))
            .and(predicate::str::contains("services"))
            .and(predicate::str::contains("instances"))
            .and(predicate::str::contains("interval"))
            .and(predicate::str::contains("progressive")),
    );
}

#[test]
fn test_version() {
    ecswatch_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ecswatch"));
}

#[test]
fn test_completions_bash() {
    ecswatch_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    ecswatch_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = ecswatch_cmd().arg("foobar").output().unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "expected error mentioning the subcommand:\n{text}"
    );
}

#[test]
fn test_snapshot_without_config_points_to_init() {
    ecswatch_cmd()
        .arg("snapshot")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("config init"));
}

#[test]
fn test_missing_profile_is_usage_error() {
    ecswatch_cmd()
        .args(["--profile", "missing", "snapshot"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("missing"));
}

#[test]
fn test_invalid_output_format() {
    let output = ecswatch_cmd()
        .args(["--output", "invalid", "snapshot"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("invalid") || text.contains("possible values"),
        "expected error about output formats:\n{text}"
    );
}

#[test]
fn test_invalid_transport_rejected_by_parser() {
    ecswatch_cmd()
        .args(["--transport", "carrier-pigeon", "snapshot"])
        .assert()
        .code(2);
}

#[test]
fn test_unreachable_server_fails_with_connection_or_timeout() {
    let output = ecswatch_cmd()
        .args([
            "--server",
            "http://127.0.0.1:9",
            "--transport",
            "polling",
            "--timeout",
            "1",
            "snapshot",
        ])
        .timeout(Duration::from_secs(30))
        .output()
        .unwrap();
    let code = output.status.code();
    assert!(
        matches!(code, Some(7 | 8)),
        "expected connection (7) or timeout (8), got {code:?}:\n{}",
        combined_output(&output)
    );
}

// ── Config commands ─────────────────────────────────────────────────

#[test]
fn test_config_path_prints_locations() {
    ecswatch_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_show_no_config() {
    ecswatch_cmd().args(["config", "show"]).assert().success();
}

#[test]
fn test_config_profiles_empty() {
    ecswatch_cmd().args(["config", "profiles"]).assert().success();
}

// ── Subcommand help discovery ───────────────────────────────────────

#[test]
fn test_services_subcommands_exist() {
    ecswatch_cmd()
        .args(["services", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("list")
                .and(predicate::str::contains("get"))
                .and(predicate::str::contains("refresh")),
        );
}

#[test]
fn test_config_subcommands_exist() {
    ecswatch_cmd()
        .args(["config", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("init")
                .and(predicate::str::contains("show"))
                .and(predicate::str::contains("set-secret")),
        );
}
