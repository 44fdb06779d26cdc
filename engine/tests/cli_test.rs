//! Tests for the `lancea` binary's argument handling and client commands

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn lancea(data_home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("lancea").expect("binary should build");
    cmd.env("XDG_DATA_HOME", data_home.path());
    cmd
}

fn config_with_socket(temp: &TempDir) -> std::path::PathBuf {
    let config_path = temp.path().join("lancea.yml");
    let socket_path = temp.path().join("missing.sock");
    std::fs::write(&config_path, format!("socket-path: {}\n", socket_path.display())).unwrap();
    config_path
}

#[test]
fn test_help_lists_commands() {
    let temp = TempDir::new().unwrap();
    lancea(&temp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("search"))
        .stdout(predicate::str::contains("execute"));
}

#[test]
fn test_unknown_subcommand_fails() {
    let temp = TempDir::new().unwrap();
    lancea(&temp).arg("frobnicate").assert().failure();
}

#[test]
fn test_ping_without_engine_reports_not_running() {
    let temp = TempDir::new().unwrap();
    let config = config_with_socket(&temp);
    lancea(&temp)
        .arg("--config")
        .arg(&config)
        .arg("ping")
        .assert()
        .success()
        .stdout(predicate::str::contains("not running"));
}

#[test]
fn test_search_without_engine_fails() {
    let temp = TempDir::new().unwrap();
    let config = config_with_socket(&temp);
    lancea(&temp)
        .arg("--config")
        .arg(&config)
        .args(["search", "joy"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to connect"));
}
