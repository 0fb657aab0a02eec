// ABOUTME: Integration tests for the harbor CLI commands.
// ABOUTME: Validates --help output, init behavior and argument errors before any engine access.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn harbor_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("harbor"));
    cmd.env_remove("COMPOSE_PROJECT_NAME").env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_shows_commands() {
    harbor_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("upgrade"))
        .stdout(predicate::str::contains("service"))
        .stdout(predicate::str::contains("gateway"));
}

#[test]
fn service_help_lists_replica_commands() {
    harbor_cmd()
        .args(["service", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("wait-for"))
        .stdout(predicate::str::contains("get-container-name"))
        .stdout(predicate::str::contains("report"));
}

#[test]
fn init_creates_config_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("harbor.yml");

    harbor_cmd()
        .current_dir(temp_dir.path())
        .args(["init", "--project", "shop"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created harbor.yml"));

    let content = fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("project: shop"));
}

#[test]
fn init_refuses_to_overwrite_existing_config() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("harbor.yml"), "project: keep\n").unwrap();

    harbor_cmd()
        .current_dir(temp_dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    let content = fs::read_to_string(temp_dir.path().join("harbor.yml")).unwrap();
    assert_eq!(content, "project: keep\n");
}

#[test]
fn init_force_overwrites() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("harbor.yml"), "project: old\n").unwrap();

    harbor_cmd()
        .arg("-C")
        .arg(temp_dir.path())
        .args(["init", "--force", "--project", "new"])
        .assert()
        .success();

    let content = fs::read_to_string(temp_dir.path().join("harbor.yml")).unwrap();
    assert!(content.contains("project: new"));
}

#[test]
fn missing_project_name_is_reported() {
    let temp_dir = tempfile::tempdir().unwrap();

    harbor_cmd()
        .current_dir(temp_dir.path())
        .arg("start")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("COMPOSE_PROJECT_NAME is not set"));
}

#[test]
fn json_mode_reports_errors_as_events() {
    let temp_dir = tempfile::tempdir().unwrap();

    harbor_cmd()
        .current_dir(temp_dir.path())
        .args(["--json", "list"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("\"event\":\"error\""));
}

#[test]
fn unknown_strategy_is_rejected() {
    harbor_cmd()
        .args(["start", "--strategy", "bluegreen"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("bluegreen"));
}

#[test]
fn quiet_and_json_conflict() {
    harbor_cmd()
        .args(["--quiet", "--json", "list"])
        .assert()
        .failure();
}
