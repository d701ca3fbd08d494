//! Integration tests for the reqtime binary
#![allow(deprecated)] // suppress assert_cmd::Command::cargo_bin deprecation in tests

use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

const ITEMS: &str = r#"
[request]
method = "GET"
url = "/items/42"

[[steps]]
action = "record"
name = "db"

[[steps]]
action = "sleep"
ms = 5

[[steps]]
action = "stop"
name = "db"

[response]
op = "json"
body = { id = 42 }
"#;

fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_json_output_has_session_fields() {
    let scenario = write_temp(ITEMS);
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("reqtime");
    cmd.arg(scenario.path());

    let output = cmd.output().unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["method"], "GET");
    assert_eq!(json["url"], "/items/42");
    assert_eq!(json["state"], "closed");
    assert!(json["events"]["db"]["elapsed_ms"].as_f64().unwrap() >= 5.0);
    assert!(json["total_elapsed_ms"].as_f64().unwrap() >= 5.0);
}

#[test]
fn test_verbose_logs_stopped_events() {
    let scenario = write_temp(ITEMS);
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("reqtime");
    cmd.arg("--verbose").arg(scenario.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("db: ("))
        .stderr(predicate::str::contains("ms)"));
}

#[test]
fn test_quiet_run_has_no_event_lines() {
    let scenario = write_temp(ITEMS);
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("reqtime");
    cmd.arg(scenario.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("db: (").not());
}

#[test]
fn test_rust_log_can_silence_event_lines() {
    let scenario = write_temp(ITEMS);
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("reqtime");
    cmd.env("RUST_LOG", "warn").arg("--verbose").arg(scenario.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("db: (").not());
}

#[test]
fn test_misuse_is_reported_not_fatal() {
    let scenario = write_temp(
        r#"
[request]
url = "/"

[[steps]]
action = "stop"
name = "ghost"

[response]
op = "send_status"
status = 204
"#,
    );
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("reqtime");
    cmd.arg(scenario.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("ghost has NOT been created"));
}

#[test]
fn test_server_timing_format() {
    let scenario = write_temp(ITEMS);
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("reqtime");
    cmd.arg("--format").arg("server-timing").arg(scenario.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("db;dur="))
        .stdout(predicate::str::contains("total;dur="));
}

#[test]
fn test_text_format() {
    let scenario = write_temp(ITEMS);
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("reqtime");
    cmd.arg("--format").arg("text").arg(scenario.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("GET /items/42"))
        .stdout(predicate::str::contains("total"));
}

#[test]
fn test_config_file_enables_verbose() {
    let scenario = write_temp(ITEMS);
    let config = write_temp("verbose = true\n");
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("reqtime");
    cmd.arg("--config").arg(config.path()).arg(scenario.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("db: ("));
}

#[test]
fn test_env_override_enables_verbose() {
    let scenario = write_temp(ITEMS);
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("reqtime");
    cmd.env("REQTIME_VERBOSE", "true").arg(scenario.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("db: ("));
}

#[test]
fn test_invalid_env_value_fails() {
    let scenario = write_temp(ITEMS);
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("reqtime");
    cmd.env("REQTIME_VERBOSE", "sometimes").arg(scenario.path());

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("REQTIME_VERBOSE"));
}

#[test]
fn test_missing_scenario_fails() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("reqtime");
    cmd.arg("/nonexistent/scenario.toml");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read scenario file"));
}

#[test]
fn test_invalid_scenario_fails() {
    let scenario = write_temp("[request]\n");
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("reqtime");
    cmd.arg(scenario.path());

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid scenario"));
}
