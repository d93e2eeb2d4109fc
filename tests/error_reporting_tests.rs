use assert_cmd::Command;
use predicates::str;
use std::fs;
use tempfile::TempDir;

fn write_log(temp_dir: &TempDir, lines: &[serde_json::Value]) {
    let content: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    fs::write(temp_dir.path().join("error.log"), content.join("\n") + "\n").unwrap();
}

fn entry(operation: &str, message: &str, timestamp: &str) -> serde_json::Value {
    serde_json::json!({
        "operation": operation,
        "generation_id": "gen-1",
        "timestamp": timestamp,
        "error_type": "api_error",
        "error_message": message,
        "request_url": "http://localhost:3000/api/generations/gen-1",
        "status_code": 500,
        "response_body": null
    })
}

#[test]
fn test_error_commands_with_no_errors() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let mut cmd = Command::cargo_bin("imagelingo").unwrap();
    cmd.arg("--data-path")
        .arg(temp_dir.path())
        .arg("errors")
        .arg("list");

    cmd.assert()
        .success()
        .stdout(str::contains("No errors found."));
}

#[test]
fn test_error_clear_with_no_log() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let mut cmd = Command::cargo_bin("imagelingo").unwrap();
    cmd.arg("--data-path")
        .arg(temp_dir.path())
        .arg("errors")
        .arg("clear");

    cmd.assert()
        .success()
        .stdout(str::contains("No error log file found."));
}

#[test]
fn test_error_help() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let mut cmd = Command::cargo_bin("imagelingo").unwrap();
    cmd.arg("--data-path").arg(temp_dir.path()).arg("errors");

    cmd.assert()
        .success()
        .stdout(str::contains("Available error commands:"))
        .stdout(str::contains("list"))
        .stdout(str::contains("clear"));
}

#[test]
fn test_error_list_help() {
    let mut cmd = Command::cargo_bin("imagelingo").unwrap();
    cmd.arg("errors").arg("list").arg("--help");

    cmd.assert()
        .success()
        .stdout(str::contains("Show recent errors"))
        .stdout(str::contains("--operation"))
        .stdout(str::contains("--limit"));
}

#[test]
fn test_error_list_newest_first_with_filter() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    write_log(
        &temp_dir,
        &[
            entry("fetch_generation_status", "HTTP 500 first", "2026-01-01T00:00:00Z"),
            entry("subscribe_events", "stream dropped", "2026-01-01T00:00:01Z"),
            entry("fetch_generation_status", "HTTP 500 second", "2026-01-01T00:00:02Z"),
        ],
    );

    let mut cmd = Command::cargo_bin("imagelingo").unwrap();
    cmd.arg("--data-path")
        .arg(temp_dir.path())
        .args(["errors", "list", "--operation", "fetch_generation_status", "--limit", "1"]);

    cmd.assert()
        .success()
        .stdout(str::contains("Recent errors (1):"))
        .stdout(str::contains("HTTP 500 second"))
        .stdout(str::contains("generation: gen-1"))
        .stdout(str::contains("(500)"));
}

#[test]
fn test_error_clear_removes_log() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    write_log(
        &temp_dir,
        &[entry("fetch_generation_status", "boom", "2026-01-01T00:00:00Z")],
    );

    let mut cmd = Command::cargo_bin("imagelingo").unwrap();
    cmd.arg("--data-path")
        .arg(temp_dir.path())
        .arg("errors")
        .arg("clear");
    cmd.assert().success().stdout(str::contains("Error log cleared."));

    assert!(!temp_dir.path().join("error.log").exists());
}
