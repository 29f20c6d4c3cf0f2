//! CLI tests for the `aq` binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn aq() -> Command {
    Command::cargo_bin("aq").expect("binary builds")
}

fn write_config(dir: &TempDir, yaml: &str) -> std::path::PathBuf {
    let path = dir.path().join("admitq.yml");
    std::fs::write(&path, yaml).unwrap();
    path
}

#[test]
fn test_config_prints_effective_yaml() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "limiter:\n  max-requests: 7\n");

    aq().arg("--config")
        .arg(&path)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("max-requests: 7"))
        .stdout(predicate::str::contains("capacity: 100"));
}

#[test]
fn test_invalid_config_fails() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "limiter:\n  window-ms: 0\n");

    aq().arg("--config")
        .arg(&path)
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn test_probe_reports_admissions() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "limiter:\n  max-requests: 1\n  window-ms: 60000\n");

    let probe = |arrivals: &str, interval_ms: &str| {
        aq().env("NO_COLOR", "1")
            .arg("--config")
            .arg(&path)
            .args(["probe", "-n", arrivals, "-i", interval_ms])
            .assert()
            .success()
    };

    // A burst only gets the one slot
    probe("3", "0")
        .stdout(predicate::str::contains("reject"))
        .stdout(predicate::str::contains("1 of 3 admitted"));

    // Exactly one window apart the first admission still counts
    probe("2", "60000").stdout(predicate::str::contains("1 of 2 admitted"));

    // Past the window it has aged out
    probe("2", "61000").stdout(predicate::str::contains("2 of 2 admitted"));
}

#[test]
fn test_demo_runs_burst() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "limiter:\n  max-requests: 2\n  window-ms: 60000\n");

    aq().env("NO_COLOR", "1")
        .arg("--config")
        .arg(&path)
        .args(["demo", "-n", "3", "--delay-ms", "0", "--fail-every", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("admitted #1"))
        .stdout(predicate::str::contains("rejected #3"))
        .stdout(predicate::str::contains("failed #2"))
        .stdout(predicate::str::contains("admitted 2  rejected 1"));
}
