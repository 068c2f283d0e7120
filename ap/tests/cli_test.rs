//! Binary tests for the `ap` command

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

/// `ap` isolated from the user's config, log directory and API key
fn ap(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ap").unwrap();
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("XDG_DATA_HOME", home.path().join("data"))
        .env_remove("ANTHROPIC_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_graph_prints_json() {
    let home = TempDir::new().unwrap();
    let output = ap(&home).arg("graph").assert().success().get_output().stdout.clone();

    let graph: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(graph["stages"][0]["worker"], "researcher");
    assert_eq!(graph["approval_threshold"], 0.6);
}

#[test]
fn test_run_mock_json() {
    let home = TempDir::new().unwrap();
    let output = ap(&home)
        .args(["run", "What is machine learning?", "--mock"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let record: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(record["status"], "complete");
    assert_eq!(record["iteration_count"], 0);
    assert_eq!(record["approval"], "approved");
}

#[test]
fn test_run_text_summary() {
    let home = TempDir::new().unwrap();
    ap(&home)
        .args(["run", "AI safety", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Status:").and(predicate::str::contains("complete")));
}

#[test]
fn test_run_invalid_threshold_fails() {
    let home = TempDir::new().unwrap();
    ap(&home)
        .args(["run", "q", "--threshold", "1.5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid pipeline configuration"));
}

#[test]
fn test_run_blank_query_exits_nonzero() {
    let home = TempDir::new().unwrap();
    ap(&home)
        .args(["run", " "])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"status\": \"failed\""))
        .stderr(predicate::str::contains("Query is empty"));
}

#[test]
fn test_config_file_sets_policy() {
    let home = TempDir::new().unwrap();
    let config_path = home.path().join("custom.yml");
    fs::write(&config_path, "pipeline:\n  max-iterations: 7\n  approval-threshold: 0.25\n").unwrap();

    let output = ap(&home)
        .arg("graph")
        .arg("--config")
        .arg(&config_path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let graph: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(graph["max_iterations"], 7);
    assert_eq!(graph["approval_threshold"], 0.25);
}

#[test]
fn test_demo_runs_both_queries() {
    let home = TempDir::new().unwrap();
    ap(&home)
        .arg("demo")
        .assert()
        .success()
        .stdout(predicate::str::contains("AI safety").and(predicate::str::contains("quantum computing")));
}
