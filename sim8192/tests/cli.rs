// The cargo_bin! macro requires build script setup that's overkill for simple tests.
#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn sim() -> Command {
    let mut cmd = Command::cargo_bin("sim8192").unwrap();
    cmd.env_remove("SIM8192_PLAYERS")
        .env_remove("SIM8192_CONFIG")
        .env_remove("SIM8192_EVENTS_OUT");
    cmd
}

#[test]
fn test_help_flag() {
    sim()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("--turns"))
        .stdout(predicate::str::contains("--events-out"));
}

#[test]
fn test_short_game_reports_standings() {
    sim()
        .args(["--turns", "2", "--players", "2", "--seed", "1"])
        .assert()
        .success()
        .stderr(predicate::str::contains("player1 | territories:"))
        .stderr(predicate::str::contains("All sessions finished"));
}

#[test]
fn test_parallel_random_sessions() {
    sim()
        .args(["--turns", "2", "--players", "3", "--sessions", "3", "--ai", "random"])
        .assert()
        .success()
        .stderr(predicate::str::contains("game-3:"));
}

#[test]
fn test_too_few_players_fails() {
    sim()
        .args(["--players", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--players"));
}

#[test]
fn test_players_from_environment() {
    sim()
        .env("SIM8192_PLAYERS", "9")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration"));
}

#[test]
fn test_unparseable_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, "{ not json").unwrap();

    sim()
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("parsing config"));
}

#[test]
fn test_out_of_range_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{"climate": {"disaster_probability": 2.0}}"#).unwrap();

    sim()
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("disaster_probability"));
}

#[test]
fn test_events_written_as_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");

    sim()
        .args(["--turns", "3", "--players", "2"])
        .arg("--events-out")
        .arg(&path)
        .assert()
        .success();

    let text = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert!(!lines.is_empty());
    for line in lines {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(value.get("type").is_some(), "untagged event: {}", line);
        assert!(value.get("visibility").is_some());
    }
}
