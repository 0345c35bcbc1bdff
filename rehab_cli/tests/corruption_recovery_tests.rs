//! Corruption recovery tests for the rehab binary.
//!
//! These tests verify the system can handle:
//! - Corrupted progress, plan, checkpoint and history blobs
//! - Missing data directories
//! - Stray files in the data directory

use assert_cmd::Command;
use chrono::Utc;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn cli(root: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("rehab"));
    cmd.env("XDG_CONFIG_HOME", root.join("config"))
        .arg("--data-dir")
        .arg(root.join("data"));
    cmd
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn data_dir(root: &Path) -> PathBuf {
    let dir = root.join("data");
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn today() -> String {
    Utc::now().date_naive().to_string()
}

#[test]
fn test_corrupted_progress_falls_back_to_defaults() {
    let temp_dir = setup_test_dir();
    let data = data_dir(temp_dir.path());
    fs::write(data.join("progress.json"), "{ invalid json }}}}").unwrap();

    cli(temp_dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Week 1"));

    // The next mutation replaces the corrupt blob
    cli(temp_dir.path()).arg("accept").assert().success();
    let content = fs::read_to_string(data.join("progress.json")).unwrap();
    let progress: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(progress["current_week"], 2);
}

#[test]
fn test_progress_with_wrong_shape_is_ignored() {
    let temp_dir = setup_test_dir();
    let data = data_dir(temp_dir.path());
    fs::write(data.join("progress.json"), r#"{"current_week": "three"}"#).unwrap();

    cli(temp_dir.path())
        .args(["settings", "bird_dog"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hold 7s, reps [3, 2, 1], rest 15s"));
}

#[test]
fn test_corrupted_plan_is_recreated() {
    let temp_dir = setup_test_dir();
    let data = data_dir(temp_dir.path());
    fs::write(data.join(format!("plan.{}.json", today())), "not a plan").unwrap();

    cli(temp_dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("[ ] Bird Dog"));

    let content = fs::read_to_string(data.join(format!("plan.{}.json", today()))).unwrap();
    assert!(content.contains("bird_dog"));
}

#[test]
fn test_corrupted_checkpoint_starts_fresh() {
    let temp_dir = setup_test_dir();
    let data = data_dir(temp_dir.path());
    fs::write(
        data.join(format!("session.side_plank.{}.json", today())),
        "{\"current_set\": ",
    )
    .unwrap();

    cli(temp_dir.path())
        .args(["run", "side_plank", "--continue", "--fast"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No saved progress"))
        .stdout(predicate::str::contains("completed!"));
}

#[test]
fn test_corrupted_history_day_is_skipped() {
    let temp_dir = setup_test_dir();
    let data = data_dir(temp_dir.path());
    fs::write(data.join("history.2024-01-01.json"), "[{ broken").unwrap();

    cli(temp_dir.path())
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Total records: 0"));

    cli(temp_dir.path())
        .args(["run", "daily_walk", "--fast"])
        .assert()
        .success();

    cli(temp_dir.path())
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Total records: 1"));
}

#[test]
fn test_stray_files_are_ignored() {
    let temp_dir = setup_test_dir();
    let data = data_dir(temp_dir.path());
    fs::write(data.join("notes.txt"), "hello").unwrap();
    fs::write(data.join("history.not-a-date.json"), "[]").unwrap();

    cli(temp_dir.path())
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Active days: 0"));
}

#[test]
fn test_missing_data_directory_is_created() {
    let temp_dir = setup_test_dir();
    let nested = temp_dir.path().join("deep/nested");

    Command::new(assert_cmd::cargo::cargo_bin!("rehab"))
        .env("XDG_CONFIG_HOME", temp_dir.path().join("config"))
        .arg("--data-dir")
        .arg(&nested)
        .args(["run", "daily_walk", "--fast"])
        .assert()
        .success();

    assert!(nested.exists());
}

#[test]
fn test_invalid_config_is_reported() {
    let temp_dir = setup_test_dir();
    let config_dir = temp_dir.path().join("config/rehab");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("config.toml"),
        "[progression]\nmultiplier = 0.5\n",
    )
    .unwrap();

    cli(temp_dir.path())
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("multiplier"));
}
