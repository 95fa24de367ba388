//! Configuration integration tests.
//!
//! These tests verify config discovery, format parsing, and precedence
//! end to end, reading the effective values back from `info --json`.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Returns a Command isolated from the user's config, logs, and token.
#[allow(deprecated)]
fn cmd(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap();
    cmd.env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("GHPULSE_LOG_DIR", home.path().join("logs"))
        .env_remove("GHPULSE_LOG_PATH")
        .env_remove("GITHUB_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

/// Runs `info --json` from `dir` and returns its `config` object.
fn effective_config(home: &TempDir, dir: &Path) -> Value {
    let output = cmd(home)
        .args(["-C", dir.to_str().unwrap(), "info", "--json"])
        .assert()
        .success();
    let json: Value = serde_json::from_slice(&output.get_output().stdout).unwrap();
    json["config"].clone()
}

// =============================================================================
// Config File Discovery
// =============================================================================

#[test]
fn runs_without_config_file() {
    let tmp = TempDir::new().unwrap();
    let config = effective_config(&tmp, tmp.path());

    assert_eq!(config["window_days"], 30);
    assert_eq!(config["concurrency"], 4);
    assert_eq!(config["api_url"], "https://api.github.com");
    assert_eq!(config["token_configured"], false);
}

#[test]
fn discovers_dotfile_config_in_current_dir() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".ghpulse.toml"),
        "[activity]\nwindow_days = 7\n",
    )
    .unwrap();

    assert_eq!(effective_config(&tmp, tmp.path())["window_days"], 7);
}

#[test]
fn discovers_config_in_parent_directory() {
    let tmp = TempDir::new().unwrap();
    let sub_dir = tmp.path().join("nested").join("deep");
    fs::create_dir_all(&sub_dir).unwrap();
    fs::write(
        tmp.path().join(".ghpulse.toml"),
        "[activity]\nconcurrency = 2\n",
    )
    .unwrap();

    assert_eq!(effective_config(&tmp, &sub_dir)["concurrency"], 2);
}

#[test]
fn user_config_is_used_without_project_config() {
    let tmp = TempDir::new().unwrap();
    let user_dir = tmp.path().join("config").join("ghpulse");
    fs::create_dir_all(&user_dir).unwrap();
    fs::write(user_dir.join("config.toml"), "[activity]\nwindow_days = 90\n").unwrap();

    let project = tmp.path().join("project");
    fs::create_dir_all(&project).unwrap();

    assert_eq!(effective_config(&tmp, &project)["window_days"], 90);
}

// =============================================================================
// Config Format Parsing
// =============================================================================

#[test]
fn parses_yaml_config() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".ghpulse.yaml"),
        "github:\n  api_url: https://ghe.example.com/api/v3\n",
    )
    .unwrap();

    assert_eq!(
        effective_config(&tmp, tmp.path())["api_url"],
        "https://ghe.example.com/api/v3"
    );
}

#[test]
fn parses_json_config() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".ghpulse.json"),
        r#"{"github": {"token": "ghp_json"}, "log_level": "warn"}"#,
    )
    .unwrap();

    let config = effective_config(&tmp, tmp.path());
    assert_eq!(config["token_configured"], true);
    assert_eq!(config["log_level"], "warn");
}

#[test]
fn blank_token_counts_as_unset() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".ghpulse.toml"), "[github]\ntoken = \"  \"\n").unwrap();

    assert_eq!(effective_config(&tmp, tmp.path())["token_configured"], false);
}

// =============================================================================
// Config Precedence
// =============================================================================

#[test]
fn closer_config_takes_precedence() {
    let tmp = TempDir::new().unwrap();
    let sub_dir = tmp.path().join("project");
    fs::create_dir_all(&sub_dir).unwrap();
    fs::write(
        tmp.path().join(".ghpulse.toml"),
        "[activity]\nwindow_days = 60\n",
    )
    .unwrap();
    fs::write(sub_dir.join(".ghpulse.toml"), "[activity]\nwindow_days = 14\n").unwrap();

    assert_eq!(effective_config(&tmp, &sub_dir)["window_days"], 14);
}

#[test]
fn explicit_config_flag_overrides_discovery() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".ghpulse.toml"),
        "[activity]\nwindow_days = 60\n",
    )
    .unwrap();
    let explicit = tmp.path().join("explicit.yaml");
    fs::write(&explicit, "activity:\n  window_days: 5\n").unwrap();

    let output = cmd(&tmp)
        .args(["-C", tmp.path().to_str().unwrap(), "--config"])
        .arg(&explicit)
        .args(["info", "--json"])
        .assert()
        .success();
    let json: Value = serde_json::from_slice(&output.get_output().stdout).unwrap();
    assert_eq!(json["config"]["window_days"], 5);
}

#[test]
fn git_boundary_stops_config_search() {
    let tmp = TempDir::new().unwrap();
    let parent = tmp.path().join("parent");
    let repo = parent.join("repo");
    let src = repo.join("src");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir(repo.join(".git")).unwrap();
    fs::write(parent.join(".ghpulse.toml"), "[activity]\nwindow_days = 60\n").unwrap();

    assert_eq!(effective_config(&tmp, &src)["window_days"], 30);
}

#[test]
fn config_in_same_dir_as_git_is_found() {
    let tmp = TempDir::new().unwrap();
    let repo = tmp.path().join("repo");
    let src = repo.join("src");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir(repo.join(".git")).unwrap();
    fs::write(repo.join(".ghpulse.toml"), "[activity]\nwindow_days = 21\n").unwrap();

    assert_eq!(effective_config(&tmp, &src)["window_days"], 21);
}

// =============================================================================
// Error Cases
// =============================================================================

#[test]
fn invalid_toml_config_shows_error() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".ghpulse.toml"), "this is not valid toml [[[").unwrap();

    cmd(&tmp)
        .args(["-C", tmp.path().to_str().unwrap(), "info"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration"));
}

#[test]
fn wrong_value_type_shows_error() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".ghpulse.toml"),
        "[activity]\nwindow_days = \"a month\"\n",
    )
    .unwrap();

    cmd(&tmp)
        .args(["-C", tmp.path().to_str().unwrap(), "info"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("window_days"));
}

#[test]
fn unknown_config_field_is_ignored() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".ghpulse.toml"),
        "unknown_field = \"ignored\"\n[activity]\nwindow_days = 3\n",
    )
    .unwrap();

    assert_eq!(effective_config(&tmp, tmp.path())["window_days"], 3);
}
