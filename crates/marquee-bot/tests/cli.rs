use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn test_config_path_command() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("marquee")
        .env("MARQUEE_HOME", dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"))
        .stdout(predicate::str::contains(dir.path().to_string_lossy().as_ref()));
}

#[test]
fn test_config_init_creates_file() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");

    cargo_bin_cmd!("marquee")
        .env("MARQUEE_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config at"));

    let contents = fs::read_to_string(&config_path).unwrap();
    assert!(contents.contains("[quota]"));
    assert!(contents.contains("# bot_token ="));
}

#[test]
fn test_config_init_fails_if_exists() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "# existing config").unwrap();

    cargo_bin_cmd!("marquee")
        .env("MARQUEE_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    assert_eq!(fs::read_to_string(&config_path).unwrap(), "# existing config");
}

#[test]
fn test_config_help_shows_subcommands() {
    cargo_bin_cmd!("marquee")
        .args(["config", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("path"))
        .stdout(predicate::str::contains("init"));
}

#[test]
fn test_run_without_token_fails() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("marquee")
        .env("MARQUEE_HOME", dir.path())
        .env_remove("MARQUEE_TELEGRAM_BOT_TOKEN")
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("MARQUEE_TELEGRAM_BOT_TOKEN is required"));
}

#[test]
fn test_run_without_catalog_key_fails() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("config.toml"),
        "[telegram]\nbot_token = \"123:abc\"\n",
    )
    .unwrap();

    cargo_bin_cmd!("marquee")
        .env("MARQUEE_HOME", dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("tmdb.api_key is required"));
}
