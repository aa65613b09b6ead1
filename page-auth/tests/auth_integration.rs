//! Integration tests for page-auth credential commands

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn setup_test_env() -> (TempDir, String, String) {
    let temp_dir = TempDir::new().unwrap();

    let config_dir = temp_dir.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let data_dir = temp_dir.path().join("data");
    fs::create_dir_all(&data_dir).unwrap();

    let config_path = config_dir.join("config.toml");
    let db_path = data_dir.join("pagecast.db");

    let config_content = format!(
        r#"
[database]
path = "{}"
"#,
        db_path.to_string_lossy()
    );
    fs::write(&config_path, config_content).unwrap();

    (
        temp_dir,
        config_path.to_string_lossy().to_string(),
        db_path.to_string_lossy().to_string(),
    )
}

#[test]
fn test_set_stores_credentials() {
    let (_temp_dir, config_path, _db_path) = setup_test_env();

    let mut cmd = Command::cargo_bin("page-auth").unwrap();
    cmd.env("PAGECAST_CONFIG", &config_path)
        .args([
            "set",
            "facebook",
            "--app-id",
            "1234",
            "--app-secret",
            "s3cret",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Stored facebook credentials"));
}

#[test]
fn test_set_rejects_unknown_platform() {
    let (_temp_dir, config_path, _db_path) = setup_test_env();

    let mut cmd = Command::cargo_bin("page-auth").unwrap();
    cmd.env("PAGECAST_CONFIG", &config_path)
        .args(["set", "tiktok", "--app-id", "1", "--app-secret", "2"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("Unknown platform"));
}

#[test]
fn test_url_requires_stored_credentials() {
    let (_temp_dir, config_path, _db_path) = setup_test_env();

    let mut cmd = Command::cargo_bin("page-auth").unwrap();
    cmd.env("PAGECAST_CONFIG", &config_path)
        .args(["url", "facebook", "--redirect-uri", "https://cb"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("No API credentials configured"));
}

#[test]
fn test_url_prints_dialog_url_and_state() {
    let (_temp_dir, config_path, _db_path) = setup_test_env();

    Command::cargo_bin("page-auth")
        .unwrap()
        .env("PAGECAST_CONFIG", &config_path)
        .args([
            "set",
            "instagram",
            "--app-id",
            "1234",
            "--app-secret",
            "s3cret",
        ])
        .assert()
        .success();

    let mut cmd = Command::cargo_bin("page-auth").unwrap();
    cmd.env("PAGECAST_CONFIG", &config_path)
        .args(["url", "instagram", "--redirect-uri", "https://cb"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "https://www.facebook.com/v19.0/dialog/oauth",
        ))
        .stdout(predicate::str::contains("instagram_content_publish"))
        .stderr(predicate::str::contains("state: default:"));
}

#[test]
fn test_connect_rejects_foreign_state() {
    let (_temp_dir, config_path, _db_path) = setup_test_env();

    let mut cmd = Command::cargo_bin("page-auth").unwrap();
    cmd.env("PAGECAST_CONFIG", &config_path)
        .args([
            "connect",
            "facebook",
            "--code",
            "AQD123",
            "--state",
            "someone-else:nonce",
            "--redirect-uri",
            "https://cb",
        ])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("State parameter"));
}

#[test]
fn test_accounts_empty() {
    let (_temp_dir, config_path, _db_path) = setup_test_env();

    let mut cmd = Command::cargo_bin("page-auth").unwrap();
    cmd.env("PAGECAST_CONFIG", &config_path)
        .arg("accounts")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}
