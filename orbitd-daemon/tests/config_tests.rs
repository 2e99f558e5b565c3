//! Configuration loading tests: file, environment and CLI precedence.

use std::io::Write;

use clap::Parser;
use orbitd_daemon::cli::DaemonCli;
use serial_test::serial;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(content.as_bytes()).expect("write config");
    file
}

fn cli(args: &[&str]) -> DaemonCli {
    let mut argv = vec!["orbitd"];
    argv.extend_from_slice(args);
    DaemonCli::try_parse_from(argv).expect("arguments should parse")
}

#[tokio::test]
#[serial]
async fn test_file_values_are_loaded() {
    // Given
    let file = write_config(
        r#"
[updater]
policy = "patch"
interval_secs = 600
require_label = true
"#,
    );
    let path = file.path().display().to_string();

    // When
    let config = cli(&["--config", &path]).load_config().await.expect("config loads");

    // Then
    assert_eq!(config.updater.policy, "patch");
    assert_eq!(config.updater.interval_secs, 600);
    assert!(config.updater.require_label);
    assert!(config.updater.cleanup, "unset fields keep defaults");
}

#[tokio::test]
#[serial]
async fn test_cli_wins_over_environment_and_file() {
    // Given: file says patch, environment says major, flag says minor
    let file = write_config("[updater]\npolicy = \"patch\"\n");
    let path = file.path().display().to_string();
    // SAFETY: serial test, no other thread touches the environment
    unsafe { std::env::set_var("ORBITD_UPDATER_POLICY", "major") };

    // When
    let from_env = cli(&["--config", &path]).load_config().await;
    let from_flag = cli(&["--config", &path, "--policy", "minor"]).load_config().await;
    // SAFETY: see above
    unsafe { std::env::remove_var("ORBITD_UPDATER_POLICY") };

    // Then
    assert_eq!(from_env.expect("loads").updater.policy, "major");
    assert_eq!(from_flag.expect("loads").updater.policy, "minor");
}

#[tokio::test]
#[serial]
async fn test_explicit_missing_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("absent.toml").display().to_string();

    let result = cli(&["--config", &path]).load_config().await;

    assert!(result.is_err());
}

#[tokio::test]
#[serial]
async fn test_invalid_values_fail_validation() {
    let file = write_config("[general]\nlog_format = \"xml\"\n");
    let path = file.path().display().to_string();

    let err = cli(&["--config", &path]).load_config().await.unwrap_err();

    assert!(err.to_string().contains("validation"), "got: {err}");
}

#[tokio::test]
#[serial]
async fn test_flag_can_repair_file_value() {
    // Given: file interval out of range, flag supplies a valid one
    let file = write_config("[updater]\ninterval_secs = 0\n");
    let path = file.path().display().to_string();

    // When
    let config = cli(&["--config", &path, "--interval", "1h"])
        .load_config()
        .await
        .expect("flag should repair the interval");

    // Then
    assert_eq!(config.updater.interval_secs, 3600);
}
