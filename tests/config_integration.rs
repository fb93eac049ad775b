//! Integration tests for configuration loading

use std::fs;
use std::path::PathBuf;

use pretty_assertions::assert_eq;
use rstest::rstest;
use tempfile::TempDir;

use remoclip::clipboard::BackendKind;
use remoclip::config::{Config, ConfigError};

#[test]
fn test_load_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
        security_token = "team-secret"

        [server]
        port = 9000
        db = "~/clips/remoclip.sqlite"
        clipboard_backend = "private"

        [client]
        url = "http://clipboard.lan:9000"
        timeout_secs = 2
        "#,
    )
    .unwrap();

    let config = Config::load_config(Some(&path)).unwrap();
    assert_eq!(config.security_token.as_deref(), Some("team-secret"));
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.server.clipboard_backend, BackendKind::Private);
    assert!(!config.server.db.to_string_lossy().contains('~'));
    assert!(config.server.db.ends_with("clips/remoclip.sqlite"));
    assert_eq!(config.client.url, "http://clipboard.lan:9000");
    assert_eq!(config.client.timeout_secs, 2);
}

#[test]
fn test_serialized_config_loads_back() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");

    let mut config = Config::default();
    config.security_token = Some("abc".to_string());
    config.server.db = PathBuf::from("/srv/remoclip.sqlite");
    config.server.allow_deletions = true;
    config.client.socket = Some(PathBuf::from("/run/remoclip.sock"));
    fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

    assert_eq!(Config::load_from_path(&path).unwrap(), config);
}

#[rstest]
#[case("[server]\nport = 0\n")]
#[case("[server]\nclipboard_backend = \"wayland\"\n")]
#[case("[client]\nurl = \"127.0.0.1:35612\"\n")]
#[case("[client]\ntimeout_secs = 0\n")]
fn test_invalid_values_are_rejected(#[case] toml_str: &str) {
    assert!(Config::from_toml(toml_str).is_err());
}

#[test]
fn test_malformed_file_reports_toml_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    fs::write(&path, "[server\nport = ").unwrap();

    let result = Config::load_from_path(&path);
    assert!(matches!(result, Err(ConfigError::Toml(_))));
}

#[test]
fn test_example_file_is_valid() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("config.toml");

    Config::write_example(&path, false).unwrap();
    let config = Config::load_from_path(&path).unwrap();
    assert_eq!(config.server.clipboard_backend, BackendKind::System);
    assert!(!config.server.allow_deletions);
}
