// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration loading

use privacy_gate::Config;
use privacy_gate::constants::{DEFAULT_BLUR_SIGMA, DEFAULT_FACE_DETECTING_FRAME_INTERVAL};
use privacy_gate::errors::ConfigError;

#[test]
fn test_config_default() {
    let config = Config::default();
    assert_eq!(
        config.face_detecting_frame_interval,
        DEFAULT_FACE_DETECTING_FRAME_INTERVAL
    );
    assert_eq!(config.blur_sigma, DEFAULT_BLUR_SIGMA);
    assert!(config.camera_id.is_none());
    assert!(config.validate().is_ok());
}

#[test]
fn test_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let config = Config {
        face_detecting_frame_interval: 5,
        blur_sigma: 25.0,
        camera_id: Some("1".to_string()),
        ..Config::default()
    };
    config.save(&path).unwrap();

    assert_eq!(Config::load(&path).unwrap(), config);
}

#[test]
fn test_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_or_default(&dir.path().join("absent.json")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_invalid_file_contents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");

    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));

    std::fs::write(&path, r#"{"face_detecting_frame_interval": 0}"#).unwrap();
    assert_eq!(Config::load(&path), Err(ConfigError::InvalidInterval(0)));
}
