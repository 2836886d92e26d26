use std::time::Duration;

use pyexec::config::Config;

use super::FIXTURES_PATH;

#[test]
fn test_load_valid_config() {
    let path = format!("{FIXTURES_PATH}/configs/valid_full.toml");
    let config = Config::from_file(&path).expect("Failed to load config");

    assert_eq!(
        config.interpreter_binary().to_str(),
        Some("/usr/bin/python3")
    );
    assert_eq!(config.concurrency(), 2);
    assert_eq!(config.queue_wait(), Duration::from_secs(5));
    assert_eq!(config.limits.wall_time(), Duration::from_secs(3));
    assert_eq!(config.limits.output_ceiling(), 65536);
    assert_eq!(config.server.port, 8080);
    assert!(config.server.allowed_origins.is_empty());
}

#[test]
fn test_load_minimal_config() {
    let path = format!("{FIXTURES_PATH}/configs/valid_minimal.toml");
    let config = Config::from_file(&path).expect("Failed to load config");

    assert_eq!(config.limits.wall_time(), Duration::from_secs(10));
    assert_eq!(config.server.port, 5000);
}

#[test]
fn test_load_invalid_zero_wall_time() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_zero_wall_time.toml");
    assert!(Config::from_file(&path).is_err());
}

#[test]
fn test_load_invalid_zero_concurrency() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_zero_concurrency.toml");
    assert!(Config::from_file(&path).is_err());
}

#[test]
fn test_load_invalid_empty_interpreter() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_empty_interpreter.toml");
    assert!(Config::from_file(&path).is_err());
}

#[test]
fn test_load_missing_file() {
    let path = format!("{FIXTURES_PATH}/configs/does_not_exist.toml");
    assert!(Config::from_file(&path).is_err());
}
