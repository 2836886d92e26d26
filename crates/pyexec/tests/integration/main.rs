//! Integration tests for pyexec
//!
//! These tests require a Python 3 interpreter. `PYTHON_BIN` selects it,
//! otherwise `python3` is looked up on PATH.
//! Run with: cargo test -p pyexec --features integration-tests

#![cfg(feature = "integration-tests")]

use std::fs;
use std::path::Path;

use pyexec::config::Config;
use pyexec::types::ExecutionLimits;

mod config_loading;
mod execution;
mod http_api;

const FIXTURES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

/// Helper to get fixture file content
pub(crate) fn fixture_source(name: &str) -> String {
    let path = format!("{FIXTURES_PATH}/sources/{name}");
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read fixture {path}: {e}"))
}

/// Create a test config that runs the host Python inside `scratch`.
pub(crate) fn test_config(scratch: &Path) -> Config {
    let mut config = Config::default();
    config.interpreter = Some(
        std::env::var("PYTHON_BIN")
            .unwrap_or_else(|_| "python3".to_owned())
            .into(),
    );
    config.scratch_dir = scratch.to_path_buf();
    config.limits = ExecutionLimits::new()
        .with_wall_time_limit(3.0)
        .with_max_output(256 * ExecutionLimits::KB);
    config
}

/// Whether the scratch directory holds no artifacts
pub(crate) fn scratch_is_empty(scratch: &Path) -> bool {
    match fs::read_dir(scratch) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}
