// crates/fieldscope-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for fieldscope-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::path::Path;
use std::path::PathBuf;

use fieldscope_config::ConfigError;
use fieldscope_config::FieldscopeConfig;

/// Result type used by config tests.
pub type TestResult = Result<(), String>;

/// Parses a TOML string into a `FieldscopeConfig` without validation.
pub fn config_from_toml(toml_str: &str) -> Result<FieldscopeConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<FieldscopeConfig, toml::de::Error> {
    config_from_toml("")
}

/// Writes `content` to `fieldscope.toml` under `dir` and returns the path.
pub fn write_config(dir: &Path, content: &[u8]) -> Result<PathBuf, String> {
    let path = dir.join("fieldscope.toml");
    std::fs::write(&path, content).map_err(|err| err.to_string())?;
    Ok(path)
}

/// Asserts that `result` is an error whose message contains `needle`.
pub fn assert_invalid<T>(result: Result<T, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}
