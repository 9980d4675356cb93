//! Config defaults and section validation tests for fieldscope-config.
// crates/fieldscope-config/tests/config_defaults.rs
// =============================================================================
// Module: Config Defaults and Section Validation Tests
// Description: Validate default behavior and per-section invariants.
// Purpose: Ensure a minimal config is valid and invalid sections fail closed.
// =============================================================================

use std::path::PathBuf;
use std::time::Duration;

use fieldscope_config::CollectionConfig;
use fieldscope_config::EventSinkType;
use fieldscope_config::FieldscopeConfig;
use fieldscope_config::StoreConfig;
use fieldscope_core::EntityKind;
use fieldscope_core::StorePath;
use fieldscope_store_sqlite::SqliteStoreConfig;

use crate::common::TestResult;
use crate::common::assert_invalid;

mod common;

/// Returns a farmers collection entry.
fn farmers_entry() -> CollectionConfig {
    CollectionConfig {
        name: "farmers".to_string(),
        entity: EntityKind::Farmer,
        path: None,
        partition_field: "programme".to_string(),
    }
}

#[test]
fn default_config_validates() -> TestResult {
    let config = common::minimal_config().map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    if config != FieldscopeConfig::default() {
        return Err("empty toml should match the default config".to_string());
    }
    Ok(())
}

#[test]
fn defaults_match_runtime_defaults() -> TestResult {
    let config = common::minimal_config().map_err(|err| err.to_string())?;
    if config.cache.ttl() != Duration::from_secs(300) {
        return Err(format!("unexpected default ttl: {} ms", config.cache.ttl_ms));
    }
    if config.access.unrestricted_role != "chief-admin" {
        return Err("unexpected default unrestricted role".to_string());
    }
    if config.profile_root() != StorePath::new("users") {
        return Err("unexpected default profile root".to_string());
    }
    if config.pricing.settings_key != "fieldscope.pricing" {
        return Err("unexpected default pricing key".to_string());
    }
    if config.store != StoreConfig::Memory || config.events.sink != EventSinkType::Stderr {
        return Err("unexpected default store or events sink".to_string());
    }
    Ok(())
}

#[test]
fn cache_rejects_zero_ttl() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.cache.ttl_ms = 0;
    assert_invalid(config.validate(), "cache.ttl_ms must be greater than zero")
}

#[test]
fn cache_rejects_excessive_ttl() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.cache.ttl_ms = 2 * 24 * 60 * 60 * 1000;
    assert_invalid(config.validate(), "cache.ttl_ms exceeds max")
}

#[test]
fn access_rejects_empty_role() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.access.unrestricted_role = "   ".to_string();
    assert_invalid(config.validate(), "access.unrestricted_role must be non-empty")
}

#[test]
fn access_rejects_root_profile_path() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.access.profile_root = "/".to_string();
    assert_invalid(config.validate(), "access.profile_root must be non-empty")
}

#[test]
fn collections_reject_duplicate_names() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.collections = vec![farmers_entry(), farmers_entry()];
    assert_invalid(config.validate(), "collections.name 'farmers' is duplicated")
}

#[test]
fn collections_reject_empty_partition_field() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    let mut entry = farmers_entry();
    entry.partition_field = String::new();
    config.collections = vec![entry];
    assert_invalid(config.validate(), "collections.partition_field must be non-empty")
}

#[test]
fn collections_reject_slash_in_name() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    let mut entry = farmers_entry();
    entry.name = "farmers/archive".to_string();
    config.collections = vec![entry];
    assert_invalid(config.validate(), "collections.name must not contain '/'")
}

#[test]
fn collection_spec_uses_path_and_partition_field() -> TestResult {
    let mut entry = farmers_entry();
    entry.path = Some("/registry//farmers/".to_string());
    entry.partition_field = "program".to_string();
    let spec = entry.spec();
    if spec.path != StorePath::new("registry/farmers") || spec.partition_field != "program" {
        return Err(format!("unexpected spec path {} / field {}", spec.path, spec.partition_field));
    }
    let default_spec = farmers_entry().spec();
    if default_spec.path != StorePath::new("farmers") {
        return Err("collection path should default to its name".to_string());
    }
    Ok(())
}

#[test]
fn pricing_rejects_empty_key() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.pricing.settings_key = String::new();
    assert_invalid(config.validate(), "pricing.settings_key must be non-empty")
}

#[test]
fn events_file_sink_requires_path() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.events.sink = EventSinkType::File;
    assert_invalid(config.validate(), "file events sink requires path")
}

#[test]
fn events_path_requires_file_sink() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.events.path = Some(PathBuf::from("events.jsonl"));
    assert_invalid(config.validate(), "events.path is only valid for the file sink")
}

#[test]
fn store_sqlite_rejects_empty_path() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.store = StoreConfig::Sqlite(SqliteStoreConfig::new(""));
    assert_invalid(config.validate(), "store path must not be empty")
}

#[test]
fn store_http_rejects_cleartext() -> TestResult {
    let toml = r#"
        [store]
        type = "http"
        base_url = "http://db.example.com"
    "#;
    assert_invalid(FieldscopeConfig::from_toml_str(toml), "unsupported base_url scheme")
}
