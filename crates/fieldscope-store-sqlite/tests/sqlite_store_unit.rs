// crates/fieldscope-store-sqlite/tests/sqlite_store_unit.rs
// ============================================================================
// Module: SQLite Store Unit Tests
// Description: Path reads, equality reads, writes, and settings on SQLite.
// Purpose: Validate path safety, schema versioning, size limits, and the
//          hierarchical store contract.
// ============================================================================

//! ## Overview
//! Unit-level tests for the `SQLite` store:
//! - Path safety checks (empty/component/directory rejection)
//! - Schema version validation
//! - Missing paths read as null, writes create intermediate objects
//! - Equality reads select matching children only
//! - Stored data survives reopening; corrupt rows fail closed
//! - Settings values round-trip and feed pricing loads

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    clippy::float_cmp,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::path::Path;
use std::sync::Arc;

use fieldscope_core::AccessScope;
use fieldscope_core::CollectionSpec;
use fieldscope_core::PricingConfig;
use fieldscope_core::RemoteStore;
use fieldscope_core::ScopedFetcher;
use fieldscope_core::SettingsStore;
use fieldscope_core::StoreError;
use fieldscope_core::StorePath;
use fieldscope_core::SystemClock;
use fieldscope_core::WriteOp;
use fieldscope_core::core::records::Farmer;
use fieldscope_core::runtime::NoopEventSink;
use fieldscope_core::runtime::PRICING_SETTINGS_KEY;
use fieldscope_core::runtime::load_pricing;
use fieldscope_core::runtime::save_pricing;
use fieldscope_store_sqlite::SqliteRemoteStore;
use fieldscope_store_sqlite::SqliteSettingsStore;
use fieldscope_store_sqlite::SqliteStoreConfig;
use fieldscope_store_sqlite::SqliteStoreError;
use rusqlite::Connection;
use rusqlite::params;
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Opens a store at `path` with default settings.
fn store_for(path: &Path) -> SqliteRemoteStore {
    SqliteRemoteStore::new(SqliteStoreConfig::new(path)).expect("store init")
}

/// Seeds a small farmer tree.
async fn seed_farmers(store: &SqliteRemoteStore) {
    store
        .write(
            &StorePath::new("farmers"),
            WriteOp::Set(json!({
                "f1": { "name": "Amina", "programme": "KPMD", "cattle": 4 },
                "f2": { "name": "Baraka", "programme": "RANGE", "cattle": "2" },
                "f3": { "name": "Chebet", "programme": "KPMD", "cattle": 7 }
            })),
        )
        .await
        .expect("seed farmers");
}

// ============================================================================
// SECTION: Path Safety
// ============================================================================

#[test]
fn sqlite_store_rejects_empty_path() {
    let result = SqliteRemoteStore::new(SqliteStoreConfig::new(""));
    assert!(matches!(result, Err(SqliteStoreError::Invalid(_))));
}

#[test]
fn sqlite_store_rejects_overlong_component() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(format!("{}.db", "a".repeat(300)));
    let result = SqliteRemoteStore::new(SqliteStoreConfig::new(path));
    assert!(matches!(result, Err(SqliteStoreError::Invalid(_))));
}

#[test]
fn sqlite_store_rejects_directory_path() {
    let temp = TempDir::new().unwrap();
    let result = SqliteRemoteStore::new(SqliteStoreConfig::new(temp.path()));
    assert!(matches!(result, Err(SqliteStoreError::Invalid(_))));
}

#[test]
fn sqlite_store_rejects_zero_node_limit() {
    let temp = TempDir::new().unwrap();
    let mut config = SqliteStoreConfig::new(temp.path().join("store.db"));
    config.max_node_bytes = 0;
    assert!(matches!(config.validate(), Err(SqliteStoreError::Invalid(_))));
}

#[test]
fn sqlite_store_creates_parent_directories() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("deeper").join("store.db");
    let _store = store_for(&path);
    assert!(path.exists());
}

#[test]
fn sqlite_store_rejects_unknown_schema_version() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.db");
    drop(store_for(&path));
    let connection = Connection::open(&path).unwrap();
    connection.execute("UPDATE store_meta SET version = ?1", params![99]).unwrap();
    drop(connection);
    let result = SqliteRemoteStore::new(SqliteStoreConfig::new(&path));
    assert!(matches!(result, Err(SqliteStoreError::VersionMismatch(_))));
}

// ============================================================================
// SECTION: Store Contract
// ============================================================================

#[tokio::test]
async fn sqlite_store_missing_path_reads_null() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.db"));
    assert_eq!(store.read(&StorePath::new("farmers")).await.unwrap(), Value::Null);
    assert_eq!(store.read(&StorePath::root()).await.unwrap(), Value::Null);
    assert_eq!(store.read(&StorePath::new("farmers/f1/name")).await.unwrap(), Value::Null);
}

#[tokio::test]
async fn sqlite_store_set_creates_intermediate_objects() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.db"));
    store.write(&StorePath::new("farmers/f9/name"), WriteOp::Set(json!("Zawadi"))).await.unwrap();
    let farmers = store.read(&StorePath::new("farmers")).await.unwrap();
    assert_eq!(farmers, json!({ "f9": { "name": "Zawadi" } }));
}

#[tokio::test]
async fn sqlite_store_root_read_combines_roots() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.db"));
    store.write(&StorePath::new("users/u1"), WriteOp::Set(json!({ "role": "admin" }))).await.unwrap();
    store.write(&StorePath::new("farmers/f1"), WriteOp::Set(json!({ "name": "Amina" }))).await.unwrap();
    let root = store.read(&StorePath::root()).await.unwrap();
    assert_eq!(
        root,
        json!({
            "farmers": { "f1": { "name": "Amina" } },
            "users": { "u1": { "role": "admin" } }
        })
    );
}

#[tokio::test]
async fn sqlite_store_read_where_selects_matching_children() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.db"));
    seed_farmers(&store).await;
    let kpmd = store.read_where(&StorePath::new("farmers"), "programme", "KPMD").await.unwrap();
    let ids: Vec<&String> = kpmd.as_object().unwrap().keys().collect();
    assert_eq!(ids, vec!["f1", "f3"]);
    let numeric = store.read_where(&StorePath::new("farmers"), "cattle", "4").await.unwrap();
    assert_eq!(numeric.as_object().unwrap().len(), 1);
    let none = store.read_where(&StorePath::new("farmers"), "programme", "NONE").await.unwrap();
    assert_eq!(none, Value::Null);
}

#[tokio::test]
async fn sqlite_store_merge_removes_null_fields() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.db"));
    seed_farmers(&store).await;
    let mut fields = serde_json::Map::new();
    fields.insert("cattle".to_string(), Value::Null);
    fields.insert("county".to_string(), json!("Kajiado"));
    store.write(&StorePath::new("farmers/f1"), WriteOp::Merge(fields)).await.unwrap();
    let f1 = store.read(&StorePath::new("farmers/f1")).await.unwrap();
    assert_eq!(f1, json!({ "name": "Amina", "programme": "KPMD", "county": "Kajiado" }));
}

#[tokio::test]
async fn sqlite_store_delete_removes_subtrees() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.db"));
    seed_farmers(&store).await;
    store.write(&StorePath::new("farmers/f2"), WriteOp::Delete).await.unwrap();
    assert_eq!(store.read(&StorePath::new("farmers/f2")).await.unwrap(), Value::Null);
    assert_eq!(store.read(&StorePath::new("farmers")).await.unwrap().as_object().unwrap().len(), 2);
    store.write(&StorePath::new("farmers"), WriteOp::Delete).await.unwrap();
    assert_eq!(store.read(&StorePath::root()).await.unwrap(), Value::Null);
}

#[tokio::test]
async fn sqlite_store_root_set_requires_object() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.db"));
    seed_farmers(&store).await;
    let result = store.write(&StorePath::root(), WriteOp::Set(json!(5))).await;
    assert!(matches!(result, Err(StoreError::Invalid(_))));
    assert!(store.read(&StorePath::new("farmers/f1")).await.unwrap().is_object());
}

#[tokio::test]
async fn sqlite_store_persists_across_reopen() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.db");
    {
        let store = store_for(&path);
        seed_farmers(&store).await;
    }
    let reopened = store_for(&path);
    let name = reopened.read(&StorePath::new("farmers/f3/name")).await.unwrap();
    assert_eq!(name, json!("Chebet"));
}

#[tokio::test]
async fn sqlite_store_rejects_oversized_trees() {
    let temp = TempDir::new().unwrap();
    let mut config = SqliteStoreConfig::new(temp.path().join("store.db"));
    config.max_node_bytes = 32;
    let store = SqliteRemoteStore::new(config).unwrap();
    let result = store
        .write(&StorePath::new("farmers/f1"), WriteOp::Set(json!({ "name": "x".repeat(64) })))
        .await;
    assert!(matches!(result, Err(StoreError::Invalid(_))));
    assert_eq!(store.read(&StorePath::new("farmers")).await.unwrap(), Value::Null);
}

#[tokio::test]
async fn sqlite_store_corrupt_row_fails_closed() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.db");
    let store = store_for(&path);
    seed_farmers(&store).await;
    let connection = Connection::open(&path).unwrap();
    connection
        .execute(
            "UPDATE store_roots SET tree_json = ?1 WHERE root = 'farmers'",
            params![b"{not json".to_vec()],
        )
        .unwrap();
    drop(connection);
    let result = store.read(&StorePath::new("farmers")).await;
    assert!(matches!(result, Err(StoreError::Decode(_))));
}

#[tokio::test]
async fn sqlite_store_serves_scoped_fetches() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.db"));
    seed_farmers(&store).await;
    let fetcher =
        ScopedFetcher::new(Arc::new(store), Arc::new(SystemClock), Arc::new(NoopEventSink));
    let outcome = fetcher
        .fetch::<Farmer>(&CollectionSpec::new("farmers"), &AccessScope::partitions(["KPMD"]))
        .await;
    assert!(outcome.is_complete());
    assert_eq!(outcome.reads, 1);
    let ids: Vec<&str> = outcome.records.iter().map(|farmer| farmer.meta.id.as_str()).collect();
    assert_eq!(ids, vec!["f1", "f3"]);
}

// ============================================================================
// SECTION: Settings
// ============================================================================

#[test]
fn sqlite_settings_round_trip() {
    let temp = TempDir::new().unwrap();
    let settings = SqliteSettingsStore::open(SqliteStoreConfig::new(temp.path().join("s.db"))).unwrap();
    assert_eq!(settings.get("missing").unwrap(), None);
    settings.set("theme", "dark").unwrap();
    settings.set("theme", "light").unwrap();
    assert_eq!(settings.get("theme").unwrap().as_deref(), Some("light"));
}

#[test]
fn sqlite_settings_persist_pricing() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.db");
    let pricing = PricingConfig {
        unit_price: 450.0,
        operating_expenses: 1_200.0,
    };
    {
        let settings = store_for(&path).settings();
        save_pricing(&settings, PRICING_SETTINGS_KEY, &pricing).unwrap();
    }
    let settings = store_for(&path).settings();
    let loaded = load_pricing(&settings, PRICING_SETTINGS_KEY).unwrap();
    assert_eq!(loaded.unit_price, 450.0);
    assert_eq!(loaded.operating_expenses, 1_200.0);
}

#[test]
fn sqlite_settings_reject_oversized_values() {
    let temp = TempDir::new().unwrap();
    let settings = store_for(&temp.path().join("store.db")).settings();
    let result = settings.set("blob", &"x".repeat(fieldscope_store_sqlite::MAX_SETTING_BYTES + 1));
    assert!(result.is_err());
    assert_eq!(settings.get("blob").unwrap(), None);
}
