// crates/fieldscope-core/src/tests.rs
// ============================================================================
// Module: Fieldscope Core Unit Tests
// Description: Crate-internal unit tests for tree helpers and settings.
// Purpose: Cover private paths not reachable from integration tests.
// Dependencies: fieldscope-core
// ============================================================================

//! ## Overview
//! Unit tests for store tree helpers and pricing settings parsing.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::json;

use crate::core::identifiers::StorePath;
use crate::core::stats::PricingConfig;
use crate::interfaces::SettingsStore;
use crate::interfaces::WriteOp;
use crate::runtime::settings::PRICING_SETTINGS_KEY;
use crate::runtime::settings::load_pricing;
use crate::runtime::settings::save_pricing;
use crate::runtime::store::InMemorySettingsStore;
use crate::runtime::tree::apply_write;
use crate::runtime::tree::select_children;
use crate::runtime::tree::subtree;

// ============================================================================
// SECTION: Tree Helpers
// ============================================================================

#[test]
fn set_creates_intermediate_objects() {
    let mut tree = json!(null);
    apply_write(&mut tree, &StorePath::new("farmers/f1"), WriteOp::Set(json!({"name": "Amina"})))
        .unwrap();
    assert_eq!(tree, json!({"farmers": {"f1": {"name": "Amina"}}}));
}

#[test]
fn merge_removes_null_fields() {
    let mut tree = json!({"farmers": {"f1": {"name": "Amina", "phone": "0700"}}});
    let mut fields = serde_json::Map::new();
    fields.insert("phone".to_string(), json!(null));
    fields.insert("county".to_string(), json!("Kajiado"));
    apply_write(&mut tree, &StorePath::new("farmers/f1"), WriteOp::Merge(fields)).unwrap();
    assert_eq!(tree, json!({"farmers": {"f1": {"name": "Amina", "county": "Kajiado"}}}));
}

#[test]
fn delete_removes_subtree() {
    let mut tree = json!({"farmers": {"f1": {"name": "Amina"}, "f2": {"name": "Baraka"}}});
    apply_write(&mut tree, &StorePath::new("farmers/f1"), WriteOp::Delete).unwrap();
    assert_eq!(tree, json!({"farmers": {"f2": {"name": "Baraka"}}}));
}

#[test]
fn select_children_compares_by_text() {
    let node = json!({
        "a": {"programme": "KPMD", "year": 2024},
        "b": {"programme": "RANGE", "year": 2023},
        "c": "not a record"
    });
    assert_eq!(select_children(&node, "programme", "KPMD"), json!({"a": {"programme": "KPMD", "year": 2024}}));
    assert_eq!(select_children(&node, "year", "2023"), json!({"b": {"programme": "RANGE", "year": 2023}}));
    assert_eq!(select_children(&node, "programme", "NONE"), json!(null));
}

#[test]
fn subtree_walks_segments() {
    let tree = json!({"a": {"b": {"c": 1}}});
    assert_eq!(subtree(&tree, &StorePath::new("a/b/c")), Some(&json!(1)));
    assert_eq!(subtree(&tree, &StorePath::new("a/x")), None);
    assert_eq!(subtree(&tree, &StorePath::root()), Some(&tree));
}

// ============================================================================
// SECTION: Pricing Settings
// ============================================================================

#[test]
fn missing_pricing_loads_zeroes() {
    let store = InMemorySettingsStore::new();
    assert_eq!(load_pricing(&store, PRICING_SETTINGS_KEY).unwrap(), PricingConfig::default());
}

#[test]
fn malformed_pricing_fields_load_as_zero() {
    let store = InMemorySettingsStore::new();
    store
        .set(PRICING_SETTINGS_KEY, r#"{"unitPrice":"abc","operatingExpenses":"1,500"}"#)
        .unwrap();
    let pricing = load_pricing(&store, PRICING_SETTINGS_KEY).unwrap();
    assert_eq!(pricing.unit_price, 0.0);
    assert_eq!(pricing.operating_expenses, 1500.0);
}

#[test]
fn unparsable_pricing_loads_zeroes() {
    let store = InMemorySettingsStore::new();
    store.set(PRICING_SETTINGS_KEY, "not json").unwrap();
    assert_eq!(load_pricing(&store, PRICING_SETTINGS_KEY).unwrap(), PricingConfig::default());
}

#[test]
fn saved_pricing_loads_back() {
    let store = InMemorySettingsStore::new();
    let pricing = PricingConfig {
        unit_price: 500.0,
        operating_expenses: 1500.0,
    };
    save_pricing(&store, PRICING_SETTINGS_KEY, &pricing).unwrap();
    assert_eq!(load_pricing(&store, PRICING_SETTINGS_KEY).unwrap(), pricing);
}
