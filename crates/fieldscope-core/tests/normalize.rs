// crates/fieldscope-core/tests/normalize.rs
// ============================================================================
// Module: Normalization Tests
// Description: Alias resolution and tolerant coercion for raw records.
// Purpose: Validate canonical record shapes across entity kinds.
// Dependencies: fieldscope-core, serde_json, time
// ============================================================================

//! ## Overview
//! Normalization never fails: malformed fields degrade to defaults.

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

use fieldscope_core::core::identifiers::RecordId;
use fieldscope_core::core::normalize::coerce_count;
use fieldscope_core::core::normalize::coerce_flag;
use fieldscope_core::core::normalize::coerce_number;
use fieldscope_core::core::normalize::normalize;
use fieldscope_core::core::records::CanonicalRecord;
use fieldscope_core::core::records::EntityKind;
use fieldscope_core::core::records::EntityRecord;
use fieldscope_core::core::records::Farmer;
use fieldscope_core::core::records::Gender;
use fieldscope_core::core::records::OfftakeTransaction;
use fieldscope_core::core::records::RequisitionEntry;
use fieldscope_core::core::records::TrainingSession;
use fieldscope_core::core::time::parse_timestamp;
use serde_json::Value;
use serde_json::json;
use time::OffsetDateTime;
use time::macros::date;
use time::macros::datetime;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Fixed "now" used for timestamp fallbacks.
const NOW: OffsetDateTime = datetime!(2024-06-01 12:00 UTC);

/// Normalizes a raw farmer document.
fn farmer(raw: &Value) -> Farmer {
    Farmer::from_raw(RecordId::new("f1"), raw, NOW)
}

// ============================================================================
// SECTION: Aliases
// ============================================================================

#[test]
fn region_alias_fills_county() {
    let record = farmer(&json!({"name": "Amina", "Region": "Turkana"}));
    assert_eq!(record.county.as_deref(), Some("Turkana"));
}

#[test]
fn first_non_empty_alias_wins() {
    let record = farmer(&json!({"name": "Amina", "county": "  ", "Region": "Marsabit"}));
    assert_eq!(record.county.as_deref(), Some("Marsabit"));
}

#[test]
fn programme_alias_sets_partition() {
    let record = farmer(&json!({"program": "KPMD"}));
    assert_eq!(record.meta.programme.as_ref().map(|p| p.as_str()), Some("KPMD"));
}

// ============================================================================
// SECTION: Gender
// ============================================================================

#[test]
fn gender_female_prefix() {
    assert_eq!(farmer(&json!({"gender": "F"})).gender, Gender::Female);
    assert_eq!(farmer(&json!({"gender": " female "})).gender, Gender::Female);
}

#[test]
fn gender_defaults_to_male() {
    assert_eq!(farmer(&json!({"gender": "m"})).gender, Gender::Male);
    assert_eq!(farmer(&json!({"gender": ""})).gender, Gender::Male);
    assert_eq!(farmer(&json!({})).gender, Gender::Male);
    assert_eq!(farmer(&json!({"gender": "unknown"})).gender, Gender::Male);
    assert_eq!(Gender::Male.label(), "Male");
    assert_eq!(Gender::Female.label(), "Female");
}

// ============================================================================
// SECTION: Numbers and Lists
// ============================================================================

#[test]
fn numeric_fields_coerce_to_zero() {
    let record = farmer(&json!({"cattle": "abc", "goats": "4", "sheep": null}));
    assert_eq!(record.cattle, 0);
    assert_eq!(record.goats, 4);
    assert_eq!(record.sheep, 0);
}

#[test]
fn coercion_helpers_are_tolerant() {
    assert_eq!(coerce_number(&json!("1,250.5")), 1250.5);
    assert_eq!(coerce_number(&json!("n/a")), 0.0);
    assert_eq!(coerce_number(&json!(null)), 0.0);
    assert_eq!(coerce_count(&json!(-3)), 0);
    assert_eq!(coerce_count(&json!(2.9)), 2);
    assert!(coerce_flag(&json!("yes")));
    assert!(coerce_flag(&json!(1)));
    assert!(!coerce_flag(&json!("no")));
}

#[test]
fn missing_animal_list_is_empty() {
    let record = OfftakeTransaction::from_raw(RecordId::new("o1"), &json!({"animals": "bad"}), NOW);
    assert!(record.animals.is_empty());
    let record = OfftakeTransaction::from_raw(RecordId::new("o2"), &json!({}), NOW);
    assert!(record.animals.is_empty());
}

#[test]
fn index_keyed_animal_objects_are_ordered() {
    let raw = json!({
        "farmerName": "Baraka",
        "animals": {
            "10": {"carcassWeight": 30, "price": 300},
            "2": {"carcassWeight": 20, "price": 200},
            "1": {"carcassWeight": "10", "price": "100"}
        }
    });
    let record = OfftakeTransaction::from_raw(RecordId::new("o1"), &raw, NOW);
    let weights: Vec<f64> = record.animals.iter().map(|animal| animal.carcass_weight).collect();
    assert_eq!(weights, vec![10.0, 20.0, 30.0]);
    assert_eq!(record.carcass_weight(), 60.0);
    assert_eq!(record.acquisition_cost(), 600.0);
}

#[test]
fn stored_total_overrides_animal_prices() {
    let raw = json!({"totalPrice": 900, "animals": [{"price": 100}, {"price": 200}]});
    let record = OfftakeTransaction::from_raw(RecordId::new("o1"), &raw, NOW);
    assert_eq!(record.acquisition_cost(), 900.0);
}

#[test]
fn requisition_totals_default_from_items() {
    let raw = json!({
        "requester": "Wanjiru",
        "status": "Approved by finance",
        "items": [
            {"description": "Fuel", "quantity": 2, "unitCost": 150},
            {"description": "Allowance", "total": 1000}
        ]
    });
    let record = RequisitionEntry::from_raw(RecordId::new("r1"), &raw, NOW);
    assert_eq!(record.items.len(), 2);
    assert_eq!(record.total_amount, 1300.0);
    assert!(record.metrics().flagged);
}

#[test]
fn training_attendees_default_to_split() {
    let raw = json!({"topic": "Pasture", "maleFarmers": 12, "femaleFarmers": 8});
    let record = TrainingSession::from_raw(RecordId::new("t1"), &raw, NOW);
    assert_eq!(record.attendees, 20);
}

// ============================================================================
// SECTION: Timestamps
// ============================================================================

#[test]
fn stored_timestamp_is_used() {
    let record = farmer(&json!({"registrationDate": "2024-03-15"}));
    assert!(record.meta.recorded_at.is_stored());
    assert_eq!(record.meta.recorded_at.date(), date!(2024 - 03 - 15));
}

#[test]
fn missing_timestamp_falls_back_to_now() {
    let record = farmer(&json!({"registrationDate": "someday"}));
    assert!(!record.meta.recorded_at.is_stored());
    assert_eq!(record.meta.recorded_at.date(), NOW.date());
}

#[test]
fn extreme_epoch_numbers_fall_back_to_now() {
    for raw in [json!(i64::MIN), json!(i64::MAX), json!(-99_999_999_999_i64), json!(-1.0e300)] {
        let record = farmer(&json!({"registrationDate": raw}));
        assert!(!record.meta.recorded_at.is_stored());
        assert_eq!(record.meta.recorded_at.date(), NOW.date());
    }
    assert_eq!(parse_timestamp(&json!(i64::MIN)), None);
}

#[test]
fn epoch_numbers_accept_seconds_and_milliseconds() {
    let seconds = farmer(&json!({"registrationDate": 1_710_460_800_i64}));
    let millis = farmer(&json!({"registrationDate": 1_710_460_800_000_i64}));
    assert_eq!(seconds.meta.recorded_at.date(), date!(2024 - 03 - 15));
    assert_eq!(millis.meta.recorded_at.date(), date!(2024 - 03 - 15));
}

// ============================================================================
// SECTION: Dispatch
// ============================================================================

#[test]
fn normalize_dispatches_by_kind() {
    let record = normalize(EntityKind::Farmer, &json!({"name": "Amina"}), RecordId::new("f1"), NOW);
    assert_eq!(record.kind(), EntityKind::Farmer);
    assert_eq!(record.meta().id.as_str(), "f1");
    assert!(matches!(record, CanonicalRecord::Farmer(_)));
}
