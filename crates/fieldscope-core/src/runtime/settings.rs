// crates/fieldscope-core/src/runtime/settings.rs
// ============================================================================
// Module: Fieldscope Pricing Settings
// Description: Load and save pricing inputs through the settings store.
// Purpose: Keep pricing configuration durable and tolerant of malformed data.
// Dependencies: crate::{core, interfaces}, serde_json
// ============================================================================

//! ## Overview
//! Pricing inputs live as one JSON document under a fixed settings key.
//! Loading never fails on content: a missing key, unparsable JSON, or a
//! malformed field each yield zero for the affected values. Only backend I/O
//! errors propagate.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::core::normalize::coerce_number;
use crate::core::stats::PricingConfig;
use crate::interfaces::SettingsError;
use crate::interfaces::SettingsStore;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default settings key for pricing inputs.
pub const PRICING_SETTINGS_KEY: &str = "fieldscope.pricing";

/// Accepted spellings of the unit price field.
const UNIT_PRICE_KEYS: [&str; 3] = ["unit_price", "unitPrice", "pricePerKg"];

/// Accepted spellings of the operating expenses field.
const OPERATING_EXPENSES_KEYS: [&str; 3] =
    ["operating_expenses", "operatingExpenses", "operationalExpenses"];

// ============================================================================
// SECTION: Load / Save
// ============================================================================

/// Loads pricing inputs stored under `key`.
///
/// # Errors
///
/// Returns [`SettingsError`] when the settings backend cannot be read.
pub fn load_pricing(store: &dyn SettingsStore, key: &str) -> Result<PricingConfig, SettingsError> {
    let Some(raw) = store.get(key)? else {
        return Ok(PricingConfig::default());
    };
    let Ok(document) = serde_json::from_str::<Value>(&raw) else {
        return Ok(PricingConfig::default());
    };
    let pricing = PricingConfig {
        unit_price: field(&document, &UNIT_PRICE_KEYS),
        operating_expenses: field(&document, &OPERATING_EXPENSES_KEYS),
    };
    Ok(pricing.sanitized())
}

/// Saves pricing inputs under `key`.
///
/// # Errors
///
/// Returns [`SettingsError`] when encoding or the settings backend fails.
pub fn save_pricing(
    store: &dyn SettingsStore,
    key: &str,
    pricing: &PricingConfig,
) -> Result<(), SettingsError> {
    let encoded = serde_json::to_string(&pricing.sanitized())
        .map_err(|err| SettingsError::Encode(err.to_string()))?;
    store.set(key, &encoded)
}

/// Reads the first present alias as a number, or zero.
fn field(document: &Value, keys: &[&str]) -> f64 {
    keys.iter().find_map(|key| document.get(*key)).map_or(0.0, coerce_number)
}

