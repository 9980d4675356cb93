// crates/fieldscope-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Shared fixtures for fieldscope-core integration tests.
// Purpose: Provide seeded stores, hubs, and timestamps for runtime tests.
// Dependencies: fieldscope-core, serde_json, time
// ============================================================================

//! ## Overview
//! Provides seeded in-memory stores and hub builders shared across the
//! fetcher, cache, hub, and writer tests.

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
    dead_code,
    reason = "Test-only helpers; not every test binary uses every helper."
)]

use std::sync::Arc;
use std::time::Duration;

use fieldscope_core::core::time::ManualClock;
use fieldscope_core::runtime::CollectionHub;
use fieldscope_core::runtime::InMemoryRemoteStore;
use fieldscope_core::runtime::MemoryEventSink;
use fieldscope_core::runtime::ResultCache;
use serde_json::Value;
use serde_json::json;
use time::OffsetDateTime;
use time::macros::datetime;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Fixed wall-clock time used by test clocks.
pub const TEST_NOW: OffsetDateTime = datetime!(2024-06-01 12:00 UTC);

/// Farmers collection with two KPMD records and one RANGE record.
pub fn farmers_tree() -> Value {
    json!({
        "farmers": {
            "f1": {
                "name": "Amina Lekishon",
                "gender": "F",
                "programme": "KPMD",
                "county": "Kajiado",
                "cattle": 12,
                "registrationDate": "2024-03-02"
            },
            "f2": {
                "name": "Baraka Sironka",
                "gender": "m",
                "programme": "KPMD",
                "Region": "Narok",
                "goats": "7",
                "registrationDate": "2024-04-10"
            },
            "f3": {
                "name": "Chebet Lomuria",
                "gender": "female",
                "programme": "RANGE",
                "county": "Turkana",
                "sheep": 30,
                "registrationDate": "2023-11-20"
            }
        }
    })
}

/// Returns a store seeded with [`farmers_tree`].
pub fn seeded_store() -> InMemoryRemoteStore {
    InMemoryRemoteStore::with_tree(farmers_tree())
}

/// Returns a manual clock set to [`TEST_NOW`].
pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(TEST_NOW))
}

/// Hub wiring returned by [`hub_over`].
pub struct HubFixture {
    /// Hub under test.
    pub hub: CollectionHub,
    /// Backing store.
    pub store: InMemoryRemoteStore,
    /// Shared clock.
    pub clock: Arc<ManualClock>,
    /// Recorded events.
    pub events: Arc<MemoryEventSink>,
}

/// Builds a hub over `store` with a manual clock and a memory event sink.
pub fn hub_over(store: InMemoryRemoteStore, ttl: Duration) -> HubFixture {
    let clock = manual_clock();
    let events = Arc::new(MemoryEventSink::new());
    let cache = Arc::new(ResultCache::new(ttl, clock.clone()));
    let hub = CollectionHub::new(Arc::new(store.clone()), cache, clock.clone(), events.clone());
    HubFixture {
        hub,
        store,
        clock,
        events,
    }
}
