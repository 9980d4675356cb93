// crates/fieldscope-core/tests/profile_watch.rs
// ============================================================================
// Module: Profile Watcher Tests
// Description: Scope publication from stored and pushed actor profiles.
// Purpose: Validate change-only publication and fail-closed reads.
// Dependencies: fieldscope-core, serde_json, tokio
// ============================================================================

//! ## Overview
//! The watcher republishes the scope only when it changes, and keeps the
//! previous scope when the profile cannot be read.

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
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;

use fieldscope_core::core::identifiers::ActorId;
use fieldscope_core::core::identifiers::StorePath;
use fieldscope_core::core::scope::AccessScope;
use fieldscope_core::core::scope::ScopeResolver;
use fieldscope_core::runtime::DEFAULT_PROFILE_ROOT;
use fieldscope_core::runtime::InMemoryRemoteStore;
use fieldscope_core::runtime::MemoryEventSink;
use fieldscope_core::runtime::ProfileWatcher;
use serde_json::json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a watcher for actor `u1` over `store`.
fn watcher(store: &InMemoryRemoteStore) -> (ProfileWatcher, Arc<MemoryEventSink>) {
    let events = Arc::new(MemoryEventSink::new());
    let watcher = ProfileWatcher::new(
        Arc::new(store.clone()),
        ScopeResolver::default(),
        &StorePath::new(DEFAULT_PROFILE_ROOT),
        ActorId::new("u1"),
        events.clone(),
    );
    (watcher, events)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[tokio::test]
async fn scope_starts_denied_and_resolves_on_refresh() {
    let store = InMemoryRemoteStore::with_tree(json!({
        "users": {"u1": {"role": "field", "partitionFlags": {"KPMD": true, "RANGE": false}}}
    }));
    let (watcher, events) = watcher(&store);
    assert!(watcher.scope().is_denied());
    assert!(watcher.refresh().await.unwrap());
    assert_eq!(watcher.scope(), AccessScope::partitions(["KPMD"]));
    assert_eq!(watcher.profile().unwrap().role, "field");
    assert_eq!(events.names(), vec!["profile_resolved"]);
}

#[tokio::test]
async fn unchanged_scope_does_not_notify() {
    let store = InMemoryRemoteStore::with_tree(json!({
        "users": {"u1": {"role": "field", "partitionFlags": {"KPMD": true}}}
    }));
    let (watcher, _) = watcher(&store);
    let mut receiver = watcher.subscribe();
    assert!(watcher.refresh().await.unwrap());
    assert!(receiver.has_changed().unwrap());
    let _ = receiver.borrow_and_update();
    let renamed = json!({"role": "field", "partitionFlags": {"KPMD": true}, "name": "Amina"});
    assert!(!watcher.apply_profile(Some(&renamed)));
    assert!(!receiver.has_changed().unwrap());
}

#[tokio::test]
async fn promotion_publishes_unrestricted() {
    let store = InMemoryRemoteStore::new();
    let (watcher, _) = watcher(&store);
    let mut receiver = watcher.subscribe();
    assert!(watcher.apply_profile(Some(&json!({"role": "chief-admin"}))));
    assert!(receiver.has_changed().unwrap());
    assert_eq!(*receiver.borrow_and_update(), AccessScope::Unrestricted);
    assert!(watcher.apply_profile(None));
    assert!(watcher.scope().is_denied());
}

#[tokio::test]
async fn failed_read_keeps_previous_scope() {
    let store = InMemoryRemoteStore::with_tree(json!({
        "users": {"u1": {"role": "field", "partitionFlags": {"KPMD": true}}}
    }));
    let (watcher, _) = watcher(&store);
    watcher.refresh().await.unwrap();
    store.fail_path(&StorePath::new("users/u1"), "offline").unwrap();
    assert!(watcher.refresh().await.is_err());
    assert_eq!(watcher.scope(), AccessScope::partitions(["KPMD"]));
}

#[tokio::test]
async fn missing_profile_stays_denied() {
    let store = InMemoryRemoteStore::new();
    let (watcher, _) = watcher(&store);
    assert!(!watcher.refresh().await.unwrap());
    assert!(watcher.scope().is_denied());
    assert!(watcher.profile().is_none());
}
