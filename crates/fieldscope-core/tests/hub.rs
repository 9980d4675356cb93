// crates/fieldscope-core/tests/hub.rs
// ============================================================================
// Module: Collection Hub Tests
// Description: Live subscriptions, cache reuse, and invalidation races.
// Purpose: Validate snapshot publication and stale-reply discarding.
// Dependencies: fieldscope-core, serde_json, tokio
// ============================================================================

//! ## Overview
//! Subscriptions publish placeholder snapshots first and refreshed snapshots
//! later. Replies that were issued before a scope change or an invalidation
//! never overwrite newer state.

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

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fieldscope_core::core::identifiers::CollectionName;
use fieldscope_core::core::identifiers::StorePath;
use fieldscope_core::core::records::Farmer;
use fieldscope_core::core::scope::AccessScope;
use fieldscope_core::interfaces::RemoteStore;
use fieldscope_core::interfaces::StoreError;
use fieldscope_core::interfaces::WriteOp;
use fieldscope_core::runtime::CacheKey;
use fieldscope_core::runtime::CollectionHub;
use fieldscope_core::runtime::CollectionSnapshot;
use fieldscope_core::runtime::InMemoryRemoteStore;
use fieldscope_core::runtime::MAX_COMMIT_ATTEMPTS;
use fieldscope_core::runtime::MemoryEventSink;
use fieldscope_core::runtime::ResultCache;
use fieldscope_core::runtime::ScopedCollection;
use serde_json::Value;
use serde_json::json;
use tokio::sync::watch;
use tokio::time::timeout;

use crate::common::hub_over;
use crate::common::manual_clock;
use crate::common::seeded_store;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Upper bound on any single wait in these tests.
const WAIT: Duration = Duration::from_secs(5);

/// Waits until a published snapshot satisfies `predicate`.
async fn wait_until<F>(collection: &ScopedCollection<Farmer>, predicate: F) -> CollectionSnapshot<Farmer>
where
    F: Fn(&CollectionSnapshot<Farmer>) -> bool,
{
    let mut receiver = collection.receiver();
    let snapshot = timeout(WAIT, receiver.wait_for(|snapshot| predicate(snapshot)))
        .await
        .expect("snapshot wait timed out")
        .expect("publisher dropped")
        .clone();
    snapshot
}

/// Polls the event sink until `name` appears.
async fn wait_for_event(events: &MemoryEventSink, name: &str) -> bool {
    for _ in 0..100 {
        if events.names().iter().any(|event| *event == name) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Returns sorted record ids of a snapshot.
fn ids(snapshot: &CollectionSnapshot<Farmer>) -> Vec<String> {
    let mut ids: Vec<String> = snapshot.records.iter().map(|record| record.meta.id.to_string()).collect();
    ids.sort();
    ids
}

/// Store that invalidates its collection while every read is in flight.
struct InvalidatingStore {
    /// Backing store.
    inner: InMemoryRemoteStore,
    /// Cache shared with the hub under test.
    cache: Arc<ResultCache>,
    /// Collection invalidated on every read.
    collection: CollectionName,
}

#[async_trait]
impl RemoteStore for InvalidatingStore {
    async fn read(&self, path: &StorePath) -> Result<Value, StoreError> {
        let reply = self.inner.read(path).await;
        self.cache.invalidate(&self.collection);
        reply
    }

    async fn read_where(
        &self,
        path: &StorePath,
        field: &str,
        value: &str,
    ) -> Result<Value, StoreError> {
        let reply = self.inner.read_where(path, field, value).await;
        self.cache.invalidate(&self.collection);
        reply
    }

    async fn write(&self, path: &StorePath, op: WriteOp) -> Result<(), StoreError> {
        self.inner.write(path, op).await
    }
}

// ============================================================================
// SECTION: Subscriptions
// ============================================================================

#[tokio::test]
async fn miss_publishes_loading_then_records() {
    let fixture = hub_over(seeded_store(), Duration::from_secs(60));
    let mut farmers: ScopedCollection<Farmer> =
        fixture.hub.subscribe("farmers", AccessScope::partitions(["KPMD"]));
    let settled = timeout(WAIT, farmers.settled()).await.unwrap();
    assert_eq!(ids(&settled), vec!["f1", "f2"]);
    assert!(!settled.is_stale);
    assert!(settled.error.is_none());
    let names = fixture.events.names();
    assert_eq!(names.first(), Some(&"cache_lookup"));
    assert!(names.contains(&"fetch_completed"));
}

#[tokio::test]
async fn denied_scope_publishes_without_reading() {
    let fixture = hub_over(seeded_store(), Duration::from_secs(60));
    let farmers: ScopedCollection<Farmer> = fixture.hub.subscribe("farmers", AccessScope::denied());
    let snapshot = farmers.snapshot();
    assert!(snapshot.access_denied);
    assert!(snapshot.records.is_empty());
    assert!(!farmers.refresh());
    tokio::task::yield_now().await;
    assert_eq!(fixture.store.read_count().unwrap(), 0);
}

#[tokio::test]
async fn fresh_cache_entry_skips_the_store() {
    let fixture = hub_over(seeded_store(), Duration::from_secs(60));
    let mut first: ScopedCollection<Farmer> = fixture.hub.subscribe("farmers", AccessScope::Unrestricted);
    timeout(WAIT, first.settled()).await.unwrap();
    let reads = fixture.store.read_count().unwrap();
    let second: ScopedCollection<Farmer> = fixture.hub.subscribe("farmers", AccessScope::Unrestricted);
    let snapshot = second.snapshot();
    assert!(!snapshot.is_loading);
    assert_eq!(snapshot.records.len(), 3);
    assert_eq!(fixture.store.read_count().unwrap(), reads);
}

#[tokio::test]
async fn expired_entry_is_served_stale_while_refreshing() {
    let fixture = hub_over(seeded_store(), Duration::from_secs(60));
    let mut first: ScopedCollection<Farmer> = fixture.hub.subscribe("farmers", AccessScope::Unrestricted);
    timeout(WAIT, first.settled()).await.unwrap();
    fixture.clock.advance(Duration::from_secs(120));
    let gate = fixture.store.hold_reads().unwrap();
    let mut second: ScopedCollection<Farmer> = fixture.hub.subscribe("farmers", AccessScope::Unrestricted);
    let placeholder = second.snapshot();
    assert!(placeholder.is_stale);
    assert!(placeholder.is_loading);
    assert_eq!(placeholder.records.len(), 3);
    gate.open();
    let settled = timeout(WAIT, second.settled()).await.unwrap();
    assert!(!settled.is_stale);
}

// ============================================================================
// SECTION: Failures
// ============================================================================

#[tokio::test]
async fn partial_failure_is_flagged_incomplete() {
    let store = seeded_store();
    store.fail_partition("RANGE", "timeout").unwrap();
    let fixture = hub_over(store, Duration::from_secs(60));
    let mut farmers: ScopedCollection<Farmer> =
        fixture.hub.subscribe("farmers", AccessScope::partitions(["KPMD", "RANGE"]));
    let settled = timeout(WAIT, farmers.settled()).await.unwrap();
    assert!(settled.is_incomplete);
    assert_eq!(settled.records.len(), 2);
    assert_eq!(settled.issues.len(), 1);
    assert!(fixture.hub.cache().is_empty());
}

#[tokio::test]
async fn total_failure_sets_error_and_retry_recovers() {
    let store = seeded_store();
    store.fail_path(&StorePath::new("farmers"), "offline").unwrap();
    let fixture = hub_over(store, Duration::from_secs(60));
    let mut farmers: ScopedCollection<Farmer> = fixture.hub.subscribe("farmers", AccessScope::Unrestricted);
    let failed = timeout(WAIT, farmers.settled()).await.unwrap();
    assert!(failed.error.is_some());
    assert!(failed.records.is_empty());
    fixture.store.clear_failures().unwrap();
    let recovered = timeout(WAIT, farmers.refresh_now()).await.unwrap();
    assert!(recovered.error.is_none());
    assert_eq!(recovered.records.len(), 3);
}

// ============================================================================
// SECTION: Races
// ============================================================================

#[tokio::test]
async fn reply_racing_a_write_is_not_cached() {
    let fixture = hub_over(seeded_store(), Duration::from_secs(60));
    let gate = fixture.store.hold_reads().unwrap();
    let farmers: ScopedCollection<Farmer> = fixture.hub.subscribe("farmers", AccessScope::Unrestricted);
    tokio::task::yield_now().await;
    fixture
        .hub
        .writer()
        .replace(
            &CollectionName::new("farmers"),
            &"f4".into(),
            json!({"name": "Dida", "programme": "KPMD"}),
        )
        .await
        .unwrap();
    gate.open();
    let settled = wait_until(&farmers, |snapshot| snapshot.records.len() == 4).await;
    assert_eq!(ids(&settled), vec!["f1", "f2", "f3", "f4"]);
    let key = CacheKey::new(CollectionName::new("farmers"), &AccessScope::Unrestricted);
    let cached = fixture.hub.cache().get::<Farmer>(&key);
    assert_eq!(cached.records().map(|records| records.len()), Some(4));
}

#[tokio::test]
async fn scope_change_discards_in_flight_reply() {
    let fixture = hub_over(seeded_store(), Duration::from_secs(60));
    let gate = fixture.store.hold_reads().unwrap();
    let mut farmers: ScopedCollection<Farmer> =
        fixture.hub.subscribe("farmers", AccessScope::partitions(["RANGE"]));
    tokio::task::yield_now().await;
    farmers.set_scope(AccessScope::partitions(["KPMD"]));
    gate.open();
    let settled = timeout(WAIT, farmers.settled()).await.unwrap();
    assert_eq!(ids(&settled), vec!["f1", "f2"]);
    assert_eq!(farmers.scope(), AccessScope::partitions(["KPMD"]));
    let discarded = wait_for_event(&fixture.events, "stale_reply_discarded").await;
    assert!(discarded);
}

#[tokio::test]
async fn follow_scope_tracks_profile_updates() {
    let fixture = hub_over(seeded_store(), Duration::from_secs(60));
    let (sender, receiver) = watch::channel(AccessScope::partitions(["RANGE"]));
    let farmers: ScopedCollection<Farmer> = fixture.hub.subscribe("farmers", AccessScope::denied());
    let follower = farmers.follow_scope(receiver).unwrap();
    let range = wait_until(&farmers, |snapshot| !snapshot.is_loading && snapshot.records.len() == 1).await;
    assert_eq!(ids(&range), vec!["f3"]);
    sender.send(AccessScope::Unrestricted).unwrap();
    let all = wait_until(&farmers, |snapshot| !snapshot.is_loading && snapshot.records.len() == 3).await;
    assert_eq!(all.records.len(), 3);
    drop(sender);
    timeout(WAIT, follower).await.unwrap().unwrap();
}

#[tokio::test]
async fn invalidation_refreshes_live_subscriptions() {
    let fixture = hub_over(seeded_store(), Duration::from_secs(60));
    let mut farmers: ScopedCollection<Farmer> = fixture.hub.subscribe("farmers", AccessScope::Unrestricted);
    timeout(WAIT, farmers.settled()).await.unwrap();
    fixture.store.seed(&StorePath::new("farmers/f9"), json!({"name": "Ekai"})).unwrap();
    fixture.hub.invalidate(&CollectionName::new("farmers"));
    let refreshed = wait_until(&farmers, |snapshot| snapshot.records.len() == 4).await;
    assert!(!refreshed.is_loading);
}

#[tokio::test]
async fn refresh_gives_up_after_repeated_invalidations() {
    let clock = manual_clock();
    let events = Arc::new(MemoryEventSink::new());
    let cache = Arc::new(ResultCache::new(Duration::from_secs(60), clock.clone()));
    let inner = seeded_store();
    let store = InvalidatingStore {
        inner: inner.clone(),
        cache: Arc::clone(&cache),
        collection: CollectionName::new("farmers"),
    };
    let hub = CollectionHub::new(Arc::new(store), Arc::clone(&cache), clock, events.clone());
    let mut farmers: ScopedCollection<Farmer> = hub.subscribe("farmers", AccessScope::Unrestricted);
    let settled = timeout(WAIT, farmers.settled()).await.unwrap();
    let error = settled.error.expect("exhausted commit attempts publish an error");
    assert!(error.message.contains("invalidated during every refresh attempt"));
    assert!(settled.records.is_empty());
    assert!(!settled.is_stale);
    assert!(cache.is_empty());
    assert_eq!(inner.read_count().unwrap(), MAX_COMMIT_ATTEMPTS);
    let discarded =
        events.names().into_iter().filter(|name| *name == "stale_reply_discarded").count();
    assert_eq!(discarded, MAX_COMMIT_ATTEMPTS);
}

// ============================================================================
// SECTION: Runtime Availability
// ============================================================================

#[test]
fn subscribing_without_a_runtime_reports_an_error() {
    let fixture = hub_over(seeded_store(), Duration::from_secs(60));
    let mut farmers: ScopedCollection<Farmer> = fixture.hub.subscribe("farmers", AccessScope::Unrestricted);
    let snapshot = farmers.snapshot();
    assert!(!snapshot.is_loading);
    assert!(snapshot.records.is_empty());
    let error = snapshot.error.expect("unscheduled refresh publishes an error");
    assert!(error.message.contains("no async runtime"));
    assert!(!farmers.refresh());
    let settled = futures::executor::block_on(farmers.settled());
    assert!(!settled.is_loading);
    assert!(settled.error.is_some());
    assert_eq!(fixture.store.read_count().unwrap(), 0);
}
