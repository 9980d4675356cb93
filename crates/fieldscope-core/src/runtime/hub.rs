// crates/fieldscope-core/src/runtime/hub.rs
// ============================================================================
// Module: Fieldscope Collection Hub
// Description: Subscription surface for scoped collections.
// Purpose: Serve cached placeholders, refresh in the background, and publish.
// Dependencies: crate::{core, runtime}, tokio
// ============================================================================

//! ## Overview
//! [`CollectionHub::subscribe`] returns a [`ScopedCollection`] handle that
//! publishes [`CollectionSnapshot`] values over a watch channel. Subscribing
//! consults the [`ResultCache`] synchronously: a fresh entry is served as is,
//! a stale entry is served as a placeholder while a refresh runs, and a miss
//! publishes an empty loading snapshot while a refresh runs.
//!
//! ## Invariants
//! - A reply is published only if the subscription's generation is unchanged
//!   (no scope change since the fetch started) and someone is still listening.
//! - A reply is cached only if the collection's invalidation epoch is
//!   unchanged; otherwise it is discarded and the collection is fetched again.
//! - Only complete outcomes are cached.
//! - The empty scope never touches the store and publishes `access_denied`.
//! - A refresh that cannot be scheduled (no tokio runtime) ends loading and
//!   publishes an error instead of leaving the snapshot loading.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::Weak;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core::identifiers::CollectionName;
use crate::core::records::EntityRecord;
use crate::core::scope::AccessScope;
use crate::core::time::Clock;
use crate::interfaces::RemoteStore;
use crate::runtime::cache::CacheKey;
use crate::runtime::cache::CacheLookup;
use crate::runtime::cache::ResultCache;
use crate::runtime::events::DataEvent;
use crate::runtime::events::DataEventKind;
use crate::runtime::events::DataEventSink;
use crate::runtime::fetcher::CollectionSpec;
use crate::runtime::fetcher::FetchIssue;
use crate::runtime::fetcher::FetchOutcome;
use crate::runtime::fetcher::FetchStatus;
use crate::runtime::fetcher::ScopedFetcher;
use crate::runtime::writer::CollectionWriter;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Fetch attempts per refresh when replies keep racing invalidations.
pub const MAX_COMMIT_ATTEMPTS: usize = 3;

/// Error published when a refresh cannot be scheduled.
const NO_RUNTIME_MESSAGE: &str = "no async runtime available to refresh the collection";

// ============================================================================
// SECTION: Snapshots
// ============================================================================

/// Published state of a scoped collection.
#[derive(Debug, Clone)]
pub struct CollectionSnapshot<R> {
    /// Current records (possibly a stale placeholder).
    pub records: Arc<Vec<R>>,
    /// Records come from an expired cache entry or survived a failed refresh.
    pub is_stale: bool,
    /// A refresh is in flight.
    pub is_loading: bool,
    /// Some partition reads failed; records are incomplete.
    pub is_incomplete: bool,
    /// The scope grants no readable data.
    pub access_denied: bool,
    /// Set when the last refresh failed entirely.
    pub error: Option<FetchIssue>,
    /// Failed reads of the last refresh.
    pub issues: Vec<FetchIssue>,
}

impl<R> CollectionSnapshot<R> {
    /// Builds a snapshot with the given records and no flags set.
    fn with_records(records: Arc<Vec<R>>) -> Self {
        Self {
            records,
            is_stale: false,
            is_loading: false,
            is_incomplete: false,
            access_denied: false,
            error: None,
            issues: Vec::new(),
        }
    }

    /// Builds the access-denied snapshot.
    fn denied() -> Self {
        Self {
            access_denied: true,
            ..Self::with_records(Arc::new(Vec::new()))
        }
    }
}

// ============================================================================
// SECTION: Hub
// ============================================================================

/// Subscription that can be told its collection was invalidated.
trait InvalidationListener: Send + Sync {
    /// Collection the subscription reads.
    fn collection(&self) -> &CollectionName;

    /// Starts a refresh after the collection was invalidated.
    fn on_invalidated(self: Arc<Self>);
}

/// Shared hub state.
pub(crate) struct HubInner {
    /// Scoped fetcher over the remote store.
    fetcher: ScopedFetcher,
    /// Result cache.
    cache: Arc<ResultCache>,
    /// Clock shared with the fetcher.
    clock: Arc<dyn Clock>,
    /// Event sink.
    events: Arc<dyn DataEventSink>,
    /// Registered collection specs.
    collections: Mutex<BTreeMap<CollectionName, CollectionSpec>>,
    /// Live subscriptions notified on invalidation.
    listeners: Mutex<Vec<Weak<dyn InvalidationListener>>>,
}

impl HubInner {
    /// Returns the remote store.
    pub(crate) fn store(&self) -> &Arc<dyn RemoteStore> {
        self.fetcher.store()
    }

    /// Returns the clock.
    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Returns the event sink.
    pub(crate) fn events(&self) -> &Arc<dyn DataEventSink> {
        &self.events
    }

    /// Returns the registered spec for `name`, or the default spec.
    pub(crate) fn spec(&self, name: &CollectionName) -> CollectionSpec {
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .unwrap_or_else(|| CollectionSpec::new(name.as_str()))
    }

    /// Invalidates `collection` and refreshes its live subscriptions.
    pub(crate) fn invalidate(&self, collection: &CollectionName) {
        let (entries_removed, epoch) = self.cache.invalidate(collection);
        self.events.record(&DataEvent::now(DataEventKind::CacheInvalidated {
            collection: collection.to_string(),
            entries_removed,
            epoch,
        }));
        let live: Vec<Arc<dyn InvalidationListener>> = {
            let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
            listeners.retain(|listener| listener.strong_count() > 0);
            listeners
                .iter()
                .filter_map(Weak::upgrade)
                .filter(|listener| listener.collection() == collection)
                .collect()
        };
        for listener in live {
            listener.on_invalidated();
        }
    }

    /// Registers a live subscription.
    fn listen(&self, listener: Weak<dyn InvalidationListener>) {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner).push(listener);
    }
}

/// Entry point for scoped collection subscriptions and writes.
#[derive(Clone)]
pub struct CollectionHub {
    /// Shared hub state.
    inner: Arc<HubInner>,
}

impl CollectionHub {
    /// Creates a hub over `store` sharing `cache`.
    #[must_use]
    pub fn new(
        store: Arc<dyn RemoteStore>,
        cache: Arc<ResultCache>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn DataEventSink>,
    ) -> Self {
        let fetcher = ScopedFetcher::new(store, Arc::clone(&clock), Arc::clone(&events));
        Self {
            inner: Arc::new(HubInner {
                fetcher,
                cache,
                clock,
                events,
                collections: Mutex::new(BTreeMap::new()),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Registers a collection spec; unregistered collections use defaults.
    pub fn register(&self, spec: CollectionSpec) {
        self.inner
            .collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(spec.name.clone(), spec);
    }

    /// Returns the collection spec registered for `name`.
    #[must_use]
    pub fn spec(&self, name: &CollectionName) -> CollectionSpec {
        self.inner.spec(name)
    }

    /// Returns the shared result cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.inner.cache
    }

    /// Returns the scoped fetcher.
    #[must_use]
    pub fn fetcher(&self) -> &ScopedFetcher {
        &self.inner.fetcher
    }

    /// Returns a writer that invalidates this hub's cache after each write.
    #[must_use]
    pub fn writer(&self) -> CollectionWriter {
        CollectionWriter::new(Arc::clone(&self.inner))
    }

    /// Invalidates every scope variant of `collection` and refreshes its live
    /// subscriptions.
    pub fn invalidate(&self, collection: &CollectionName) {
        self.inner.invalidate(collection);
    }

    /// Subscribes to `collection` under `scope`.
    ///
    /// The returned handle already holds the placeholder snapshot; a refresh
    /// is started on the current tokio runtime when one is needed.
    #[must_use]
    pub fn subscribe<R: EntityRecord>(
        &self,
        collection: impl Into<CollectionName>,
        scope: AccessScope,
    ) -> ScopedCollection<R> {
        let spec = self.inner.spec(&collection.into());
        let (sender, receiver) = watch::channel(CollectionSnapshot::denied());
        let shared = Arc::new(Subscription {
            hub: Arc::clone(&self.inner),
            spec,
            state: Mutex::new(SubscriptionState {
                scope: AccessScope::denied(),
                generation: 0,
            }),
            sender,
        });
        let listener = Arc::clone(&shared) as Arc<dyn InvalidationListener>;
        self.inner.listen(Arc::downgrade(&listener));
        shared.activate(scope);
        ScopedCollection {
            shared,
            receiver,
        }
    }
}

// ============================================================================
// SECTION: Subscription
// ============================================================================

/// Scope and generation of a subscription.
#[derive(Debug, Clone)]
struct SubscriptionState {
    /// Current access scope.
    scope: AccessScope,
    /// Bumped on every scope change.
    generation: u64,
}

/// Shared subscription state, owned by the handle and in-flight refreshes.
struct Subscription<R> {
    /// Hub state.
    hub: Arc<HubInner>,
    /// Collection spec.
    spec: CollectionSpec,
    /// Scope and generation.
    state: Mutex<SubscriptionState>,
    /// Snapshot publisher.
    sender: watch::Sender<CollectionSnapshot<R>>,
}

impl<R: EntityRecord> Subscription<R> {
    /// Locks the subscription state.
    fn lock(&self) -> MutexGuard<'_, SubscriptionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the current scope and generation.
    fn current(&self) -> (AccessScope, u64) {
        let state = self.lock();
        (state.scope.clone(), state.generation)
    }

    /// Switches to `scope`, publishes the placeholder, and refreshes if needed.
    fn activate(self: &Arc<Self>, scope: AccessScope) {
        let key = CacheKey::new(self.spec.name.clone(), &scope);
        let mut state = self.lock();
        state.generation += 1;
        state.scope = scope.clone();
        let generation = state.generation;
        if scope.is_denied() {
            self.sender.send_replace(CollectionSnapshot::denied());
            return;
        }
        let lookup: CacheLookup<R> = self.hub.cache.get(&key);
        self.hub.events.record(&DataEvent::now(DataEventKind::CacheLookup {
            collection: self.spec.name.to_string(),
            scope: key.scope.clone(),
            outcome: lookup.label(),
        }));
        let needs_refresh = !lookup.is_fresh();
        let snapshot = match lookup {
            CacheLookup::Fresh(records) => CollectionSnapshot::with_records(records),
            CacheLookup::Stale(records) => CollectionSnapshot {
                is_stale: true,
                is_loading: true,
                ..CollectionSnapshot::with_records(records)
            },
            CacheLookup::Miss => CollectionSnapshot {
                is_loading: true,
                ..CollectionSnapshot::with_records(Arc::new(Vec::new()))
            },
        };
        self.sender.send_replace(snapshot);
        drop(state);
        if needs_refresh {
            self.spawn_refresh(generation, scope);
        }
    }

    /// Starts a background refresh on the current runtime.
    ///
    /// Returns false when no tokio runtime is available; the snapshot then
    /// stops loading and carries an error.
    fn spawn_refresh(self: &Arc<Self>, generation: u64, scope: AccessScope) -> bool {
        let Ok(handle) = Handle::try_current() else {
            self.publish_failure(
                generation,
                vec![FetchIssue {
                    partition: None,
                    message: NO_RUNTIME_MESSAGE.to_string(),
                }],
            );
            return false;
        };
        handle.spawn(Arc::clone(self).refresh(generation, scope));
        true
    }

    /// Returns why a reply for `generation` must be discarded, if it must.
    fn discard_reason(&self, generation: u64) -> Option<&'static str> {
        if self.lock().generation != generation {
            return Some("scope_changed");
        }
        if self.sender.receiver_count() == 0 {
            return Some("unsubscribed");
        }
        None
    }

    /// Records a discarded reply.
    fn discarded(&self, scope: &AccessScope, reason: &'static str) {
        self.hub.events.record(&DataEvent::now(DataEventKind::StaleReplyDiscarded {
            collection: self.spec.name.to_string(),
            scope: scope.cache_key(),
            reason,
        }));
    }

    /// Applies `update` to the published snapshot if `generation` is current.
    fn publish_if_current<F>(&self, generation: u64, update: F)
    where
        F: FnOnce(&mut CollectionSnapshot<R>),
    {
        let state = self.lock();
        if state.generation == generation {
            self.sender.send_modify(update);
        }
        drop(state);
    }

    /// Publishes a failed refresh, keeping any placeholder records as stale.
    fn publish_failure(&self, generation: u64, issues: Vec<FetchIssue>) {
        self.publish_if_current(generation, |snapshot| {
            snapshot.is_stale = !snapshot.records.is_empty();
            snapshot.is_loading = false;
            snapshot.is_incomplete = false;
            snapshot.error = issues.first().cloned();
            snapshot.issues = issues;
        });
    }

    /// Fetches, commits, and publishes one refresh for `generation`.
    async fn refresh(self: Arc<Self>, generation: u64, scope: AccessScope) {
        let key = CacheKey::new(self.spec.name.clone(), &scope);
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let epoch = self.hub.cache.epoch(&self.spec.name);
            let outcome: FetchOutcome<R> = self.hub.fetcher.fetch(&self.spec, &scope).await;
            if let Some(reason) = self.discard_reason(generation) {
                self.discarded(&scope, reason);
                return;
            }
            match outcome.status {
                FetchStatus::Failed => {
                    self.publish_failure(generation, outcome.issues);
                    return;
                }
                FetchStatus::Complete => {
                    let records = Arc::new(outcome.records);
                    if !self.hub.cache.put_if_current(key.clone(), Arc::clone(&records), epoch) {
                        self.discarded(&scope, "invalidated");
                        continue;
                    }
                    self.publish_if_current(generation, |snapshot| {
                        *snapshot = CollectionSnapshot::with_records(records);
                    });
                    return;
                }
                FetchStatus::Partial => {
                    if self.hub.cache.epoch(&self.spec.name) != epoch {
                        self.discarded(&scope, "invalidated");
                        continue;
                    }
                    let records = Arc::new(outcome.records);
                    let issues = outcome.issues;
                    self.publish_if_current(generation, |snapshot| {
                        *snapshot = CollectionSnapshot {
                            is_incomplete: true,
                            issues,
                            ..CollectionSnapshot::with_records(records)
                        };
                    });
                    return;
                }
            }
        }
        self.publish_failure(
            generation,
            vec![FetchIssue {
                partition: None,
                message: "collection was invalidated during every refresh attempt".to_string(),
            }],
        );
    }
}

impl<R: EntityRecord> InvalidationListener for Subscription<R> {
    fn collection(&self) -> &CollectionName {
        &self.spec.name
    }

    fn on_invalidated(self: Arc<Self>) {
        let (scope, generation) = self.current();
        if scope.is_denied() || self.sender.receiver_count() == 0 {
            return;
        }
        self.publish_if_current(generation, |snapshot| snapshot.is_loading = true);
        self.spawn_refresh(generation, scope);
    }
}

// ============================================================================
// SECTION: Handle
// ============================================================================

/// Subscription handle for one collection.
///
/// Dropping the handle stops publication: in-flight replies are discarded.
pub struct ScopedCollection<R: EntityRecord> {
    /// Shared subscription state.
    shared: Arc<Subscription<R>>,
    /// Snapshot receiver.
    receiver: watch::Receiver<CollectionSnapshot<R>>,
}

impl<R: EntityRecord> ScopedCollection<R> {
    /// Returns the collection name.
    #[must_use]
    pub fn collection(&self) -> &CollectionName {
        &self.shared.spec.name
    }

    /// Returns the current scope.
    #[must_use]
    pub fn scope(&self) -> AccessScope {
        self.shared.current().0
    }

    /// Returns the latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> CollectionSnapshot<R> {
        self.receiver.borrow().clone()
    }

    /// Returns an additional snapshot receiver.
    #[must_use]
    pub fn receiver(&self) -> watch::Receiver<CollectionSnapshot<R>> {
        self.receiver.clone()
    }

    /// Waits for the next published snapshot.
    ///
    /// Returns false when the publisher is gone.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }

    /// Waits until no refresh is in flight and returns that snapshot.
    pub async fn settled(&mut self) -> CollectionSnapshot<R> {
        let settled = self
            .receiver
            .wait_for(|snapshot| !snapshot.is_loading)
            .await
            .map(|snapshot| snapshot.clone());
        settled.unwrap_or_else(|_| self.snapshot())
    }

    /// Switches the subscription to `scope`.
    ///
    /// Replies still in flight for the previous scope are discarded.
    pub fn set_scope(&self, scope: AccessScope) {
        if self.shared.current().0 == scope {
            return;
        }
        self.shared.activate(scope);
    }

    /// Starts a background refresh (the retry affordance).
    ///
    /// Returns false when the scope is denied or no tokio runtime is available.
    pub fn refresh(&self) -> bool {
        let (scope, generation) = self.shared.current();
        if scope.is_denied() {
            return false;
        }
        self.shared.publish_if_current(generation, |snapshot| snapshot.is_loading = true);
        self.shared.spawn_refresh(generation, scope)
    }

    /// Refreshes inline and returns the resulting snapshot.
    pub async fn refresh_now(&self) -> CollectionSnapshot<R> {
        let (scope, generation) = self.shared.current();
        if !scope.is_denied() {
            self.shared.publish_if_current(generation, |snapshot| snapshot.is_loading = true);
            Arc::clone(&self.shared).refresh(generation, scope).await;
        }
        self.snapshot()
    }

    /// Follows scope updates published on `scopes`.
    ///
    /// The follower stops when the publisher or this subscription goes away.
    /// Returns `None` when no tokio runtime is available.
    #[must_use]
    pub fn follow_scope(&self, mut scopes: watch::Receiver<AccessScope>) -> Option<JoinHandle<()>> {
        let handle = Handle::try_current().ok()?;
        let weak = Arc::downgrade(&self.shared);
        let initial = scopes.borrow_and_update().clone();
        self.set_scope(initial);
        Some(handle.spawn(async move {
            while scopes.changed().await.is_ok() {
                let scope = scopes.borrow_and_update().clone();
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                if shared.current().0 != scope {
                    shared.activate(scope);
                }
            }
        }))
    }
}
