// crates/fieldscope-core/src/runtime/cache.rs
// ============================================================================
// Module: Fieldscope Result Cache
// Description: Process-lifetime cache of normalized collection snapshots.
// Purpose: Serve instant placeholders while a fresh fetch is in flight.
// Dependencies: crate::core, tokio
// ============================================================================

//! ## Overview
//! Entries are keyed by collection name and serialized access scope. A lookup
//! classifies the entry as fresh, stale, or missing against the TTL; stale
//! entries are still handed out as placeholders and are never proactively
//! deleted.
//!
//! ## Invariants
//! - [`ResultCache::invalidate`] is synchronous and removes every scope
//!   variant of the collection before it returns.
//! - Every invalidation bumps the collection's epoch; a commit guarded by an
//!   older epoch is refused, so a reply that raced a write is never cached.
//! - Lock sections never span an `.await`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::any::Any;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::time::Duration;
use std::time::Instant;

use crate::core::identifiers::CollectionName;
use crate::core::scope::AccessScope;
use crate::core::time::Clock;
use crate::core::time::SystemClock;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default time-to-live for cache entries.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

// ============================================================================
// SECTION: Keys and Lookups
// ============================================================================

/// Cache key: collection name plus serialized scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    /// Collection name.
    pub collection: CollectionName,
    /// Serialized scope key.
    pub scope: String,
}

impl CacheKey {
    /// Builds the key for a collection under an access scope.
    #[must_use]
    pub fn new(collection: CollectionName, scope: &AccessScope) -> Self {
        Self {
            collection,
            scope: scope.cache_key(),
        }
    }
}

/// Result of a cache lookup.
#[derive(Debug)]
pub enum CacheLookup<R> {
    /// Entry younger than the TTL.
    Fresh(Arc<Vec<R>>),
    /// Entry at or past the TTL; usable only as a placeholder.
    Stale(Arc<Vec<R>>),
    /// No entry for the key (or an entry of a different record type).
    Miss,
}

impl<R> CacheLookup<R> {
    /// Returns the cached records, fresh or stale.
    #[must_use]
    pub const fn records(&self) -> Option<&Arc<Vec<R>>> {
        match self {
            Self::Fresh(records) | Self::Stale(records) => Some(records),
            Self::Miss => None,
        }
    }

    /// Returns true for a fresh entry.
    #[must_use]
    pub const fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }

    /// Returns true when no entry was found.
    #[must_use]
    pub const fn is_miss(&self) -> bool {
        matches!(self, Self::Miss)
    }

    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Fresh(_) => "fresh",
            Self::Stale(_) => "stale",
            Self::Miss => "miss",
        }
    }
}

// ============================================================================
// SECTION: Cache
// ============================================================================

/// Cached snapshot with its capture instant.
struct CacheEntry {
    /// Type-erased `Vec<R>` snapshot.
    records: Arc<dyn Any + Send + Sync>,
    /// Instant the snapshot was captured.
    captured_at: Instant,
}

/// Mutable cache state guarded by one mutex.
#[derive(Default)]
struct CacheState {
    /// Entries by key.
    entries: HashMap<CacheKey, CacheEntry>,
    /// Invalidation epochs by collection.
    epochs: BTreeMap<CollectionName, u64>,
}

/// Process-lifetime result cache shared by the hub and writers.
pub struct ResultCache {
    /// Time-to-live for fresh entries.
    ttl: Duration,
    /// Clock used for capture instants and ages.
    clock: Arc<dyn Clock>,
    /// Entries and epochs.
    state: Mutex<CacheState>,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL, Arc::new(SystemClock))
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache").field("ttl", &self.ttl).field("len", &self.len()).finish()
    }
}

impl ResultCache {
    /// Creates a cache with the given TTL and clock.
    #[must_use]
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Returns the configured TTL.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Locks the cache state, recovering from poisoning.
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Looks up `key` and classifies the entry against the TTL.
    #[must_use]
    pub fn get<R>(&self, key: &CacheKey) -> CacheLookup<R>
    where
        R: Send + Sync + 'static,
    {
        let now = self.clock.instant();
        let (records, captured_at) = {
            let state = self.lock();
            let Some(entry) = state.entries.get(key) else {
                return CacheLookup::Miss;
            };
            (Arc::clone(&entry.records), entry.captured_at)
        };
        let Ok(records) = records.downcast::<Vec<R>>() else {
            return CacheLookup::Miss;
        };
        if now.saturating_duration_since(captured_at) < self.ttl {
            CacheLookup::Fresh(records)
        } else {
            CacheLookup::Stale(records)
        }
    }

    /// Stores a snapshot for `key` unconditionally.
    pub fn put<R>(&self, key: CacheKey, records: Arc<Vec<R>>)
    where
        R: Send + Sync + 'static,
    {
        let entry = CacheEntry {
            records,
            captured_at: self.clock.instant(),
        };
        self.lock().entries.insert(key, entry);
    }

    /// Stores a snapshot only if the collection epoch still equals `epoch`.
    ///
    /// Returns false (and stores nothing) when the collection was invalidated
    /// after `epoch` was read.
    #[must_use]
    pub fn put_if_current<R>(&self, key: CacheKey, records: Arc<Vec<R>>, epoch: u64) -> bool
    where
        R: Send + Sync + 'static,
    {
        let captured_at = self.clock.instant();
        let mut state = self.lock();
        let current = state.epochs.get(&key.collection).copied().unwrap_or(0);
        if current != epoch {
            return false;
        }
        state.entries.insert(
            key,
            CacheEntry {
                records,
                captured_at,
            },
        );
        true
    }

    /// Returns the current invalidation epoch of `collection`.
    #[must_use]
    pub fn epoch(&self, collection: &CollectionName) -> u64 {
        self.lock().epochs.get(collection).copied().unwrap_or(0)
    }

    /// Removes every scope variant of `collection` and bumps its epoch.
    ///
    /// Returns the number of removed entries and the new epoch.
    pub fn invalidate(&self, collection: &CollectionName) -> (usize, u64) {
        let mut state = self.lock();
        let before = state.entries.len();
        state.entries.retain(|key, _| key.collection != *collection);
        let removed = before - state.entries.len();
        let epoch = state.epochs.entry(collection.clone()).or_insert(0);
        *epoch += 1;
        (removed, *epoch)
    }

    /// Returns the number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns true when the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
