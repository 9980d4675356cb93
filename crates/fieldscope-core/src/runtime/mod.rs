// crates/fieldscope-core/src/runtime/mod.rs
// ============================================================================
// Module: Fieldscope Runtime
// Description: Fetch, cache, subscription, write, and settings plumbing.
// Purpose: Connect the pure core model to remote and local stores.
// Dependencies: crate::{core, interfaces}, futures, tokio
// ============================================================================

//! ## Overview
//! The runtime layer owns every side effect: store reads through
//! [`ScopedFetcher`], the scope-keyed [`ResultCache`], live subscriptions on
//! [`CollectionHub`], writes through [`CollectionWriter`], the actor scope on
//! [`ProfileWatcher`], and pricing settings. Structured events are emitted to
//! a [`DataEventSink`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod cache;
pub mod events;
pub mod fetcher;
pub mod hub;
pub mod profile_watch;
pub mod settings;
pub mod store;
pub mod tree;
pub mod writer;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use cache::CacheKey;
pub use cache::CacheLookup;
pub use cache::DEFAULT_CACHE_TTL;
pub use cache::ResultCache;
pub use events::DataEvent;
pub use events::DataEventKind;
pub use events::DataEventSink;
pub use events::FileEventSink;
pub use events::MemoryEventSink;
pub use events::NoopEventSink;
pub use events::StderrEventSink;
pub use fetcher::CollectionSpec;
pub use fetcher::DEFAULT_PARTITION_FIELD;
pub use fetcher::FetchIssue;
pub use fetcher::FetchOutcome;
pub use fetcher::FetchStatus;
pub use fetcher::ScopedFetcher;
pub use hub::CollectionHub;
pub use hub::CollectionSnapshot;
pub use hub::MAX_COMMIT_ATTEMPTS;
pub use hub::ScopedCollection;
pub use profile_watch::DEFAULT_PROFILE_ROOT;
pub use profile_watch::ProfileWatcher;
pub use settings::PRICING_SETTINGS_KEY;
pub use settings::load_pricing;
pub use settings::save_pricing;
pub use store::InMemoryRemoteStore;
pub use store::InMemorySettingsStore;
pub use store::ReadGate;
pub use store::StoreQuery;
pub use writer::CollectionWriter;
