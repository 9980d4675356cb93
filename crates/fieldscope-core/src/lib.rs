// crates/fieldscope-core/src/lib.rs
// ============================================================================
// Module: Fieldscope Core
// Description: Scope-aware field data access and statistics engine.
// Purpose: Fetch, cache, filter, and aggregate programme field records.
// Dependencies: serde, serde_json, time, tokio, futures, async-trait
// ============================================================================

//! ## Overview
//! Fieldscope reads partitioned field records (farmers, trainings, offtake
//! transactions, requisitions, animal health activities) from a hierarchical
//! JSON store, restricted to the partitions an actor may see. Records are
//! normalized into canonical shapes, cached per access scope, and aggregated
//! into scalar, financial, trend, breakdown, and ranking statistics.
//! Invariants:
//! - An actor with an empty scope never triggers a store read.
//! - Partitioned scopes issue exactly one equality read per partition.
//! - Statistics never contain NaN or infinity.
//! - Writes invalidate the touched collection before they return.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::AccessScope;
pub use crate::core::ActorId;
pub use crate::core::ActorProfile;
pub use crate::core::AggregationRequest;
pub use crate::core::CanonicalRecord;
pub use crate::core::Clock;
pub use crate::core::CollectionName;
pub use crate::core::DateRange;
pub use crate::core::EntityKind;
pub use crate::core::EntityRecord;
pub use crate::core::ExtraFilters;
pub use crate::core::PartitionName;
pub use crate::core::PricingConfig;
pub use crate::core::RecordId;
pub use crate::core::ScopeResolver;
pub use crate::core::StatisticsResult;
pub use crate::core::StorePath;
pub use crate::core::SystemClock;
pub use crate::core::aggregate;
pub use crate::core::aggregate_ranked;
pub use crate::core::compute_statistics;
pub use crate::core::in_range;
pub use crate::core::normalize;
pub use crate::core::working_set;
pub use interfaces::RemoteStore;
pub use interfaces::SettingsError;
pub use interfaces::SettingsStore;
pub use interfaces::StoreError;
pub use interfaces::WriteOp;
pub use runtime::CollectionHub;
pub use runtime::CollectionSnapshot;
pub use runtime::CollectionSpec;
pub use runtime::CollectionWriter;
pub use runtime::DataEventSink;
pub use runtime::ProfileWatcher;
pub use runtime::ResultCache;
pub use runtime::ScopedCollection;
pub use runtime::ScopedFetcher;

#[cfg(test)]
mod tests;
