// crates/fieldscope-core/src/core/mod.rs
// ============================================================================
// Module: Fieldscope Core Model
// Description: Pure domain types and functions for scoped record aggregation.
// Purpose: Group identifiers, scope, records, normalization, filters, and stats.
// Dependencies: serde, serde_json, time
// ============================================================================

//! ## Overview
//! Everything under `core` is pure: no I/O, no wall-clock reads, no shared
//! state. The runtime layer feeds it store replies and a caller-supplied
//! clock.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod filter;
pub mod identifiers;
pub mod normalize;
pub mod records;
pub mod scope;
pub mod stats;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use filter::CategoryFilter;
pub use filter::DateRange;
pub use filter::ExtraFilters;
pub use filter::in_range;
pub use filter::working_set;
pub use identifiers::ActorId;
pub use identifiers::CollectionName;
pub use identifiers::PartitionName;
pub use identifiers::RecordId;
pub use identifiers::StorePath;
pub use normalize::normalize;
pub use records::AnimalEntry;
pub use records::AnimalHealthActivity;
pub use records::CanonicalRecord;
pub use records::CategoryField;
pub use records::CostItem;
pub use records::EntityKind;
pub use records::EntityRecord;
pub use records::Farmer;
pub use records::Gender;
pub use records::OfftakeTransaction;
pub use records::RecordMeta;
pub use records::RecordMetrics;
pub use records::RequisitionEntry;
pub use records::TrainingSession;
pub use scope::AccessScope;
pub use scope::ActorProfile;
pub use scope::ScopeResolver;
pub use stats::AggregationRequest;
pub use stats::BreakdownSpec;
pub use stats::CategoryBreakdown;
pub use stats::CategoryBucket;
pub use stats::FinancialSummary;
pub use stats::PricingConfig;
pub use stats::RankedEntry;
pub use stats::RankingSpec;
pub use stats::RecordMetric;
pub use stats::RevenueBasis;
pub use stats::ScalarStats;
pub use stats::StatisticsResult;
pub use stats::TrendGranularity;
pub use stats::TrendPoint;
pub use stats::TrendSeries;
pub use stats::TrendSpec;
pub use stats::aggregate;
pub use stats::aggregate_ranked;
pub use stats::compute_statistics;
pub use time::Clock;
pub use time::ManualClock;
pub use time::ResolvedTimestamp;
pub use time::SystemClock;
pub use time::TimestampSource;
