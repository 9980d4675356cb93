// crates/fieldscope-core/src/runtime/fetcher.rs
// ============================================================================
// Module: Fieldscope Scoped Collection Fetcher
// Description: Scope-aware collection reads merged into canonical records.
// Purpose: Fan out one equality read per partition and merge the replies.
// Dependencies: crate::{core, interfaces}, futures, serde
// ============================================================================

//! ## Overview
//! [`ScopedFetcher::fetch`] turns a collection and an access scope into store
//! reads:
//! - unrestricted scopes issue a single unfiltered read,
//! - partition scopes issue one equality read per partition, concurrently,
//! - the empty scope returns immediately without touching the store.
//!
//! Partition replies are joined without fail-fast, concatenated, deduplicated
//! by record id (last reply wins), and normalized. One failing partition
//! yields a partial outcome rather than aborting the others. No retries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::CollectionName;
use crate::core::identifiers::PartitionName;
use crate::core::identifiers::RecordId;
use crate::core::identifiers::StorePath;
use crate::core::records::EntityRecord;
use crate::core::scope::AccessScope;
use crate::core::time::Clock;
use crate::interfaces::RemoteStore;
use crate::interfaces::StoreError;
use crate::runtime::events::DataEvent;
use crate::runtime::events::DataEventKind;
use crate::runtime::events::DataEventSink;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default child field holding a record's partition tag.
pub const DEFAULT_PARTITION_FIELD: &str = "programme";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Where a collection lives and how it is partitioned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    /// Logical collection name.
    pub name: CollectionName,
    /// Store path of the collection subtree.
    pub path: StorePath,
    /// Child field compared by partition equality reads.
    pub partition_field: String,
}

impl CollectionSpec {
    /// Creates a spec stored at the path named after the collection.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = CollectionName::new(name);
        Self {
            path: StorePath::from(&name),
            name,
            partition_field: DEFAULT_PARTITION_FIELD.to_string(),
        }
    }

    /// Overrides the store path.
    #[must_use]
    pub fn with_path(mut self, path: impl AsRef<str>) -> Self {
        self.path = StorePath::new(path);
        self
    }

    /// Overrides the partition field.
    #[must_use]
    pub fn with_partition_field(mut self, field: impl Into<String>) -> Self {
        self.partition_field = field.into();
        self
    }
}

/// Completeness of a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    /// Every read succeeded.
    Complete,
    /// Some partition reads failed; records cover the rest.
    Partial,
    /// Every read failed; records are empty.
    Failed,
}

impl FetchStatus {
    /// Returns a stable label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

/// Non-fatal read failure carried in outcomes and snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchIssue {
    /// Partition whose read failed; `None` for the unfiltered read.
    pub partition: Option<PartitionName>,
    /// Failure description.
    pub message: String,
}

impl FetchIssue {
    /// Builds an issue from a store error.
    #[must_use]
    pub fn from_error(partition: Option<PartitionName>, error: &StoreError) -> Self {
        Self {
            partition,
            message: error.to_string(),
        }
    }
}

/// Result of a scoped fetch.
#[derive(Debug, Clone)]
pub struct FetchOutcome<R> {
    /// Deduplicated canonical records.
    pub records: Vec<R>,
    /// Completeness.
    pub status: FetchStatus,
    /// Failed reads.
    pub issues: Vec<FetchIssue>,
    /// Store reads issued.
    pub reads: usize,
}

impl<R> FetchOutcome<R> {
    /// Returns an empty complete outcome.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            records: Vec::new(),
            status: FetchStatus::Complete,
            issues: Vec::new(),
            reads: 0,
        }
    }

    /// Returns true when every read succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == FetchStatus::Complete
    }

    /// Returns the partitions whose read failed.
    #[must_use]
    pub fn failed_partitions(&self) -> Vec<&PartitionName> {
        self.issues.iter().filter_map(|issue| issue.partition.as_ref()).collect()
    }
}

// ============================================================================
// SECTION: Fetcher
// ============================================================================

/// Scope-aware collection fetcher.
#[derive(Clone)]
pub struct ScopedFetcher {
    /// Remote store.
    store: Arc<dyn RemoteStore>,
    /// Clock supplying "now" for timestamp fallbacks and latency.
    clock: Arc<dyn Clock>,
    /// Event sink.
    events: Arc<dyn DataEventSink>,
}

impl ScopedFetcher {
    /// Creates a fetcher over `store`.
    #[must_use]
    pub fn new(
        store: Arc<dyn RemoteStore>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn DataEventSink>,
    ) -> Self {
        Self {
            store,
            clock,
            events,
        }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    /// Fetches `spec` under `scope` and normalizes the replies.
    pub async fn fetch<R: EntityRecord>(
        &self,
        spec: &CollectionSpec,
        scope: &AccessScope,
    ) -> FetchOutcome<R> {
        let started = self.clock.instant();
        let replies: Vec<(Option<PartitionName>, Result<Value, StoreError>)> = match scope {
            AccessScope::Unrestricted => vec![(None, self.store.read(&spec.path).await)],
            AccessScope::Partitions(partitions) if partitions.is_empty() => Vec::new(),
            AccessScope::Partitions(partitions) => {
                let reads = partitions.iter().map(|partition| async move {
                    let reply = self
                        .store
                        .read_where(&spec.path, &spec.partition_field, partition.as_str())
                        .await;
                    (Some(partition.clone()), reply)
                });
                join_all(reads).await
            }
        };
        let outcome = self.merge(replies);
        let elapsed = self.clock.instant().saturating_duration_since(started);
        self.events.record(&DataEvent::now(DataEventKind::FetchCompleted {
            collection: spec.name.to_string(),
            scope: scope.cache_key(),
            status: outcome.status.as_str(),
            records: outcome.records.len(),
            reads: outcome.reads,
            failed_partitions: outcome
                .failed_partitions()
                .into_iter()
                .map(ToString::to_string)
                .collect(),
            latency_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }));
        outcome
    }

    /// Merges replies in arrival order, deduplicating by record id.
    fn merge<R: EntityRecord>(
        &self,
        replies: Vec<(Option<PartitionName>, Result<Value, StoreError>)>,
    ) -> FetchOutcome<R> {
        if replies.is_empty() {
            return FetchOutcome::empty();
        }
        let now = self.clock.now_utc();
        let reads = replies.len();
        let mut records: Vec<R> = Vec::new();
        let mut positions: HashMap<RecordId, usize> = HashMap::new();
        let mut issues = Vec::new();
        for (partition, reply) in replies {
            let subtree = match reply {
                Ok(subtree) => subtree,
                Err(error) => {
                    issues.push(FetchIssue::from_error(partition, &error));
                    continue;
                }
            };
            for (id, raw) in children(&subtree) {
                let record = R::from_raw(id.clone(), raw, now);
                match positions.get(&id) {
                    Some(position) => {
                        if let Some(slot) = records.get_mut(*position) {
                            *slot = record;
                        }
                    }
                    None => {
                        positions.insert(id, records.len());
                        records.push(record);
                    }
                }
            }
        }
        let status = if issues.is_empty() {
            FetchStatus::Complete
        } else if issues.len() == reads {
            FetchStatus::Failed
        } else {
            FetchStatus::Partial
        };
        FetchOutcome {
            records,
            status,
            issues,
            reads,
        }
    }
}

/// Iterates the record children of a collection subtree.
///
/// Objects yield their object-valued children keyed by child id; arrays yield
/// object entries keyed by index. Everything else, including `null`, is empty.
fn children(subtree: &Value) -> Vec<(RecordId, &Value)> {
    match subtree {
        Value::Object(map) => map
            .iter()
            .filter(|(key, child)| child.is_object() && !key.trim().is_empty())
            .map(|(key, child)| (RecordId::new(key.clone()), child))
            .collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .filter(|(_, child)| child.is_object())
            .map(|(index, child)| (RecordId::new(index.to_string()), child))
            .collect(),
        _ => Vec::new(),
    }
}
