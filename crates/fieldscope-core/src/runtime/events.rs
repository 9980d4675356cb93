// crates/fieldscope-core/src/runtime/events.rs
// ============================================================================
// Module: Fieldscope Data Events
// Description: Structured data-path events and JSON-line sinks.
// Purpose: Log fetches, cache activity, invalidations, and writes without payloads.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Runtime components report what they did through a [`DataEventSink`].
//! Events carry collection names, scope keys, counts, and outcomes; they never
//! carry record payloads. Sinks are lightweight so hosts can route events into
//! their own logging pipeline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Data-path event payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataEvent {
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Event details, tagged by event name.
    #[serde(flatten)]
    pub kind: DataEventKind,
}

impl DataEvent {
    /// Creates an event stamped with the current system time.
    #[must_use]
    pub fn now(kind: DataEventKind) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_millis());
        Self {
            timestamp_ms,
            kind,
        }
    }

    /// Returns the stable event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Data-path event details.
///
/// # Invariants
/// - Variants are stable for log consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DataEventKind {
    /// A scoped collection fetch finished.
    FetchCompleted {
        /// Collection name.
        collection: String,
        /// Serialized scope key.
        scope: String,
        /// Fetch status label.
        status: &'static str,
        /// Records returned after deduplication.
        records: usize,
        /// Store reads issued.
        reads: usize,
        /// Partitions whose read failed.
        failed_partitions: Vec<String>,
        /// Fetch latency in milliseconds.
        latency_ms: u64,
    },
    /// The result cache was consulted.
    CacheLookup {
        /// Collection name.
        collection: String,
        /// Serialized scope key.
        scope: String,
        /// Lookup outcome (`fresh`, `stale`, `miss`).
        outcome: &'static str,
    },
    /// A collection was invalidated.
    CacheInvalidated {
        /// Collection name.
        collection: String,
        /// Cache entries removed.
        entries_removed: usize,
        /// Invalidation epoch after the bump.
        epoch: u64,
    },
    /// A fetch reply was dropped instead of being committed.
    StaleReplyDiscarded {
        /// Collection name.
        collection: String,
        /// Serialized scope key the reply was fetched for.
        scope: String,
        /// Discard reason (`scope_changed`, `unsubscribed`, `invalidated`).
        reason: &'static str,
    },
    /// A write went through the store contract.
    WriteCommitted {
        /// Collection name.
        collection: String,
        /// Store path written.
        path: String,
        /// Write operation label.
        op: &'static str,
        /// Write outcome (`ok` or `error`).
        outcome: &'static str,
    },
    /// An actor profile was resolved into a scope.
    ProfileResolved {
        /// Actor identifier.
        actor_id: String,
        /// Serialized scope key.
        scope: String,
        /// Whether the published scope changed.
        changed: bool,
    },
}

impl DataEventKind {
    /// Returns the stable event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::FetchCompleted {
                ..
            } => "fetch_completed",
            Self::CacheLookup {
                ..
            } => "cache_lookup",
            Self::CacheInvalidated {
                ..
            } => "cache_invalidated",
            Self::StaleReplyDiscarded {
                ..
            } => "stale_reply_discarded",
            Self::WriteCommitted {
                ..
            } => "write_committed",
            Self::ProfileResolved {
                ..
            } => "profile_resolved",
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Sink for data-path events.
pub trait DataEventSink: Send + Sync {
    /// Record an event.
    fn record(&self, event: &DataEvent);
}

/// Event sink that logs JSON lines to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrEventSink;

impl DataEventSink for StderrEventSink {
    fn record(&self, event: &DataEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Event sink that appends JSON lines to a file.
#[derive(Debug)]
pub struct FileEventSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileEventSink {
    /// Opens the event log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl DataEventSink for FileEventSink {
    fn record(&self, event: &DataEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op event sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl DataEventSink for NoopEventSink {
    fn record(&self, _event: &DataEvent) {}
}

/// Event sink that keeps events in memory for inspection.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    /// Recorded events in arrival order.
    events: Mutex<Vec<DataEvent>>,
}

impl MemoryEventSink {
    /// Creates an empty memory sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<DataEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Returns the recorded event names in arrival order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(DataEvent::name)
            .collect()
    }
}

impl DataEventSink for MemoryEventSink {
    fn record(&self, event: &DataEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event.clone());
    }
}
