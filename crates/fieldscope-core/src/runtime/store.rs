// crates/fieldscope-core/src/runtime/store.rs
// ============================================================================
// Module: Fieldscope In-Memory Stores
// Description: In-memory remote store and settings store for tests and demos.
// Purpose: Provide deterministic store implementations without external deps.
// Dependencies: crate::interfaces, serde_json, tokio
// ============================================================================

//! ## Overview
//! [`InMemoryRemoteStore`] keeps a JSON tree behind a mutex and records every
//! query it receives. Tests can inject per-partition or per-path failures and
//! hold read replies behind a gate to simulate slow networks. Replies are
//! computed when the read is issued, so a held reply reflects the data as it
//! was before any write that happens while it is held.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::core::identifiers::StorePath;
use crate::interfaces::RemoteStore;
use crate::interfaces::SettingsError;
use crate::interfaces::SettingsStore;
use crate::interfaces::StoreError;
use crate::interfaces::WriteOp;
use crate::runtime::tree::apply_write;
use crate::runtime::tree::select_children;
use crate::runtime::tree::subtree;

// ============================================================================
// SECTION: Query Log
// ============================================================================

/// Query received by the in-memory store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreQuery {
    /// Full-subtree read.
    Read {
        /// Path read.
        path: String,
    },
    /// Equality-filtered read.
    ReadWhere {
        /// Path read.
        path: String,
        /// Child field compared.
        field: String,
        /// Value compared.
        value: String,
    },
    /// Write.
    Write {
        /// Path written.
        path: String,
        /// Operation label.
        op: &'static str,
    },
}

impl StoreQuery {
    /// Returns true for read queries.
    #[must_use]
    pub const fn is_read(&self) -> bool {
        matches!(
            self,
            Self::Read {
                ..
            } | Self::ReadWhere {
                ..
            }
        )
    }
}

/// Gate holding read replies until opened.
#[derive(Debug, Clone)]
pub struct ReadGate {
    /// Semaphore with no permits; closing it releases every waiter.
    semaphore: Arc<Semaphore>,
}

impl ReadGate {
    /// Releases every held and future read.
    pub fn open(&self) {
        self.semaphore.close();
    }

    /// Waits until the gate opens.
    async fn wait(&self) {
        let _ = self.semaphore.acquire().await;
    }
}

// ============================================================================
// SECTION: In-Memory Remote Store
// ============================================================================

/// Mutable state of the in-memory remote store.
#[derive(Debug, Default)]
struct RemoteState {
    /// Stored JSON tree.
    tree: Value,
    /// Queries in arrival order.
    queries: Vec<StoreQuery>,
    /// Injected failures keyed by equality value.
    value_failures: BTreeMap<String, String>,
    /// Injected failures keyed by path.
    path_failures: BTreeMap<String, String>,
    /// Active read gate.
    gate: Option<ReadGate>,
}

/// In-memory hierarchical store for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRemoteStore {
    /// Store state protected by a mutex.
    state: Arc<Mutex<RemoteState>>,
}

impl InMemoryRemoteStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with `tree`.
    #[must_use]
    pub fn with_tree(tree: Value) -> Self {
        let store = Self::new();
        if let Ok(mut state) = store.state.lock() {
            state.tree = tree;
        }
        store
    }

    /// Locks the store state.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, RemoteState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Io("in-memory store mutex poisoned".to_string()))
    }

    /// Sets the subtree at `path` directly, bypassing the query log.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store state is unavailable.
    pub fn seed(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        apply_write(&mut state.tree, path, WriteOp::Set(value))
    }

    /// Makes equality reads for `value` fail with `message`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store state is unavailable.
    pub fn fail_partition(&self, value: &str, message: &str) -> Result<(), StoreError> {
        self.lock()?.value_failures.insert(value.to_string(), message.to_string());
        Ok(())
    }

    /// Makes every read of `path` fail with `message`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store state is unavailable.
    pub fn fail_path(&self, path: &StorePath, message: &str) -> Result<(), StoreError> {
        self.lock()?.path_failures.insert(path.as_str().to_string(), message.to_string());
        Ok(())
    }

    /// Clears every injected failure.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store state is unavailable.
    pub fn clear_failures(&self) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.value_failures.clear();
        state.path_failures.clear();
        Ok(())
    }

    /// Holds read replies until the returned gate is opened.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store state is unavailable.
    pub fn hold_reads(&self) -> Result<ReadGate, StoreError> {
        let gate = ReadGate {
            semaphore: Arc::new(Semaphore::new(0)),
        };
        self.lock()?.gate = Some(gate.clone());
        Ok(gate)
    }

    /// Returns the queries received so far.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store state is unavailable.
    pub fn queries(&self) -> Result<Vec<StoreQuery>, StoreError> {
        Ok(self.lock()?.queries.clone())
    }

    /// Returns the number of read queries received so far.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store state is unavailable.
    pub fn read_count(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.queries.iter().filter(|query| query.is_read()).count())
    }

    /// Returns a copy of the stored tree.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store state is unavailable.
    pub fn tree(&self) -> Result<Value, StoreError> {
        Ok(self.lock()?.tree.clone())
    }

    /// Logs a read, computes its reply, and returns the active gate.
    fn begin_read(
        &self,
        query: StoreQuery,
        path: &StorePath,
        filter: Option<(&str, &str)>,
    ) -> Result<(Result<Value, StoreError>, Option<ReadGate>), StoreError> {
        let mut state = self.lock()?;
        state.queries.push(query);
        let gate = state.gate.clone();
        if let Some(message) = state.path_failures.get(path.as_str()) {
            return Ok((Err(StoreError::Io(message.clone())), gate));
        }
        if let Some((_, value)) = filter
            && let Some(message) = state.value_failures.get(value)
        {
            return Ok((Err(StoreError::Io(message.clone())), gate));
        }
        let node = subtree(&state.tree, path).cloned().unwrap_or(Value::Null);
        let reply = match filter {
            Some((field, value)) => select_children(&node, field, value),
            None => node,
        };
        drop(state);
        Ok((Ok(reply), gate))
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn read(&self, path: &StorePath) -> Result<Value, StoreError> {
        let query = StoreQuery::Read {
            path: path.as_str().to_string(),
        };
        let (reply, gate) = self.begin_read(query, path, None)?;
        if let Some(gate) = gate {
            gate.wait().await;
        }
        reply
    }

    async fn read_where(
        &self,
        path: &StorePath,
        field: &str,
        value: &str,
    ) -> Result<Value, StoreError> {
        let query = StoreQuery::ReadWhere {
            path: path.as_str().to_string(),
            field: field.to_string(),
            value: value.to_string(),
        };
        let (reply, gate) = self.begin_read(query, path, Some((field, value)))?;
        if let Some(gate) = gate {
            gate.wait().await;
        }
        reply
    }

    async fn write(&self, path: &StorePath, op: WriteOp) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.queries.push(StoreQuery::Write {
            path: path.as_str().to_string(),
            op: op.as_str(),
        });
        if let Some(message) = state.path_failures.get(path.as_str()) {
            return Err(StoreError::Io(message.clone()));
        }
        apply_write(&mut state.tree, path, op)
    }
}

// ============================================================================
// SECTION: In-Memory Settings Store
// ============================================================================

/// In-memory settings store for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemorySettingsStore {
    /// Settings map protected by a mutex.
    values: Arc<Mutex<BTreeMap<String, String>>>,
}

impl InMemorySettingsStore {
    /// Creates an empty settings store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for InMemorySettingsStore {
    fn get(&self, key: &str) -> Result<Option<String>, SettingsError> {
        let guard = self
            .values
            .lock()
            .map_err(|_| SettingsError::Io("settings store mutex poisoned".to_string()))?;
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        self.values
            .lock()
            .map_err(|_| SettingsError::Io("settings store mutex poisoned".to_string()))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
