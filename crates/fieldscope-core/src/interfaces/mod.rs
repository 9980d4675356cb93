// crates/fieldscope-core/src/interfaces/mod.rs
// ============================================================================
// Module: Fieldscope Interfaces
// Description: Backend-agnostic contracts for the remote store and settings.
// Purpose: Define the seams the runtime depends on instead of a storage product.
// Dependencies: async-trait, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The runtime depends on exactly three remote operations: a full-subtree read
//! by path, a subtree read filtered by equality on one child field, and a
//! path write (set, merge, or delete). Any hierarchical key-value store that
//! offers these satisfies [`RemoteStore`]. Small local settings go through the
//! synchronous [`SettingsStore`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::StorePath;

// ============================================================================
// SECTION: Remote Store
// ============================================================================

/// Write operation applied at a store path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum WriteOp {
    /// Replace the subtree at the path.
    Set(Value),
    /// Merge the given children into the object at the path; `null` children
    /// delete the corresponding key.
    Merge(Map<String, Value>),
    /// Remove the subtree at the path.
    Delete,
}

impl WriteOp {
    /// Returns a stable label for the operation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Set(_) => "set",
            Self::Merge(_) => "merge",
            Self::Delete => "delete",
        }
    }
}

/// Remote store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Transport or storage I/O failure.
    #[error("remote store io error: {0}")]
    Io(String),
    /// Store answered with a non-success status.
    #[error("remote store status {status}: {message}")]
    Status {
        /// Status code reported by the store.
        status: u16,
        /// Status message or response excerpt.
        message: String,
    },
    /// Store reply could not be decoded.
    #[error("remote store decode error: {0}")]
    Decode(String),
    /// Request was rejected before reaching the store.
    #[error("remote store invalid request: {0}")]
    Invalid(String),
}

/// Hierarchical remote store contract.
///
/// Reads return the JSON subtree at the path; a missing path reads as `null`.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Reads the full subtree at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    async fn read(&self, path: &StorePath) -> Result<Value, StoreError>;

    /// Reads the children of `path` whose `field` equals `value`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    async fn read_where(
        &self,
        path: &StorePath,
        field: &str,
        value: &str,
    ) -> Result<Value, StoreError>;

    /// Applies `op` at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    async fn write(&self, path: &StorePath, op: WriteOp) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Settings Store
// ============================================================================

/// Settings store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    /// Settings backend I/O failure.
    #[error("settings io error: {0}")]
    Io(String),
    /// Settings value could not be encoded.
    #[error("settings encode error: {0}")]
    Encode(String),
}

/// Small string-valued local settings store keyed by fixed strings.
pub trait SettingsStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] when the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, SettingsError>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] when the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), SettingsError>;
}
