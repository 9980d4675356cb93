// crates/fieldscope-core/src/runtime/writer.rs
// ============================================================================
// Module: Fieldscope Collection Writer
// Description: Create, update, replace, and delete through the store contract.
// Purpose: Keep the result cache honest by invalidating after every write.
// Dependencies: crate::{core, interfaces, runtime}, rand, serde_json
// ============================================================================

//! ## Overview
//! Every write goes through [`RemoteStore::write`] and is followed, before the
//! call returns, by a synchronous invalidation of the touched collection. A
//! read issued after a write therefore never sees the pre-write cache entry.
//! Invalidation also runs when the write fails, since a failed request may
//! still have reached the store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Map;
use serde_json::Value;

use crate::core::identifiers::CollectionName;
use crate::core::identifiers::RecordId;
use crate::core::identifiers::StorePath;
use crate::interfaces::RemoteStore;
use crate::interfaces::StoreError;
use crate::interfaces::WriteOp;
use crate::runtime::events::DataEvent;
use crate::runtime::events::DataEventKind;
use crate::runtime::hub::HubInner;

// ============================================================================
// SECTION: Writer
// ============================================================================

/// Write path for scoped collections.
#[derive(Clone)]
pub struct CollectionWriter {
    /// Shared hub state (store, cache, clock, events).
    hub: Arc<HubInner>,
}

impl CollectionWriter {
    /// Creates a writer bound to a hub.
    pub(crate) const fn new(hub: Arc<HubInner>) -> Self {
        Self {
            hub,
        }
    }

    /// Creates a record under a generated id and returns the id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when `record` is not an object, or the
    /// store error when the write fails.
    pub async fn create(
        &self,
        collection: &CollectionName,
        record: Value,
    ) -> Result<RecordId, StoreError> {
        if !record.is_object() {
            return Err(StoreError::Invalid("record must be a JSON object".to_string()));
        }
        let id = self.generate_id();
        let path = self.record_path(collection, &id)?;
        self.apply(collection, &path, WriteOp::Set(record)).await?;
        Ok(id)
    }

    /// Merges `fields` into an existing record; `null` fields are removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] for an empty id, or the store error
    /// when the write fails.
    pub async fn update(
        &self,
        collection: &CollectionName,
        id: &RecordId,
        fields: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let path = self.record_path(collection, id)?;
        self.apply(collection, &path, WriteOp::Merge(fields)).await
    }

    /// Replaces a record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] for an empty id or a non-object record,
    /// or the store error when the write fails.
    pub async fn replace(
        &self,
        collection: &CollectionName,
        id: &RecordId,
        record: Value,
    ) -> Result<(), StoreError> {
        if !record.is_object() {
            return Err(StoreError::Invalid("record must be a JSON object".to_string()));
        }
        let path = self.record_path(collection, id)?;
        self.apply(collection, &path, WriteOp::Set(record)).await
    }

    /// Deletes a record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] for an empty id, or the store error
    /// when the write fails.
    pub async fn delete(&self, collection: &CollectionName, id: &RecordId) -> Result<(), StoreError> {
        let path = self.record_path(collection, id)?;
        self.apply(collection, &path, WriteOp::Delete).await
    }

    /// Resolves the store path of a record.
    fn record_path(&self, collection: &CollectionName, id: &RecordId) -> Result<StorePath, StoreError> {
        let id = id.as_str().trim();
        if id.is_empty() || id.contains('/') {
            return Err(StoreError::Invalid(format!("invalid record id: '{id}'")));
        }
        Ok(self.hub.spec(collection).path.child(id))
    }

    /// Writes, invalidates, and records the outcome.
    async fn apply(
        &self,
        collection: &CollectionName,
        path: &StorePath,
        op: WriteOp,
    ) -> Result<(), StoreError> {
        let label = op.as_str();
        let store: &Arc<dyn RemoteStore> = self.hub.store();
        let result = store.write(path, op).await;
        self.hub.invalidate(collection);
        self.hub.events().record(&DataEvent::now(DataEventKind::WriteCommitted {
            collection: collection.to_string(),
            path: path.to_string(),
            op: label,
            outcome: if result.is_ok() { "ok" } else { "error" },
        }));
        result
    }

    /// Generates a time-ordered record id.
    fn generate_id(&self) -> RecordId {
        let millis = self.hub.clock().now_utc().unix_timestamp_nanos() / 1_000_000;
        let millis = u64::try_from(millis).unwrap_or(0);
        let suffix: u32 = rand::random();
        RecordId::new(format!("{millis:012x}{suffix:08x}"))
    }
}
