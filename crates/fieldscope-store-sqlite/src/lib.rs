// crates/fieldscope-store-sqlite/src/lib.rs
// ============================================================================
// Module: Fieldscope SQLite Store Library
// Description: SQLite-backed remote store and settings store.
// Purpose: Give local deployments and tests a durable hierarchical store.
// Dependencies: fieldscope-core, rusqlite, serde, serde_json, thiserror, tokio
// ============================================================================

//! ## Overview
//! `fieldscope-store-sqlite` implements the Fieldscope [`RemoteStore`] and
//! [`SettingsStore`] contracts on a single `SQLite` database file. Database
//! contents are untrusted: stored trees are decoded on every read and decode
//! failures surface as errors rather than empty data.
//!
//! [`RemoteStore`]: fieldscope_core::RemoteStore
//! [`SettingsStore`]: fieldscope_core::SettingsStore

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::*;
