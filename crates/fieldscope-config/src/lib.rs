// crates/fieldscope-config/src/lib.rs
// ============================================================================
// Module: Fieldscope Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for fieldscope.toml semantics.
// Dependencies: fieldscope-core, fieldscope-store-sqlite, fieldscope-store-http,
//               serde, toml
// ============================================================================

//! ## Overview
//! `fieldscope-config` defines the configuration model for Fieldscope hosts:
//! cache freshness, access resolution, collection layout, pricing settings,
//! event sinks, and the remote store backend. Validation is strict and fails
//! closed; helpers turn a validated config into ready-to-use runtime parts.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
