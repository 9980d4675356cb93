// crates/fieldscope-store-http/src/lib.rs
// ============================================================================
// Module: Fieldscope HTTP Store Library
// Description: Remote store over a JSON-over-HTTP database REST endpoint.
// Purpose: Connect the runtime to a hosted hierarchical store.
// Dependencies: fieldscope-core, reqwest, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! `fieldscope-store-http` implements [`RemoteStore`] against realtime
//! database style REST endpoints, where every store path is addressable as
//! `<base>/<path>.json`. Responses are untrusted: bodies are size-bounded and
//! decoded strictly.
//!
//! [`RemoteStore`]: fieldscope_core::RemoteStore

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::*;
