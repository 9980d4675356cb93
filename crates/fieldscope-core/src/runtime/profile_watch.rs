// crates/fieldscope-core/src/runtime/profile_watch.rs
// ============================================================================
// Module: Fieldscope Profile Watcher
// Description: Single derivation point for the signed-in actor's access scope.
// Purpose: Read the actor profile once and republish the scope only on change.
// Dependencies: crate::{core, interfaces, runtime}, serde_json, tokio
// ============================================================================

//! ## Overview
//! [`ProfileWatcher`] owns the actor's scope for a session. It reads the
//! profile at `<profile_root>/<actor_id>`, resolves it once, and publishes the
//! scope on a watch channel. Hosts that receive profile change notifications
//! push the new document through [`ProfileWatcher::apply_profile`]; others call
//! [`ProfileWatcher::refresh`]. Subscribers are woken only when the resolved
//! scope actually changes.
//!
//! ## Invariants
//! - The scope starts as the empty (deny-all) scope until a profile is read.
//! - A failed read keeps the previously published scope.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use serde_json::Value;
use tokio::sync::watch;

use crate::core::identifiers::ActorId;
use crate::core::identifiers::StorePath;
use crate::core::scope::AccessScope;
use crate::core::scope::ActorProfile;
use crate::core::scope::ScopeResolver;
use crate::interfaces::RemoteStore;
use crate::interfaces::StoreError;
use crate::runtime::events::DataEvent;
use crate::runtime::events::DataEventKind;
use crate::runtime::events::DataEventSink;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default store path holding actor profiles.
pub const DEFAULT_PROFILE_ROOT: &str = "users";

// ============================================================================
// SECTION: Watcher
// ============================================================================

/// Publishes the access scope of one actor.
pub struct ProfileWatcher {
    /// Remote store holding profiles.
    store: Arc<dyn RemoteStore>,
    /// Scope resolver.
    resolver: ScopeResolver,
    /// Path of the actor's profile.
    profile_path: StorePath,
    /// Actor identifier.
    actor_id: ActorId,
    /// Event sink.
    events: Arc<dyn DataEventSink>,
    /// Last profile document applied.
    last_profile: Mutex<Option<Value>>,
    /// Scope publisher.
    sender: watch::Sender<AccessScope>,
}

impl ProfileWatcher {
    /// Creates a watcher for `actor_id` under `profile_root`.
    #[must_use]
    pub fn new(
        store: Arc<dyn RemoteStore>,
        resolver: ScopeResolver,
        profile_root: &StorePath,
        actor_id: ActorId,
        events: Arc<dyn DataEventSink>,
    ) -> Self {
        let (sender, _) = watch::channel(AccessScope::denied());
        Self {
            store,
            resolver,
            profile_path: profile_root.child(actor_id.as_str()),
            actor_id,
            events,
            last_profile: Mutex::new(None),
            sender,
        }
    }

    /// Returns the actor identifier.
    #[must_use]
    pub const fn actor_id(&self) -> &ActorId {
        &self.actor_id
    }

    /// Returns the store path of the profile.
    #[must_use]
    pub const fn profile_path(&self) -> &StorePath {
        &self.profile_path
    }

    /// Returns the currently published scope.
    #[must_use]
    pub fn scope(&self) -> AccessScope {
        self.sender.borrow().clone()
    }

    /// Returns the last applied profile, parsed.
    #[must_use]
    pub fn profile(&self) -> Option<ActorProfile> {
        let last = self.last_profile.lock().unwrap_or_else(PoisonError::into_inner);
        last.as_ref().and_then(|value| ActorProfile::from_value(self.actor_id.clone(), value))
    }

    /// Subscribes to scope changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AccessScope> {
        self.sender.subscribe()
    }

    /// Re-reads the profile from the store and applies it.
    ///
    /// Returns true when the published scope changed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the profile cannot be read; the previous
    /// scope stays published.
    pub async fn refresh(&self) -> Result<bool, StoreError> {
        let document = self.store.read(&self.profile_path).await?;
        let document = (!document.is_null()).then_some(document);
        Ok(self.apply_profile(document.as_ref()))
    }

    /// Applies a pushed profile document (`None` when the profile is absent).
    ///
    /// Returns true when the published scope changed. An identical document
    /// is ignored.
    pub fn apply_profile(&self, document: Option<&Value>) -> bool {
        {
            let mut last = self.last_profile.lock().unwrap_or_else(PoisonError::into_inner);
            if last.is_some() && last.as_ref() == document {
                return false;
            }
            *last = document.cloned();
        }
        let scope = self.resolver.resolve_value(&self.actor_id, document);
        let key = scope.cache_key();
        let changed = self.sender.send_if_modified(|current| {
            if *current == scope {
                return false;
            }
            *current = scope;
            true
        });
        self.events.record(&DataEvent::now(DataEventKind::ProfileResolved {
            actor_id: self.actor_id.to_string(),
            scope: key,
            changed,
        }));
        changed
    }
}
