// crates/fieldscope-core/src/core/scope.rs
// ============================================================================
// Module: Fieldscope Access Scope
// Description: Actor profiles and the access scope derived from them.
// Purpose: Decide which programme partitions an actor may read (fail closed).
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! An [`ActorProfile`] is read once per session from the profile root of the
//! store. [`ScopeResolver::resolve`] is the single derivation point that turns
//! it into an [`AccessScope`].
//!
//! ## Invariants
//! - The unrestricted role always resolves to [`AccessScope::Unrestricted`],
//!   regardless of partition flags.
//! - Every other role resolves to the partitions whose flag is `true`.
//! - A missing or malformed profile resolves to the empty partition set.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::ActorId;
use crate::core::identifiers::PartitionName;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Role value granting unrestricted read access when none is configured.
pub const DEFAULT_UNRESTRICTED_ROLE: &str = "chief-admin";
/// Profile fields holding the partition flag map, in precedence order.
pub const PARTITION_FLAG_FIELDS: &[&str] = &["partitionFlags", "programmes", "allowedProgrammes"];
/// Serialized scope key for unrestricted access.
pub const UNRESTRICTED_SCOPE_KEY: &str = "*";

// ============================================================================
// SECTION: Actor Profile
// ============================================================================

/// Stored actor profile.
///
/// # Invariants
/// - Never mutated locally; re-read from the store when it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActorProfile {
    /// Actor identifier (profile key).
    pub actor_id: ActorId,
    /// Role label as stored (trimmed).
    pub role: String,
    /// Partition flags keyed by partition name.
    pub partition_flags: BTreeMap<String, bool>,
}

impl ActorProfile {
    /// Parses a stored profile document.
    ///
    /// Returns `None` when the document is not a JSON object. Missing roles
    /// parse as the empty string; flag values accept booleans and the strings
    /// `"true"`/`"false"`, anything else reads as `false`.
    #[must_use]
    pub fn from_value(actor_id: ActorId, value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let role = object.get("role").and_then(Value::as_str).map(str::trim).unwrap_or_default();
        let flags = PARTITION_FLAG_FIELDS
            .iter()
            .find_map(|field| object.get(*field).and_then(Value::as_object))
            .map(|map| {
                map.iter()
                    .map(|(name, flag)| (name.trim().to_string(), flag_value(flag)))
                    .filter(|(name, _)| !name.is_empty())
                    .collect::<BTreeMap<_, _>>()
            })
            .unwrap_or_default();
        Some(Self {
            actor_id,
            role: role.to_string(),
            partition_flags: flags,
        })
    }
}

/// Reads a stored partition flag.
fn flag_value(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::String(text) => text.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

// ============================================================================
// SECTION: Access Scope
// ============================================================================

/// Authorization scope derived from an actor profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "partitions", rename_all = "snake_case")]
pub enum AccessScope {
    /// Every partition is readable.
    Unrestricted,
    /// Only the listed partitions are readable; empty means no readable data.
    Partitions(BTreeSet<PartitionName>),
}

impl AccessScope {
    /// Returns the empty (deny-all) scope.
    #[must_use]
    pub const fn denied() -> Self {
        Self::Partitions(BTreeSet::new())
    }

    /// Builds a partition scope from names.
    #[must_use]
    pub fn partitions<I, P>(names: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PartitionName>,
    {
        Self::Partitions(names.into_iter().map(Into::into).collect())
    }

    /// Returns true when the scope grants no readable data.
    #[must_use]
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Partitions(set) if set.is_empty())
    }

    /// Returns true when `partition` is readable under this scope.
    #[must_use]
    pub fn allows(&self, partition: &PartitionName) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::Partitions(set) => set.contains(partition),
        }
    }

    /// Serializes the scope into a stable cache key.
    ///
    /// Unrestricted scopes serialize as `*`; partition scopes as their sorted
    /// names joined by `,`.
    #[must_use]
    pub fn cache_key(&self) -> String {
        match self {
            Self::Unrestricted => UNRESTRICTED_SCOPE_KEY.to_string(),
            Self::Partitions(set) => {
                set.iter().map(PartitionName::as_str).collect::<Vec<_>>().join(",")
            }
        }
    }
}

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Derives access scopes from actor profiles.
///
/// # Invariants
/// - Resolution never fails; malformed input fails closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeResolver {
    /// Role value granting unrestricted access.
    unrestricted_role: String,
}

impl Default for ScopeResolver {
    fn default() -> Self {
        Self::new(DEFAULT_UNRESTRICTED_ROLE)
    }
}

impl ScopeResolver {
    /// Creates a resolver treating `unrestricted_role` as the unrestricted role.
    #[must_use]
    pub fn new(unrestricted_role: impl Into<String>) -> Self {
        Self {
            unrestricted_role: unrestricted_role.into().trim().to_string(),
        }
    }

    /// Returns the configured unrestricted role.
    #[must_use]
    pub fn unrestricted_role(&self) -> &str {
        &self.unrestricted_role
    }

    /// Resolves a profile into an access scope.
    #[must_use]
    pub fn resolve(&self, profile: Option<&ActorProfile>) -> AccessScope {
        let Some(profile) = profile else {
            return AccessScope::denied();
        };
        if !self.unrestricted_role.is_empty() && profile.role == self.unrestricted_role {
            return AccessScope::Unrestricted;
        }
        AccessScope::Partitions(
            profile
                .partition_flags
                .iter()
                .filter(|(_, enabled)| **enabled)
                .map(|(name, _)| PartitionName::new(name.clone()))
                .collect(),
        )
    }

    /// Resolves a raw stored profile document.
    #[must_use]
    pub fn resolve_value(&self, actor_id: &ActorId, value: Option<&Value>) -> AccessScope {
        let profile = value.and_then(|value| ActorProfile::from_value(actor_id.clone(), value));
        self.resolve(profile.as_ref())
    }
}

/// Resolves a profile using the default unrestricted role.
#[must_use]
pub fn resolve(profile: Option<&ActorProfile>) -> AccessScope {
    ScopeResolver::default().resolve(profile)
}
