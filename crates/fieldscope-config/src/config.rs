// crates/fieldscope-config/src/config.rs
// ============================================================================
// Module: Fieldscope Configuration
// Description: Configuration loading and validation for Fieldscope hosts.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: fieldscope-core, fieldscope-store-sqlite, fieldscope-store-http,
//               serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section has defaults, so an empty file is a valid in-memory setup.
//! Missing or invalid configuration fails closed.
//!
//! ```toml
//! [cache]
//! ttl_ms = 300000
//!
//! [access]
//! unrestricted_role = "chief-admin"
//! profile_root = "users"
//!
//! [[collections]]
//! name = "farmers"
//! entity = "farmer"
//! partition_field = "programme"
//!
//! [store]
//! type = "sqlite"
//! path = "data/fieldscope.db"
//! ```

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fieldscope_core::Clock;
use fieldscope_core::CollectionHub;
use fieldscope_core::CollectionSpec;
use fieldscope_core::DataEventSink;
use fieldscope_core::EntityKind;
use fieldscope_core::RemoteStore;
use fieldscope_core::ResultCache;
use fieldscope_core::ScopeResolver;
use fieldscope_core::SettingsStore;
use fieldscope_core::StorePath;
use fieldscope_core::core::scope::DEFAULT_UNRESTRICTED_ROLE;
use fieldscope_core::runtime::DEFAULT_CACHE_TTL;
use fieldscope_core::runtime::DEFAULT_PARTITION_FIELD;
use fieldscope_core::runtime::DEFAULT_PROFILE_ROOT;
use fieldscope_core::runtime::FileEventSink;
use fieldscope_core::runtime::InMemoryRemoteStore;
use fieldscope_core::runtime::InMemorySettingsStore;
use fieldscope_core::runtime::NoopEventSink;
use fieldscope_core::runtime::PRICING_SETTINGS_KEY;
use fieldscope_core::runtime::StderrEventSink;
use fieldscope_store_http::HttpRemoteStore;
use fieldscope_store_http::HttpStoreConfig;
use fieldscope_store_sqlite::SqliteRemoteStore;
use fieldscope_store_sqlite::SqliteSettingsStore;
use fieldscope_store_sqlite::SqliteStoreConfig;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "fieldscope.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "FIELDSCOPE_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum cache time-to-live (24 hours).
const MAX_CACHE_TTL_MS: u64 = 24 * 60 * 60 * 1000;
/// Maximum number of configured collections.
const MAX_COLLECTIONS: usize = 64;
/// Maximum length of names, roles, keys, and field names.
const MAX_NAME_LENGTH: usize = 128;

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Fieldscope configuration loaded from `fieldscope.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct FieldscopeConfig {
    /// Result cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Access scope resolution configuration.
    #[serde(default)]
    pub access: AccessConfig,
    /// Collection layout entries.
    #[serde(default)]
    pub collections: Vec<CollectionConfig>,
    /// Pricing settings configuration.
    #[serde(default)]
    pub pricing: PricingSettingsConfig,
    /// Data event sink configuration.
    #[serde(default)]
    pub events: EventsConfig,
    /// Remote store backend configuration.
    #[serde(default)]
    pub store: StoreConfig,
}

impl FieldscopeConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// The path is `path` when given, else `$FIELDSCOPE_CONFIG`, else
    /// `fieldscope.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cache.validate()?;
        self.access.validate()?;
        self.pricing.validate()?;
        self.events.validate()?;
        self.store.validate()?;
        if self.collections.len() > MAX_COLLECTIONS {
            return Err(ConfigError::Invalid(format!(
                "collections exceeds max entries ({MAX_COLLECTIONS})"
            )));
        }
        let mut names = BTreeSet::new();
        for collection in &self.collections {
            collection.validate()?;
            if !names.insert(collection.name.trim()) {
                return Err(ConfigError::Invalid(format!(
                    "collections.name '{}' is duplicated",
                    collection.name.trim()
                )));
            }
        }
        Ok(())
    }

    /// Returns the scope resolver for the configured access rules.
    #[must_use]
    pub fn scope_resolver(&self) -> ScopeResolver {
        ScopeResolver::new(self.access.unrestricted_role.as_str())
    }

    /// Returns the store path holding actor profiles.
    #[must_use]
    pub fn profile_root(&self) -> StorePath {
        StorePath::new(&self.access.profile_root)
    }

    /// Returns the collection specs to register with a hub.
    #[must_use]
    pub fn collection_specs(&self) -> Vec<CollectionSpec> {
        self.collections.iter().map(CollectionConfig::spec).collect()
    }

    /// Returns the configured entity kind for `name`, if the collection is
    /// configured.
    #[must_use]
    pub fn entity_for(&self, name: &str) -> Option<EntityKind> {
        self.collections
            .iter()
            .find(|collection| collection.name.trim() == name)
            .map(|collection| collection.entity)
    }

    /// Builds a hub over `store` with the configured cache and collections.
    #[must_use]
    pub fn build_hub(
        &self,
        store: Arc<dyn RemoteStore>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn DataEventSink>,
    ) -> CollectionHub {
        let cache = Arc::new(ResultCache::new(self.cache.ttl(), Arc::clone(&clock)));
        let hub = CollectionHub::new(store, cache, clock, events);
        for spec in self.collection_specs() {
            hub.register(spec);
        }
        hub
    }
}

// ============================================================================
// SECTION: Cache
// ============================================================================

/// Result cache configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Time-to-live of fresh cache entries, in milliseconds.
    #[serde(default = "default_cache_ttl_ms")]
    pub ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: default_cache_ttl_ms(),
        }
    }
}

impl CacheConfig {
    /// Returns the configured TTL.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Validates cache configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl_ms == 0 {
            return Err(ConfigError::Invalid("cache.ttl_ms must be greater than zero".to_string()));
        }
        if self.ttl_ms > MAX_CACHE_TTL_MS {
            return Err(ConfigError::Invalid(format!(
                "cache.ttl_ms exceeds max ({MAX_CACHE_TTL_MS})"
            )));
        }
        Ok(())
    }
}

/// Returns the default cache TTL in milliseconds.
fn default_cache_ttl_ms() -> u64 {
    u64::try_from(DEFAULT_CACHE_TTL.as_millis()).unwrap_or(MAX_CACHE_TTL_MS)
}

// ============================================================================
// SECTION: Access
// ============================================================================

/// Access scope resolution configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessConfig {
    /// Profile role value granting unrestricted access.
    #[serde(default = "default_unrestricted_role")]
    pub unrestricted_role: String,
    /// Store path holding actor profiles.
    #[serde(default = "default_profile_root")]
    pub profile_root: String,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            unrestricted_role: default_unrestricted_role(),
            profile_root: default_profile_root(),
        }
    }
}

impl AccessConfig {
    /// Validates access configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_name("access.unrestricted_role", &self.unrestricted_role)?;
        validate_store_path("access.profile_root", &self.profile_root)
    }
}

/// Returns the default unrestricted role.
fn default_unrestricted_role() -> String {
    DEFAULT_UNRESTRICTED_ROLE.to_string()
}

/// Returns the default profile root.
fn default_profile_root() -> String {
    DEFAULT_PROFILE_ROOT.to_string()
}

// ============================================================================
// SECTION: Collections
// ============================================================================

/// Collection layout entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionConfig {
    /// Logical collection name.
    pub name: String,
    /// Entity kind stored in the collection.
    pub entity: EntityKind,
    /// Store path; defaults to the collection name.
    #[serde(default)]
    pub path: Option<String>,
    /// Child field holding the partition tag.
    #[serde(default = "default_partition_field")]
    pub partition_field: String,
}

impl CollectionConfig {
    /// Returns the runtime spec for this collection.
    #[must_use]
    pub fn spec(&self) -> CollectionSpec {
        let spec = CollectionSpec::new(self.name.trim())
            .with_partition_field(self.partition_field.trim());
        match &self.path {
            Some(path) => spec.with_path(path),
            None => spec,
        }
    }

    /// Validates a collection entry.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_name("collections.name", &self.name)?;
        if self.name.contains('/') {
            return Err(ConfigError::Invalid(
                "collections.name must not contain '/'".to_string(),
            ));
        }
        validate_name("collections.partition_field", &self.partition_field)?;
        if let Some(path) = &self.path {
            validate_store_path("collections.path", path)?;
        }
        Ok(())
    }
}

/// Returns the default partition field.
fn default_partition_field() -> String {
    DEFAULT_PARTITION_FIELD.to_string()
}

// ============================================================================
// SECTION: Pricing
// ============================================================================

/// Pricing settings configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PricingSettingsConfig {
    /// Settings key holding pricing inputs.
    #[serde(default = "default_settings_key")]
    pub settings_key: String,
    /// Optional `SQLite` file for local settings; defaults to the store
    /// database when the store is `SQLite`, else memory.
    #[serde(default)]
    pub settings_path: Option<PathBuf>,
}

impl Default for PricingSettingsConfig {
    fn default() -> Self {
        Self {
            settings_key: default_settings_key(),
            settings_path: None,
        }
    }
}

impl PricingSettingsConfig {
    /// Validates pricing settings configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_name("pricing.settings_key", &self.settings_key)?;
        if let Some(path) = &self.settings_path {
            validate_path_string("pricing.settings_path", &path.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Returns the default pricing settings key.
fn default_settings_key() -> String {
    PRICING_SETTINGS_KEY.to_string()
}

// ============================================================================
// SECTION: Events
// ============================================================================

/// Data event sink type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EventSinkType {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Discard events.
    None,
}

/// Data event sink configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct EventsConfig {
    /// Sink type.
    #[serde(default)]
    pub sink: EventSinkType,
    /// Log file path for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl EventsConfig {
    /// Opens the configured event sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file sink cannot be opened.
    pub fn open_sink(&self) -> Result<Arc<dyn DataEventSink>, ConfigError> {
        match self.sink {
            EventSinkType::Stderr => Ok(Arc::new(StderrEventSink)),
            EventSinkType::None => Ok(Arc::new(NoopEventSink)),
            EventSinkType::File => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("file events sink requires path".to_string())
                })?;
                let sink = FileEventSink::new(path).map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(Arc::new(sink))
            }
        }
    }

    /// Validates event sink configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (EventSinkType::File, None) => {
                Err(ConfigError::Invalid("file events sink requires path".to_string()))
            }
            (EventSinkType::File, Some(path)) => {
                validate_path_string("events.path", &path.to_string_lossy())
            }
            (_, Some(_)) => {
                Err(ConfigError::Invalid("events.path is only valid for the file sink".to_string()))
            }
            (_, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Remote store backend configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// In-process store; data does not survive the process.
    #[default]
    Memory,
    /// `SQLite`-backed durable store.
    Sqlite(SqliteStoreConfig),
    /// JSON-over-HTTP database endpoint.
    Http(HttpStoreConfig),
}

/// Opened store backends.
#[derive(Clone)]
pub struct StoreBackends {
    /// Remote store for collections and profiles.
    pub remote: Arc<dyn RemoteStore>,
    /// Local settings store.
    pub settings: Arc<dyn SettingsStore>,
}

impl StoreConfig {
    /// Returns the backend label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Sqlite(_) => "sqlite",
            Self::Http(_) => "http",
        }
    }

    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Memory => Ok(()),
            Self::Sqlite(config) => config
                .validate()
                .map_err(|err| ConfigError::Invalid(format!("store: {err}"))),
            Self::Http(config) => config
                .validate()
                .map_err(|err| ConfigError::Invalid(format!("store: {err}"))),
        }
    }
}

impl FieldscopeConfig {
    /// Opens the configured remote store and settings store.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a backend cannot be opened.
    pub fn open_backends(&self) -> Result<StoreBackends, ConfigError> {
        let mut shared_settings: Option<SqliteSettingsStore> = None;
        let remote: Arc<dyn RemoteStore> = match &self.store {
            StoreConfig::Memory => Arc::new(InMemoryRemoteStore::new()),
            StoreConfig::Sqlite(config) => {
                let store = SqliteRemoteStore::new(config.clone())
                    .map_err(|err| ConfigError::Io(err.to_string()))?;
                shared_settings = Some(store.settings());
                Arc::new(store)
            }
            StoreConfig::Http(config) => Arc::new(
                HttpRemoteStore::new(config.clone())
                    .map_err(|err| ConfigError::Io(err.to_string()))?,
            ),
        };
        let settings: Arc<dyn SettingsStore> = match (&self.pricing.settings_path, shared_settings)
        {
            (Some(path), _) => Arc::new(
                SqliteSettingsStore::open(SqliteStoreConfig::new(path))
                    .map_err(|err| ConfigError::Io(err.to_string()))?,
            ),
            (None, Some(settings)) => Arc::new(settings),
            (None, None) => Arc::new(InMemorySettingsStore::new()),
        };
        Ok(StoreBackends {
            remote,
            settings,
        })
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error while reading config or opening backends.
    #[error("config io error: {0}")]
    Io(String),
    /// Parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from arguments or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a filesystem path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    let path = Path::new(trimmed);
    for component in path.components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a short identifier-like string.
fn validate_name(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_NAME_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length ({MAX_NAME_LENGTH})")));
    }
    Ok(())
}

/// Validates a store path string; it must address something below the root.
fn validate_store_path(field: &str, value: &str) -> Result<(), ConfigError> {
    if StorePath::new(value).is_root() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if value.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    Ok(())
}
