// crates/fieldscope-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Remote Store
// Description: Durable RemoteStore and SettingsStore backed by SQLite.
// Purpose: Persist hierarchical JSON trees with path reads and equality reads.
// Dependencies: fieldscope-core, rusqlite, serde, serde_json, thiserror, tokio
// ============================================================================

//! ## Overview
//! The store keeps one JSON tree per top-level path segment in the
//! `store_roots` table. Reads load the owning root and navigate to the
//! requested subtree; writes load, mutate, and rewrite the root inside a
//! single transaction. Path semantics come from
//! [`fieldscope_core::runtime::tree`], so the store behaves exactly like the
//! in-memory store: a missing path reads as `null` and setting `null` deletes.
//!
//! Small string settings share the database through [`SqliteSettingsStore`].
//!
//! ## Invariants
//! - Every write is atomic; a failed write leaves stored trees untouched.
//! - Stored trees larger than `max_node_bytes` are rejected on write and read.
//! - Connection access is serialized through a mutex; async callers run on
//!   the blocking thread pool.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use fieldscope_core::RemoteStore;
use fieldscope_core::SettingsError;
use fieldscope_core::SettingsStore;
use fieldscope_core::StoreError;
use fieldscope_core::StorePath;
use fieldscope_core::WriteOp;
use fieldscope_core::runtime::tree;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Hard upper bound for a single stored root tree.
pub const MAX_NODE_BYTES: usize = 16 * 1024 * 1024;
/// Maximum size of a single settings value.
pub const MAX_SETTING_BYTES: usize = 64 * 1024;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
/// - `max_node_bytes` must be greater than zero and no more than
///   [`MAX_NODE_BYTES`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Maximum encoded size of one stored root tree.
    #[serde(default = "default_max_node_bytes")]
    pub max_node_bytes: usize,
}

impl SqliteStoreConfig {
    /// Returns a config for `path` with default settings.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            max_node_bytes: MAX_NODE_BYTES,
        }
    }

    /// Validates the store configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Invalid`] when the path or limits are
    /// invalid.
    pub fn validate(&self) -> Result<(), SqliteStoreError> {
        validate_store_path(&self.path)?;
        if self.max_node_bytes == 0 || self.max_node_bytes > MAX_NODE_BYTES {
            return Err(SqliteStoreError::Invalid(format!(
                "max_node_bytes out of range: {} (max {MAX_NODE_BYTES})",
                self.max_node_bytes
            )));
        }
        Ok(())
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default stored tree size limit.
const fn default_max_node_bytes() -> usize {
    MAX_NODE_BYTES
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding stored record payloads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Stored data could not be decoded.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store request or configuration.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Payload exceeded configured size limits.
    #[error("sqlite store payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) | SqliteStoreError::Db(message) => Self::Io(message),
            SqliteStoreError::Corrupt(message) => Self::Decode(message),
            SqliteStoreError::VersionMismatch(message) | SqliteStoreError::Invalid(message) => {
                Self::Invalid(message)
            }
            SqliteStoreError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::Invalid(format!(
                "stored tree exceeds size limit: {actual_bytes} bytes (max {max_bytes})"
            )),
        }
    }
}

impl From<SqliteStoreError> for SettingsError {
    fn from(error: SqliteStoreError) -> Self {
        Self::Io(error.to_string())
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed hierarchical remote store.
///
/// # Invariants
/// - `SQLite` connection access is serialized through a mutex.
#[derive(Clone)]
pub struct SqliteRemoteStore {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Shared connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteRemoteStore {
    /// Opens an `SQLite`-backed store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the configuration is invalid or the
    /// database cannot be opened or initialized.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        config.validate()?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            config,
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Returns the store configuration.
    #[must_use]
    pub const fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    /// Returns a settings store sharing this database.
    #[must_use]
    pub fn settings(&self) -> SqliteSettingsStore {
        SqliteSettingsStore {
            connection: Arc::clone(&self.connection),
        }
    }

    /// Reads the subtree at `path` on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database read or decode fails.
    pub fn read_blocking(&self, path: &StorePath) -> Result<Value, SqliteStoreError> {
        let guard = self.lock()?;
        read_tree(&guard, path, self.config.max_node_bytes)
    }

    /// Reads the children of `path` whose `field` equals `value` on the
    /// calling thread.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database read or decode fails.
    pub fn read_where_blocking(
        &self,
        path: &StorePath,
        field: &str,
        value: &str,
    ) -> Result<Value, SqliteStoreError> {
        let node = self.read_blocking(path)?;
        Ok(tree::select_children(&node, field, value))
    }

    /// Applies `op` at `path` on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the write is invalid or the
    /// transaction fails.
    pub fn write_blocking(&self, path: &StorePath, op: WriteOp) -> Result<(), SqliteStoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let mut segments = path.segments();
        match segments.next() {
            Some(head) => {
                let rest = StorePath::new(segments.collect::<Vec<_>>().join("/"));
                let mut root =
                    load_root(&tx, head, self.config.max_node_bytes)?.unwrap_or(Value::Null);
                tree::apply_write(&mut root, &rest, op)
                    .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
                store_root(&tx, head, &root, self.config.max_node_bytes)?;
            }
            None => write_all(&tx, op, self.config.max_node_bytes)?,
        }
        tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(())
    }

    /// Locks the shared connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection
            .lock()
            .map_err(|_| SqliteStoreError::Io("sqlite mutex poisoned".to_string()))
    }
}

#[async_trait]
impl RemoteStore for SqliteRemoteStore {
    async fn read(&self, path: &StorePath) -> Result<Value, StoreError> {
        let store = self.clone();
        let path = path.clone();
        run_blocking(move || store.read_blocking(&path)).await
    }

    async fn read_where(
        &self,
        path: &StorePath,
        field: &str,
        value: &str,
    ) -> Result<Value, StoreError> {
        let store = self.clone();
        let path = path.clone();
        let field = field.to_string();
        let value = value.to_string();
        run_blocking(move || store.read_where_blocking(&path, &field, &value)).await
    }

    async fn write(&self, path: &StorePath, op: WriteOp) -> Result<(), StoreError> {
        let store = self.clone();
        let path = path.clone();
        run_blocking(move || store.write_blocking(&path, op)).await
    }
}

/// Runs a database task on the blocking thread pool.
async fn run_blocking<T, F>(task: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, SqliteStoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| StoreError::Io(format!("sqlite task failed: {err}")))?
        .map_err(StoreError::from)
}

// ============================================================================
// SECTION: Settings
// ============================================================================

/// `SQLite`-backed settings store.
#[derive(Clone)]
pub struct SqliteSettingsStore {
    /// Shared connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteSettingsStore {
    /// Opens a settings store on its own database connection.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened.
    pub fn open(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        Ok(SqliteRemoteStore::new(config)?.settings())
    }

    /// Locks the shared connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection
            .lock()
            .map_err(|_| SqliteStoreError::Io("sqlite mutex poisoned".to_string()))
    }
}

impl SettingsStore for SqliteSettingsStore {
    fn get(&self, key: &str) -> Result<Option<String>, SettingsError> {
        let guard = self.lock()?;
        let value: Option<String> = guard
            .query_row("SELECT value FROM settings WHERE key = ?1", params![key], |row| row.get(0))
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        if value.len() > MAX_SETTING_BYTES {
            return Err(SqliteStoreError::TooLarge {
                max_bytes: MAX_SETTING_BYTES,
                actual_bytes: value.len(),
            }
            .into());
        }
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                 updated_at = excluded.updated_at",
                params![key, value, unix_millis()],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Tree Storage
// ============================================================================

/// Reads the subtree at `path` from the stored roots.
fn read_tree(
    connection: &Connection,
    path: &StorePath,
    max_bytes: usize,
) -> Result<Value, SqliteStoreError> {
    let mut segments = path.segments();
    let Some(head) = segments.next() else {
        return load_all(connection, max_bytes);
    };
    let rest = StorePath::new(segments.collect::<Vec<_>>().join("/"));
    let Some(root) = load_root(connection, head, max_bytes)? else {
        return Ok(Value::Null);
    };
    Ok(tree::subtree(&root, &rest).cloned().unwrap_or(Value::Null))
}

/// Loads and decodes one stored root.
fn load_root(
    connection: &Connection,
    root: &str,
    max_bytes: usize,
) -> Result<Option<Value>, SqliteStoreError> {
    let bytes: Option<Vec<u8>> = connection
        .query_row("SELECT tree_json FROM store_roots WHERE root = ?1", params![root], |row| {
            row.get(0)
        })
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    bytes.map(|bytes| decode_root(root, &bytes, max_bytes)).transpose()
}

/// Loads every stored root as one object.
fn load_all(connection: &Connection, max_bytes: usize) -> Result<Value, SqliteStoreError> {
    let mut statement = connection
        .prepare("SELECT root, tree_json FROM store_roots ORDER BY root")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let rows = statement
        .query_map(params![], |row| Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?)))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let mut roots = Map::new();
    for row in rows {
        let (root, bytes) = row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let value = decode_root(&root, &bytes, max_bytes)?;
        roots.insert(root, value);
    }
    if roots.is_empty() { Ok(Value::Null) } else { Ok(Value::Object(roots)) }
}

/// Decodes a stored root, enforcing the size limit.
fn decode_root(root: &str, bytes: &[u8], max_bytes: usize) -> Result<Value, SqliteStoreError> {
    if bytes.len() > max_bytes {
        return Err(SqliteStoreError::TooLarge {
            max_bytes,
            actual_bytes: bytes.len(),
        });
    }
    serde_json::from_slice(bytes)
        .map_err(|err| SqliteStoreError::Corrupt(format!("stored tree '{root}' is invalid: {err}")))
}

/// Stores one root; a `null` tree removes the row.
fn store_root(
    connection: &Connection,
    root: &str,
    value: &Value,
    max_bytes: usize,
) -> Result<(), SqliteStoreError> {
    if value.is_null() {
        connection
            .execute("DELETE FROM store_roots WHERE root = ?1", params![root])
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        return Ok(());
    }
    let bytes = serde_json::to_vec(value).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    if bytes.len() > max_bytes {
        return Err(SqliteStoreError::TooLarge {
            max_bytes,
            actual_bytes: bytes.len(),
        });
    }
    connection
        .execute(
            "INSERT INTO store_roots (root, tree_json, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(root) DO UPDATE SET tree_json = excluded.tree_json,
             updated_at = excluded.updated_at",
            params![root, bytes, unix_millis()],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Applies a write addressed at the store root.
fn write_all(connection: &Connection, op: WriteOp, max_bytes: usize) -> Result<(), SqliteStoreError> {
    let mut whole = load_all(connection, max_bytes)?;
    tree::apply_write(&mut whole, &StorePath::root(), op)
        .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    let roots = match whole {
        Value::Null => Map::new(),
        Value::Object(roots) => roots,
        _ => {
            return Err(SqliteStoreError::Invalid("store root must be an object".to_string()));
        }
    };
    connection
        .execute("DELETE FROM store_roots", params![])
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    for (root, value) in &roots {
        store_root(connection, root, value, max_bytes)?;
    }
    Ok(())
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS store_roots (
                    root TEXT PRIMARY KEY,
                    tree_json BLOB NOT NULL,
                    updated_at INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS settings (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at INTEGER NOT NULL
                );",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Returns the current unix epoch in milliseconds.
fn unix_millis() -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}
