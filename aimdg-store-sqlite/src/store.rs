// aimdg-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Cold Episode Store
// Description: Durable ColdEpisodeStore backed by SQLite WAL.
// Purpose: Persist episodes evicted from the episodic memory hot window
//          (spec.md §4.7 "Retention"), with deterministic serialization and
//          hash-verified reads.
// Dependencies: aimdg-core, rusqlite, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`SqliteColdStore`] implements [`aimdg_core::ColdEpisodeStore`]. Each
//! archived episode is written as a canonical JSON blob alongside its hash;
//! reads verify the hash before deserializing, failing closed on corruption
//! rather than returning a silently-wrong episode (spec.md §7 taxonomy (d)).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use aimdg_core::ColdEpisodeStore;
use aimdg_core::Episode;
use aimdg_core::EpisodeId;
use aimdg_core::Outcome;
use aimdg_core::hashing::DEFAULT_HASH_ALGORITHM;
use aimdg_core::hashing::HashAlgorithm;
use aimdg_core::hashing::canonical_json_bytes;
use aimdg_core::hashing::hash_bytes;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the cold store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum total path length accepted for the store file.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum serialized episode size accepted by the store.
pub const MAX_EPISODE_BYTES: usize = 4 * 1024 * 1024;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
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

/// Configuration for the `SQLite` cold episode store.
#[derive(Debug, Clone, Deserialize)]
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
}

const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` cold store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption or hash mismatch.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Stored payload exceeded configured size limits.
    #[error("sqlite store payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed cold episode store with WAL support.
#[derive(Clone)]
pub struct SqliteColdStore {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteColdStore {
    /// Opens an `SQLite`-backed cold episode store, creating and migrating
    /// its schema as needed.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self { connection: Arc::new(Mutex::new(connection)) })
    }
}

impl ColdEpisodeStore for SqliteColdStore {
    fn archive(&self, episode: &Episode) -> Result<(), String> {
        self.archive_episode(episode).map_err(|err| err.to_string())
    }

    fn get(&self, id: EpisodeId) -> Result<Option<Episode>, String> {
        self.get_episode(id).map_err(|err| err.to_string())
    }

    fn update_outcome(&self, id: EpisodeId, outcome: Outcome, effectiveness: f32) -> Result<(), String> {
        self.update_episode_outcome(id, outcome, effectiveness).map_err(|err| err.to_string())
    }
}

impl SqliteColdStore {
    fn archive_episode(&self, episode: &Episode) -> Result<(), SqliteStoreError> {
        let canonical_json = canonical_json_bytes(episode)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        if canonical_json.len() > MAX_EPISODE_BYTES {
            return Err(SqliteStoreError::TooLarge {
                max_bytes: MAX_EPISODE_BYTES,
                actual_bytes: canonical_json.len(),
            });
        }
        let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, &canonical_json);
        let mut guard = self.connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))?;
        let tx = guard.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        tx.execute(
            "INSERT INTO episodes (
                episode_id, caller_outcome, effectiveness, episode_json, episode_hash, hash_algorithm
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(episode_id) DO UPDATE SET
                caller_outcome = excluded.caller_outcome,
                effectiveness = excluded.effectiveness,
                episode_json = excluded.episode_json,
                episode_hash = excluded.episode_hash,
                hash_algorithm = excluded.hash_algorithm",
            params![
                episode.id.as_u64(),
                outcome_label(episode.outcome),
                f64::from(episode.effectiveness),
                canonical_json,
                digest.value,
                hash_algorithm_label(digest.algorithm),
            ],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        drop(guard);
        Ok(())
    }

    fn get_episode(&self, id: EpisodeId) -> Result<Option<Episode>, SqliteStoreError> {
        let guard = self.connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))?;
        let row: Option<(Vec<u8>, String, String)> = guard
            .query_row(
                "SELECT episode_json, episode_hash, hash_algorithm FROM episodes WHERE episode_id = ?1",
                params![id.as_u64()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        drop(guard);
        let Some((episode_json, episode_hash, hash_algorithm)) = row else {
            return Ok(None);
        };
        let algorithm = parse_hash_algorithm(&hash_algorithm)?;
        let expected = hash_bytes(algorithm, &episode_json);
        if expected.value != episode_hash {
            return Err(SqliteStoreError::Corrupt(format!("hash mismatch for episode {id}")));
        }
        let episode: Episode = serde_json::from_slice(&episode_json)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        if episode.id != id {
            return Err(SqliteStoreError::Invalid("episode id mismatch between key and payload".to_string()));
        }
        Ok(Some(episode))
    }

    fn update_episode_outcome(
        &self,
        id: EpisodeId,
        outcome: Outcome,
        effectiveness: f32,
    ) -> Result<(), SqliteStoreError> {
        let Some(mut episode) = self.get_episode(id)? else {
            return Err(SqliteStoreError::Invalid(format!("no archived episode {id}")));
        };
        episode.apply_outcome(outcome, effectiveness);
        self.archive_episode(&episode)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid("store path contains an overlong component".to_string()));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid("store path must be a file, not a directory".to_string()));
    }
    Ok(())
}

fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection =
        Connection::open_with_flags(&config.path, flags).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

fn apply_pragmas(connection: &Connection, config: &SqliteStoreConfig) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates an existing version.
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
                "CREATE TABLE IF NOT EXISTS episodes (
                    episode_id INTEGER PRIMARY KEY,
                    caller_outcome TEXT NOT NULL,
                    effectiveness REAL NOT NULL,
                    episode_json BLOB NOT NULL,
                    episode_hash TEXT NOT NULL,
                    hash_algorithm TEXT NOT NULL
                );",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!("unsupported schema version: {value}")));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

const fn hash_algorithm_label(algorithm: HashAlgorithm) -> &'static str {
    match algorithm {
        HashAlgorithm::Sha256 => "sha256",
    }
}

fn parse_hash_algorithm(label: &str) -> Result<HashAlgorithm, SqliteStoreError> {
    match label {
        "sha256" => Ok(HashAlgorithm::Sha256),
        other => Err(SqliteStoreError::Invalid(format!("unsupported hash algorithm: {other}"))),
    }
}

const fn outcome_label(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Effective => "effective",
        Outcome::Ineffective => "ineffective",
        Outcome::Unknown => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use aimdg_core::DecisionRecord;
    use aimdg_core::RequestId;
    use aimdg_core::Timestamp;
    use aimdg_core::Verdict;

    use super::*;

    fn sample_episode(id: u64) -> Episode {
        Episode {
            id: EpisodeId::from_raw(id),
            decision: DecisionRecord {
                request_id: RequestId::from_raw(1),
                verdict: Verdict::Allow,
                tier_reached: 1,
                confidence: 1.0,
                matched_patterns: Vec::new(),
                mitigation_applied: None,
                latency_ns: 100,
                reason: None,
                proof_token: Vec::new(),
            },
            feature_vector: vec![1.0, 2.0],
            outcome: Outcome::Unknown,
            effectiveness: 0.0,
            parent_episode_id: None,
            timestamp: Timestamp::from_nanos(0),
        }
    }

    fn temp_store() -> (SqliteColdStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cold.sqlite3");
        let store = SqliteColdStore::new(SqliteStoreConfig {
            path,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::Wal,
            sync_mode: SqliteSyncMode::Full,
        })
        .expect("store should open");
        (store, dir)
    }

    #[test]
    fn archive_then_get_round_trips() {
        let (store, _dir) = temp_store();
        let episode = sample_episode(7);
        store.archive(&episode).expect("archive should succeed");

        let fetched = store.get(EpisodeId::from_raw(7)).expect("get should succeed");
        assert_eq!(fetched, Some(episode));
    }

    #[test]
    fn get_missing_episode_returns_none() {
        let (store, _dir) = temp_store();
        let fetched = store.get(EpisodeId::from_raw(404)).expect("get should succeed");
        assert_eq!(fetched, None);
    }

    #[test]
    fn update_outcome_persists() {
        let (store, _dir) = temp_store();
        let episode = sample_episode(9);
        store.archive(&episode).expect("archive should succeed");

        store.update_outcome(EpisodeId::from_raw(9), Outcome::Effective, 0.8).expect("update should succeed");

        let fetched = store.get(EpisodeId::from_raw(9)).expect("get should succeed").expect("episode present");
        assert_eq!(fetched.outcome, Outcome::Effective);
        assert!((fetched.effectiveness - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn update_outcome_on_missing_episode_fails() {
        let (store, _dir) = temp_store();
        let result = store.update_outcome(EpisodeId::from_raw(1), Outcome::Effective, 1.0);
        assert!(result.is_err());
    }

    #[test]
    fn reopening_existing_database_preserves_schema_version() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cold.sqlite3");
        let config = SqliteStoreConfig {
            path: path.clone(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::Wal,
            sync_mode: SqliteSyncMode::Full,
        };
        {
            let store = SqliteColdStore::new(config.clone()).expect("first open should succeed");
            store.archive(&sample_episode(1)).expect("archive should succeed");
        }
        let store = SqliteColdStore::new(config).expect("reopen should succeed");
        let fetched = store.get(EpisodeId::from_raw(1)).expect("get should succeed");
        assert!(fetched.is_some());
    }
}
