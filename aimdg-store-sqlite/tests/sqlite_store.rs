// aimdg-store-sqlite/tests/sqlite_store.rs
// ============================================================================
// Module: SQLite Cold Store Tests
// Description: Validate SqliteColdStore behavior against aimdg-core's
//              ColdEpisodeStore contract.
// Purpose: Ensure durable persistence, integrity checks, and crash recovery
//          for episodes evicted from the episodic memory hot window.
// Dependencies: aimdg-store-sqlite, aimdg-core, rusqlite, serde_json, tempfile
// ============================================================================

//! ## Overview
//! Conformance tests for the SQLite-backed cold episode store. Exercises
//! durability, hash-verified reads, and adversarial storage conditions.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use aimdg_core::ColdEpisodeStore;
use aimdg_core::DecisionRecord;
use aimdg_core::Episode;
use aimdg_core::EpisodeId;
use aimdg_core::Outcome;
use aimdg_core::RequestId;
use aimdg_core::Timestamp;
use aimdg_core::Verdict;
use aimdg_core::hashing::DEFAULT_HASH_ALGORITHM;
use aimdg_core::hashing::hash_bytes;
use aimdg_store_sqlite::MAX_EPISODE_BYTES;
use aimdg_store_sqlite::SqliteColdStore;
use aimdg_store_sqlite::SqliteStoreConfig;
use aimdg_store_sqlite::SqliteStoreError;
use aimdg_store_sqlite::SqliteStoreMode;
use aimdg_store_sqlite::SqliteSyncMode;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

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
        feature_vector: vec![0.1, 0.2, 0.3],
        outcome: Outcome::Unknown,
        effectiveness: 0.0,
        parent_episode_id: None,
        timestamp: Timestamp::from_nanos(0),
    }
}

fn store_for(path: &std::path::Path) -> SqliteColdStore {
    let config = SqliteStoreConfig {
        path: path.to_path_buf(),
        busy_timeout_ms: 1_000,
        journal_mode: SqliteStoreMode::Wal,
        sync_mode: SqliteSyncMode::Full,
    };
    SqliteColdStore::new(config).expect("store init")
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn sqlite_store_roundtrip() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("cold.sqlite");
    let store = store_for(&path);
    let episode = sample_episode(1);
    store.archive(&episode).unwrap();
    let loaded = store.get(EpisodeId::from_raw(1)).unwrap();
    assert_eq!(loaded, Some(episode));
}

#[test]
fn sqlite_store_returns_none_for_missing_episode() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("cold.sqlite");
    let store = store_for(&path);
    let loaded = store.get(EpisodeId::from_raw(999)).unwrap();
    assert!(loaded.is_none());
}

#[test]
fn sqlite_store_persists_across_instances() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("cold.sqlite");
    let episode = sample_episode(1);
    {
        let store = store_for(&path);
        store.archive(&episode).unwrap();
    }
    let store = store_for(&path);
    let loaded = store.get(EpisodeId::from_raw(1)).unwrap();
    assert_eq!(loaded, Some(episode));
}

#[test]
fn sqlite_store_detects_corrupt_hash() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("cold.sqlite");
    let store = store_for(&path);
    let episode = sample_episode(1);
    store.archive(&episode).unwrap();
    {
        let connection = rusqlite::Connection::open(&path).unwrap();
        connection
            .execute(
                "UPDATE episodes SET episode_hash = 'bad' WHERE episode_id = ?1",
                rusqlite::params![1_i64],
            )
            .unwrap();
    }
    let result = store.get(EpisodeId::from_raw(1));
    assert!(result.is_err());
}

#[test]
fn sqlite_store_rejects_oversized_episode_on_archive() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("cold.sqlite");
    let store = store_for(&path);
    let mut episode = sample_episode(1);
    episode.feature_vector = vec![1.0; MAX_EPISODE_BYTES];

    let result = store.archive(&episode);
    assert!(result.is_err());
}

#[test]
fn sqlite_store_rejects_invalid_hash_algorithm() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("cold.sqlite");
    let store = store_for(&path);
    let episode = sample_episode(1);
    store.archive(&episode).unwrap();

    let connection = rusqlite::Connection::open(&path).unwrap();
    connection
        .execute(
            "UPDATE episodes SET hash_algorithm = 'md5' WHERE episode_id = ?1",
            rusqlite::params![1_i64],
        )
        .unwrap();

    let result = store.get(EpisodeId::from_raw(1));
    assert!(result.is_err());
}

#[test]
fn sqlite_store_rejects_episode_id_mismatch() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("cold.sqlite");
    let store = store_for(&path);
    let episode = sample_episode(1);
    store.archive(&episode).unwrap();

    let connection = rusqlite::Connection::open(&path).unwrap();
    let original: Vec<u8> = connection
        .query_row(
            "SELECT episode_json FROM episodes WHERE episode_id = ?1",
            rusqlite::params![1_i64],
            |row| row.get(0),
        )
        .unwrap();
    let mut value: serde_json::Value = serde_json::from_slice(&original).unwrap();
    value["id"] = serde_json::Value::Number(2.into());
    let canonical = aimdg_core::hashing::canonical_json_bytes(&value).unwrap();
    let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, &canonical);
    connection
        .execute(
            "UPDATE episodes SET episode_json = ?1, episode_hash = ?2 WHERE episode_id = ?3",
            rusqlite::params![canonical, digest.value, 1_i64],
        )
        .unwrap();

    let result = store.get(EpisodeId::from_raw(1));
    assert!(result.is_err());
}

#[test]
fn sqlite_store_rejects_version_mismatch() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("cold.sqlite");
    let _store = store_for(&path);

    let connection = rusqlite::Connection::open(&path).unwrap();
    connection.execute("UPDATE store_meta SET version = 999", rusqlite::params![]).unwrap();

    let config = SqliteStoreConfig {
        path,
        busy_timeout_ms: 1_000,
        journal_mode: SqliteStoreMode::Wal,
        sync_mode: SqliteSyncMode::Full,
    };
    let result = SqliteColdStore::new(config);
    assert!(matches!(result, Err(SqliteStoreError::VersionMismatch(_))));
}

#[test]
fn sqlite_store_rejects_directory_path() {
    let temp = TempDir::new().unwrap();
    let config = SqliteStoreConfig {
        path: temp.path().to_path_buf(),
        busy_timeout_ms: 1_000,
        journal_mode: SqliteStoreMode::Wal,
        sync_mode: SqliteSyncMode::Full,
    };
    let result = SqliteColdStore::new(config);
    assert!(matches!(result, Err(SqliteStoreError::Invalid(_))));
}

#[test]
fn sqlite_store_rejects_overlong_path_component() {
    let temp = TempDir::new().unwrap();
    let component = "x".repeat(300);
    let config = SqliteStoreConfig {
        path: temp.path().join(component),
        busy_timeout_ms: 1_000,
        journal_mode: SqliteStoreMode::Wal,
        sync_mode: SqliteSyncMode::Full,
    };
    let result = SqliteColdStore::new(config);
    assert!(matches!(result, Err(SqliteStoreError::Invalid(_))));
}

#[test]
fn sqlite_store_update_outcome_requires_prior_archive() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("cold.sqlite");
    let store = store_for(&path);
    let result = store.update_outcome(EpisodeId::from_raw(1), Outcome::Effective, 1.0);
    assert!(result.is_err());
}

#[test]
fn sqlite_store_allows_concurrent_archives() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("cold.sqlite");
    let store = std::sync::Arc::new(store_for(&path));
    let mut handles = Vec::new();

    for index in 0 .. 10 {
        let store = std::sync::Arc::clone(&store);
        handles.push(std::thread::spawn(move || {
            let episode = sample_episode(index);
            store.archive(&episode).unwrap();
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let connection = rusqlite::Connection::open(&path).unwrap();
    let count: i64 = connection.query_row("SELECT COUNT(*) FROM episodes", rusqlite::params![], |row| row.get(0)).unwrap();
    assert_eq!(count, 10);
}

#[test]
fn crash_writer_uncommitted_insert_is_not_observed() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("cold.sqlite");
    {
        // Creates and migrates the schema so the crash writer's raw insert
        // targets a real `episodes` table.
        let _store = store_for(&path);
    }

    let binary = env!("CARGO_BIN_EXE_sqlite_crash_writer");
    let status = std::process::Command::new(binary)
        .arg(&path)
        .arg("7")
        .status()
        .expect("crash writer should run");
    assert!(!status.success(), "crash writer aborts by design");

    let store = store_for(&path);
    let loaded = store.get(EpisodeId::from_raw(7)).unwrap();
    assert!(loaded.is_none(), "uncommitted write must not survive the crash");
}
