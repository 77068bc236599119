//! `SQLite` crash writer for cold-store durability tests.
// aimdg-store-sqlite/src/bin/sqlite_crash_writer.rs
// ============================================================================
// Binary: SQLite Crash Writer
// Description: Simulates a process crash during an uncommitted episode write.
// Purpose: Support durability tests for rollback/crash recovery behavior of
//          `SqliteColdStore`.
// Dependencies: aimdg-core, aimdg-store-sqlite, rusqlite
// ============================================================================

use std::env;
use std::path::PathBuf;

use aimdg_core::DecisionRecord;
use aimdg_core::Episode;
use aimdg_core::EpisodeId;
use aimdg_core::Outcome;
use aimdg_core::RequestId;
use aimdg_core::Timestamp;
use aimdg_core::Verdict;
use aimdg_core::hashing::DEFAULT_HASH_ALGORITHM;
use aimdg_core::hashing::canonical_json_bytes;
use aimdg_core::hashing::hash_bytes;
use aimdg_store_sqlite::SqliteColdStore;
use aimdg_store_sqlite::SqliteStoreConfig;
use aimdg_store_sqlite::SqliteStoreMode;
use aimdg_store_sqlite::SqliteSyncMode;
use rusqlite::params;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let path = args.next().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "missing sqlite path")
    })?;
    let episode_id: u64 = args.next().unwrap_or_else(|| "1".to_string()).parse()?;
    let path = PathBuf::from(path);

    let config = SqliteStoreConfig {
        path: path.clone(),
        busy_timeout_ms: 1_000,
        journal_mode: SqliteStoreMode::Wal,
        sync_mode: SqliteSyncMode::Full,
    };
    // Opening through `SqliteColdStore::new` creates and migrates the schema
    // before we reach in underneath it to leave an uncommitted write behind.
    let _store = SqliteColdStore::new(config)?;

    let episode = sample_episode(episode_id);
    let canonical_json = canonical_json_bytes(&episode)?;
    let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, &canonical_json);

    let mut conn = rusqlite::Connection::open(&path)?;
    conn.execute_batch("PRAGMA journal_mode = wal; PRAGMA synchronous = full;")?;
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO episodes (
            episode_id, caller_outcome, effectiveness, episode_json, episode_hash, hash_algorithm
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![episode_id, "unknown", 0.0_f64, canonical_json, digest.value, "sha256"],
    )?;

    // Abort before `tx.commit()`: the write must not be observable on reopen.
    std::process::abort();
}

/// Builds a minimal episode used by the crash writer.
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
            latency_ns: 0,
            reason: None,
            proof_token: Vec::new(),
        },
        feature_vector: Vec::new(),
        outcome: Outcome::Unknown,
        effectiveness: 0.0,
        parent_episode_id: None,
        timestamp: Timestamp::from_nanos(0),
    }
}
