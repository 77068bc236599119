// aimdg-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Cold Episode Store
// Description: Durable `ColdEpisodeStore` backend using SQLite WAL.
// Purpose: Provide production-grade persistence for episodes evicted from
//          the gateway's in-memory hot window (spec.md §4.7 "Retention").
// Dependencies: aimdg-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a `SQLite`-backed [`SqliteColdStore`] implementing
//! `aimdg_core::ColdEpisodeStore`. Each archived episode is stored as a
//! canonical JSON blob alongside its content hash, so a corrupted row is
//! detected on read rather than silently trusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::MAX_EPISODE_BYTES;
pub use store::SqliteColdStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
