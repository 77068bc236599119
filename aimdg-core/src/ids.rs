// aimdg-core/src/ids.rs
// ============================================================================
// Module: Identifiers
// Description: Opaque, strongly typed identifiers for gateway entities.
// Purpose: Give requests, patterns, episodes, callers, and policies distinct
//          types so they cannot be accidentally interchanged.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! `RequestId` is an opaque 128-bit identifier generated by the caller or
//! minted by the gateway; `PatternId` and `EpisodeId` are monotonic counters
//! scoped to the pattern store and episodic memory respectively, so equality
//! of either is a plain integer compare and neither is ever reused within a
//! process lifetime. `CallerId` and `PolicyName` are opaque strings, mirroring
//! how simple scoping identifiers are modeled elsewhere in this codebase.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: RequestId
// ============================================================================

/// Opaque 128-bit request identifier.
///
/// Unique per gateway process lifetime (spec invariant on `Request.id`); the
/// gateway does not assign these itself unless a caller omits one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u128);

impl RequestId {
    /// Wraps a raw 128-bit value as a request identifier.
    #[must_use]
    pub const fn from_raw(value: u128) -> Self {
        Self(value)
    }

    /// Returns the raw 128-bit value.
    #[must_use]
    pub const fn as_u128(self) -> u128 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl From<u128> for RequestId {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

// ============================================================================
// SECTION: PatternId
// ============================================================================

/// Monotonic identifier assigned by the pattern store on insert.
///
/// Never reused: the store's allocator is a strictly increasing counter, so
/// pattern-id equality doubles as an insertion-order compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternId(u64);

impl PatternId {
    /// Wraps a raw value. Callers outside the pattern store should not
    /// construct arbitrary ids; this exists for deserialization and tests.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw counter value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Monotonic, process-wide allocator for [`PatternId`] values.
#[derive(Debug, Default)]
pub struct PatternIdAllocator {
    next: AtomicU64,
}

impl PatternIdAllocator {
    /// Creates an allocator starting at id `0`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }

    /// Allocates the next [`PatternId`]. Never returns the same value twice.
    pub fn next_id(&self) -> PatternId {
        PatternId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

// ============================================================================
// SECTION: EpisodeId
// ============================================================================

/// Monotonic identifier assigned by episodic memory on append.
///
/// The §9 redesign strategy for the episode causal graph relies on
/// `parent_id < child_id`, so acyclicity is enforced by construction rather
/// than by graph traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpisodeId(u64);

impl EpisodeId {
    /// Wraps a raw value.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw counter value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Monotonic, process-wide allocator for [`EpisodeId`] values.
#[derive(Debug, Default)]
pub struct EpisodeIdAllocator {
    next: AtomicU64,
}

impl EpisodeIdAllocator {
    /// Creates an allocator starting at id `0`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }

    /// Allocates the next [`EpisodeId`]. Never returns the same value twice.
    pub fn next_id(&self) -> EpisodeId {
        EpisodeId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

// ============================================================================
// SECTION: String-Backed Identifiers
// ============================================================================

/// Opaque caller identifier (the requesting principal, e.g. a user or
/// service account).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerId(String);

impl CallerId {
    /// Creates a new caller identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for CallerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CallerId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Name of a compiled policy (§3 `Policy.name`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyName(String);

impl PolicyName {
    /// Creates a new policy name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PolicyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for PolicyName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PolicyName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
