// aimdg-core/src/time.rs
// ============================================================================
// Module: Time
// Description: Monotonic timestamps and the clock abstraction used to
//              produce them.
// Purpose: Give every timed field in the data model (`received_at`,
//          `first_seen`, episode `timestamp`, decision `latency_ns`) a single
//          process-relative, monotonic representation that is cheap to
//          compare and trivially deterministic in tests.
// Dependencies: std::time
// ============================================================================

//! ## Overview
//! The spec calls for *monotonic* timestamps, not wall-clock ones (§3:
//! "`received_at` is monotonic per worker"). Rather than carry
//! `std::time::Instant` (which is not `Serialize`) through the data model,
//! [`Timestamp`] stores nanoseconds elapsed since an arbitrary process-wide
//! epoch captured once at first use. A [`Clock`] trait lets tests supply a
//! deterministic stand-in.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::OnceLock;
use std::time::Instant;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// A monotonic, process-relative timestamp in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Wraps a raw nanosecond value.
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Returns the raw nanosecond value.
    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Returns the elapsed nanoseconds between `self` and a later `other`,
    /// saturating at zero if `other` precedes `self`.
    #[must_use]
    pub const fn elapsed_since(self, other: Self) -> u64 {
        self.0.saturating_sub(other.0)
    }
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Source of monotonic timestamps.
///
/// Production code uses [`SystemClock`]; tests supply a fixed or
/// step-controlled implementation so latency and ordering assertions are
/// deterministic.
pub trait Clock: Send + Sync {
    /// Returns the current monotonic timestamp.
    fn now(&self) -> Timestamp;
}

/// Clock backed by [`std::time::Instant`], relative to a lazily captured
/// process epoch.
#[derive(Debug, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Creates a new system clock.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn process_epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let elapsed = Instant::now().saturating_duration_since(process_epoch());
        Timestamp::from_nanos(u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX))
    }
}

/// Fixed clock for tests: always returns the same timestamp.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}
