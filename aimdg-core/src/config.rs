// aimdg-core/src/config.rs
// ============================================================================
// Module: Settings
// Description: The immutable, validated configuration snapshot every
//              `admit` call pins at entry.
// Purpose: Model spec.md §6's "Configuration" settings object, plus the
//          snapshot-publish mechanism spec.md §9 requires in place of a
//          mutated-in-place global config object.
// Dependencies: crate::store::vector_index
// ============================================================================

//! ## Overview
//! [`Settings`] is a plain, validated value type: every recognized §6 key as
//! a field, with the documented defaults. It never mutates in place —
//! runtime threshold tuning publishes a new `Arc<Settings>` through
//! [`SettingsCell`], and each `Gateway::admit` call reads (and pins) the
//! snapshot current at entry, exactly as spec.md §9's redesign strategy for
//! "global configuration object mutated ad hoc" specifies. `aimdg-config`
//! is the crate that actually parses a TOML file into this type; this
//! module owns the type and its validation rules so both that crate and
//! `aimdg-core` agree on what a valid settings object looks like.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use parking_lot::RwLock;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised validating a [`Settings`] value.
#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    /// A probability-like field (`tau_high`, `tau_low`, `theta_vector`, …)
    /// was outside `[0, 1]`.
    #[error("{field} must be in [0, 1], got {value}")]
    OutOfUnitRange {
        /// The offending field's name.
        field: &'static str,
        /// The out-of-range value.
        value: f64,
    },
    /// `tau_low` was not strictly less than `tau_high`, making the
    /// uncertain band in spec.md §4.1 step 4 empty or inverted.
    #[error("tau_low ({tau_low}) must be strictly less than tau_high ({tau_high})")]
    InvertedConfidenceBand {
        /// The configured lower bound.
        tau_low: f32,
        /// The configured upper bound.
        tau_high: f32,
    },
    /// `theta_vector` was not strictly less than or equal to
    /// `theta_vector_high` (a vector match can be "high confidence" only if
    /// it would also have passed the lower retention threshold).
    #[error("theta_vector ({theta_vector}) must be <= theta_vector_high ({theta_vector_high})")]
    InvertedVectorThreshold {
        /// The retention threshold.
        theta_vector: f32,
        /// The high-confidence threshold.
        theta_vector_high: f32,
    },
    /// A required-positive field was zero.
    #[error("{field} must be greater than zero")]
    MustBePositive {
        /// The offending field's name.
        field: &'static str,
    },
    /// Changing the pattern store's embedding dimension on an existing
    /// non-empty store requires a restart (§6): rejected at the config
    /// layer rather than silently resizing.
    #[error("embedding dimension change from {from} to {to} requires a restart")]
    DimensionChangeRequiresRestart {
        /// The store's current dimension.
        from: usize,
        /// The requested new dimension.
        to: usize,
    },
}

// ============================================================================
// SECTION: Settings
// ============================================================================

/// The gateway's full, recognized configuration (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Confidence at or above which tier 1 decides immediately (§4.1 step
    /// 2). Default `0.95`.
    pub tau_high: f32,
    /// Lower bound of the uncertain band that triggers tier 3 (§4.1 step
    /// 4). Default `0.70`.
    pub tau_low: f32,
    /// Minimum cosine similarity to retain a vector candidate (§4.2 step
    /// c). Default `0.85`.
    pub theta_vector: f32,
    /// Cosine similarity at or above which a vector match alone means
    /// `threat` (§4.2). Default `0.95`.
    pub theta_vector_high: f32,
    /// Neighbors per node in the vector index (§4.3). Default `16`.
    pub vector_index_m: usize,
    /// Candidate list size during index construction (§4.3). Default `200`.
    pub ef_construction: usize,
    /// Candidate list size during search (§4.3). Default `100`.
    pub ef_search: usize,
    /// Hard per-request fast-path deadline in milliseconds (§4.1 step 2).
    /// Default `10`.
    pub fast_path_deadline_ms: u64,
    /// Deep-path deadline in milliseconds (§4.1 step 3). Default `100`.
    pub deep_path_deadline_ms: u64,
    /// Total per-request deadline in milliseconds (§4.1 step 4). Default
    /// `500`.
    pub total_deadline_ms: u64,
    /// Episodes considered in the deep-path lookback window (§4.4 "Input").
    /// Default `64`.
    pub caller_history_size: usize,
    /// MMR relevance/diversity trade-off in `[0, 1]` (§4.2 step c). Default
    /// `0.5`.
    pub mmr_lambda: f32,
    /// UCB1 exploration constant (§4.6). Default `√2`.
    pub mitigation_ucb_c: f32,
    /// Episodic memory hot-window retention in days (§4.7 "Retention").
    /// Default `7`.
    pub episode_hot_window_days: u64,
    /// Fixed worker pool size (§5). Default: number of hardware threads.
    pub worker_pool_size: usize,
    /// Queue length above which new requests are rejected with
    /// `reason = overload` (§5 "Backpressure"). No spec-mandated default;
    /// callers must size this to their deployment.
    pub overload_high_water: usize,
    /// The pattern store's fixed embedding dimension. Not itself a §6 key
    /// (the spec treats dimensionality as store-global, §3), but carried
    /// here so [`Settings::validate_dimension_change`] has something to
    /// compare a proposed new dimension against.
    pub embedding_dimension: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tau_high: 0.95,
            tau_low: 0.70,
            theta_vector: 0.85,
            theta_vector_high: 0.95,
            vector_index_m: 16,
            ef_construction: 200,
            ef_search: 100,
            fast_path_deadline_ms: 10,
            deep_path_deadline_ms: 100,
            total_deadline_ms: 500,
            caller_history_size: 64,
            mmr_lambda: 0.5,
            mitigation_ucb_c: std::f32::consts::SQRT_2,
            episode_hot_window_days: 7,
            worker_pool_size: default_worker_pool_size(),
            overload_high_water: 1024,
            embedding_dimension: 256,
        }
    }
}

fn default_worker_pool_size() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

fn check_unit_range(field: &'static str, value: f32) -> Result<(), SettingsError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SettingsError::OutOfUnitRange {
            field,
            value: f64::from(value),
        })
    }
}

impl Settings {
    /// Validates every cross-field and range invariant spec.md §6/§7
    /// (configuration errors are fatal at startup, never at request time)
    /// expects of a settings object.
    ///
    /// # Errors
    ///
    /// Returns the first [`SettingsError`] encountered.
    pub fn validate(&self) -> Result<(), SettingsError> {
        check_unit_range("tau_high", self.tau_high)?;
        check_unit_range("tau_low", self.tau_low)?;
        check_unit_range("theta_vector", self.theta_vector)?;
        check_unit_range("theta_vector_high", self.theta_vector_high)?;
        check_unit_range("mmr_lambda", self.mmr_lambda)?;

        if self.tau_low >= self.tau_high {
            return Err(SettingsError::InvertedConfidenceBand {
                tau_low: self.tau_low,
                tau_high: self.tau_high,
            });
        }
        if self.theta_vector > self.theta_vector_high {
            return Err(SettingsError::InvertedVectorThreshold {
                theta_vector: self.theta_vector,
                theta_vector_high: self.theta_vector_high,
            });
        }
        if self.vector_index_m == 0 {
            return Err(SettingsError::MustBePositive {
                field: "vector_index_m",
            });
        }
        if self.ef_construction == 0 {
            return Err(SettingsError::MustBePositive {
                field: "ef_construction",
            });
        }
        if self.ef_search == 0 {
            return Err(SettingsError::MustBePositive {
                field: "ef_search",
            });
        }
        if self.worker_pool_size == 0 {
            return Err(SettingsError::MustBePositive {
                field: "worker_pool_size",
            });
        }
        if self.embedding_dimension == 0 {
            return Err(SettingsError::MustBePositive {
                field: "embedding_dimension",
            });
        }
        Ok(())
    }

    /// Validates a proposed dimension change against the current one
    /// (§6: "changing embedding dimensionality requires a restart").
    /// Call this before swapping a new settings snapshot into a running
    /// gateway that already holds a non-empty pattern store.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::DimensionChangeRequiresRestart`] if
    /// `new_dimension` differs from `self.embedding_dimension` and
    /// `store_is_nonempty` is `true`.
    pub fn validate_dimension_change(
        &self,
        new_dimension: usize,
        store_is_nonempty: bool,
    ) -> Result<(), SettingsError> {
        if store_is_nonempty && new_dimension != self.embedding_dimension {
            return Err(SettingsError::DimensionChangeRequiresRestart {
                from: self.embedding_dimension,
                to: new_dimension,
            });
        }
        Ok(())
    }

    /// The fast-path deadline clamped to the request's own SLA, per §4.1
    /// step 2 (`min(sla_ms, fast_path_deadline_ms)`).
    #[must_use]
    pub fn fast_path_deadline(&self, sla_ms: Option<u64>) -> std::time::Duration {
        let ms = sla_ms.map_or(self.fast_path_deadline_ms, |sla| sla.min(self.fast_path_deadline_ms));
        std::time::Duration::from_millis(ms)
    }

    /// The deep-path deadline clamped to whatever of the SLA remains after
    /// tier 1, per §4.1 step 3.
    #[must_use]
    pub fn deep_path_deadline(&self, remaining_sla_ms: Option<u64>) -> std::time::Duration {
        let ms = remaining_sla_ms
            .map_or(self.deep_path_deadline_ms, |remaining| remaining.min(self.deep_path_deadline_ms));
        std::time::Duration::from_millis(ms)
    }

    /// The policy/responder deadline clamped to whatever of the SLA
    /// remains after tier 2, per §4.1 step 4.
    #[must_use]
    pub fn total_deadline(&self, remaining_sla_ms: Option<u64>) -> std::time::Duration {
        let ms = remaining_sla_ms
            .map_or(self.total_deadline_ms, |remaining| remaining.min(self.total_deadline_ms));
        std::time::Duration::from_millis(ms)
    }
}

// ============================================================================
// SECTION: Settings Cell
// ============================================================================

/// A publish/pin cell for [`Settings`]: readers call [`SettingsCell::pin`]
/// once at the start of a unit of work and use that `Arc` for the whole
/// call, even if a concurrent [`SettingsCell::publish`] installs a new
/// snapshot midway through (§9's configuration redesign strategy).
pub struct SettingsCell {
    /// The presently-published snapshot.
    current: RwLock<Arc<Settings>>,
    /// Monotonically increasing generation counter, bumped on every publish,
    /// exposed so callers/tests can observe that a publish took effect
    /// without comparing `Settings` for equality.
    generation: AtomicUsize,
}

impl SettingsCell {
    /// Creates a cell holding `initial`.
    #[must_use]
    pub fn new(initial: Settings) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
            generation: AtomicUsize::new(0),
        }
    }

    /// Pins and returns the current settings snapshot.
    #[must_use]
    pub fn pin(&self) -> Arc<Settings> {
        Arc::clone(&self.current.read())
    }

    /// Publishes `next` as the new current snapshot. In-flight pins keep
    /// their own `Arc` and are unaffected.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] if `next` fails validation; the previous
    /// snapshot is left in place.
    pub fn publish(&self, next: Settings) -> Result<(), SettingsError> {
        next.validate()?;
        *self.current.write() = Arc::new(next);
        self.generation.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// The number of successful publishes since creation, for observability.
    #[must_use]
    pub fn generation(&self) -> usize {
        self.generation.load(Ordering::Acquire)
    }
}

impl Default for SettingsCell {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_validate() {
        Settings::default().validate().expect("defaults must be valid");
    }

    #[test]
    fn rejects_inverted_confidence_band() {
        let settings = Settings {
            tau_low: 0.95,
            tau_high: 0.70,
            ..Settings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvertedConfidenceBand { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let settings = Settings {
            theta_vector: 1.5,
            ..Settings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::OutOfUnitRange { .. })
        ));
    }

    #[test]
    fn dimension_change_rejected_on_nonempty_store() {
        let settings = Settings::default();
        assert!(settings.validate_dimension_change(128, true).is_err());
        assert!(settings.validate_dimension_change(128, false).is_ok());
    }

    #[test]
    fn publish_replaces_pinned_snapshot_for_new_readers_only() {
        let cell = SettingsCell::default();
        let pinned = cell.pin();
        assert!((pinned.tau_high - 0.95).abs() < f32::EPSILON);

        let mut updated = Settings::default();
        updated.tau_high = 0.99;
        cell.publish(updated).expect("valid settings should publish");

        assert!((pinned.tau_high - 0.95).abs() < f32::EPSILON); // old pin unaffected
        assert!((cell.pin().tau_high - 0.99).abs() < f32::EPSILON);
        assert_eq!(cell.generation(), 1);
    }
}
