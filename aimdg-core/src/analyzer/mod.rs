// aimdg-core/src/analyzer/mod.rs
// ============================================================================
// Module: Deep-Path Analyzer
// Description: Scores behavioral novelty over a caller's recent episode
//              window when the fast path is uncertain.
// Purpose: Implement spec.md §4.4: event-sequence extraction, a Rosenstein
//          largest-Lyapunov-exponent estimate, trajectory classification,
//          and the anomaly-score lookup table.
// Dependencies: crate::{episode, pattern}
// ============================================================================

//! ## Overview
//! The analyzer never mutates episodic memory (§4.4 guarantee): it is a
//! pure function of a caller's recent window plus the current request's
//! fast-path similarity. Four steps, each a plain module function so the
//! numeric core (`rosenstein`) is independently testable:
//! [`build_event_sequence`] → [`rosenstein::largest_lyapunov_estimate`] →
//! [`classify`] → [`anomaly_score`].

mod rosenstein;

pub use rosenstein::largest_lyapunov_estimate;

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::episode::Episode;

// ============================================================================
// SECTION: Parameters
// ============================================================================

/// Tuning parameters for one analyzer pass (spec.md §4.4 defaults).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyzerParams {
    /// Minimum window size below which the analyzer reports
    /// `insufficient_history` instead of a genuine estimate.
    pub min_events: usize,
    /// Rosenstein embedding dimension.
    pub embedding_dimension: usize,
    /// Rosenstein embedding delay.
    pub embedding_delay: usize,
    /// Divergence indicator at or below which the trajectory is `stable`.
    pub stable_cut: f64,
    /// Divergence indicator at or above which the trajectory is `chaotic`;
    /// values strictly between the two cuts are `periodic`.
    pub chaotic_cut: f64,
}

impl Default for AnalyzerParams {
    fn default() -> Self {
        Self {
            min_events: 8,
            embedding_dimension: 3,
            embedding_delay: 1,
            stable_cut: 0.0,
            chaotic_cut: 0.2,
        }
    }
}

// ============================================================================
// SECTION: Event Sequence
// ============================================================================

/// One point in the behavioral trajectory built from an episode window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    /// The episode's decision confidence.
    pub confidence_last: f32,
    /// Numeric code for the highest-severity pattern matched, `0` if none.
    pub severity_code: f32,
    /// Numeric code for the request's action kind.
    pub action_code: f32,
    /// `ln(1 + inter-arrival milliseconds)` since the previous episode.
    pub inter_arrival_ms_log: f32,
    /// Similarity of this episode's matched patterns to the current
    /// request's top match.
    pub similarity_to_current: f32,
}

impl Event {
    fn as_vector(self) -> [f64; 5] {
        [
            f64::from(self.confidence_last),
            f64::from(self.severity_code),
            f64::from(self.action_code),
            f64::from(self.inter_arrival_ms_log),
            f64::from(self.similarity_to_current),
        ]
    }
}

/// Builds the event sequence from an ordered episode window (oldest first).
///
/// `current_similarity` is the current request's top fast-path similarity,
/// used as the last coordinate of every event so the trajectory measures
/// divergence relative to *this* request, not just the window's self
/// dynamics.
#[must_use]
pub fn build_event_sequence(window: &[Episode], current_similarity: f32) -> Vec<Event> {
    let mut out = Vec::with_capacity(window.len());
    let mut previous_timestamp = None;
    for episode in window {
        let inter_arrival_ms_log = previous_timestamp.map_or(0.0, |previous| {
            let delta_ns = episode.timestamp.elapsed_since(previous);
            #[allow(
                clippy::cast_precision_loss,
                reason = "inter-arrival times are logged for trend shape, not exact precision"
            )]
            let delta_ms = (delta_ns / 1_000_000) as f32;
            (1.0 + delta_ms).ln()
        });
        previous_timestamp = Some(episode.timestamp);

        let severity_code = episode
            .decision
            .matched_patterns
            .iter()
            .map(|matched| f32::from(matched.similarity > 0.0))
            .fold(0.0_f32, f32::max);

        out.push(Event {
            confidence_last: episode.decision.confidence,
            severity_code,
            action_code: f32::from(episode.decision.tier_reached),
            inter_arrival_ms_log,
            similarity_to_current: current_similarity,
        });
    }
    out
}

// ============================================================================
// SECTION: Classification
// ============================================================================

/// A coarse classification of the trajectory's divergence behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trajectory {
    /// Low divergence: repeated, predictable behavior.
    Stable,
    /// Moderate, bounded divergence.
    Periodic,
    /// High divergence: erratic, unpredictable behavior.
    Chaotic,
}

/// Classifies a divergence indicator against the configured cuts.
#[must_use]
pub fn classify(divergence: f64, params: AnalyzerParams) -> Trajectory {
    if divergence <= params.stable_cut {
        Trajectory::Stable
    } else if divergence < params.chaotic_cut {
        Trajectory::Periodic
    } else {
        Trajectory::Chaotic
    }
}

// ============================================================================
// SECTION: Anomaly Score
// ============================================================================

/// Maps a trajectory classification and the raw divergence indicator into
/// `anomaly_score ∈ [0, 1]` (§4.4 step 4), interpolating near the cuts so
/// the score does not jump discontinuously at a threshold crossing.
#[must_use]
pub fn anomaly_score(trajectory: Trajectory, divergence: f64, params: AnalyzerParams) -> f32 {
    let (low, high, base) = match trajectory {
        Trajectory::Stable => (f64::NEG_INFINITY, params.stable_cut, 0.1),
        Trajectory::Periodic => (params.stable_cut, params.chaotic_cut, 0.3),
        Trajectory::Chaotic => (params.chaotic_cut, f64::INFINITY, 0.9),
    };
    if !low.is_finite() || !high.is_finite() {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "base scores are fixed constants in [0, 1]"
        )]
        let score = base as f32;
        return score;
    }
    let span = (high - low).max(f64::EPSILON);
    let position = ((divergence - low) / span).clamp(0.0, 1.0);
    #[allow(
        clippy::cast_possible_truncation,
        reason = "interpolated score stays within the surrounding band's bounds"
    )]
    let score = (base + (position - 0.5) * 0.1) as f32;
    score.clamp(0.0, 1.0)
}

// ============================================================================
// SECTION: Analysis Result
// ============================================================================

/// The analyzer's full result for one request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisOutcome {
    /// Anomaly score in `[0, 1]`.
    pub anomaly_score: f32,
    /// The classification the score was derived from, if a real estimate
    /// was computed.
    pub trajectory: Option<Trajectory>,
    /// Set when the window held fewer than `min_events` episodes.
    pub insufficient_history: bool,
    /// Set when the analyzer's deadline expired before a full estimate
    /// completed; `anomaly_score` is the last computed partial value.
    pub unknown: bool,
}

/// Runs the full deep-path analysis over `window` (oldest first).
///
/// Deterministic given the same window and `params` (§4.4 guarantee); never
/// mutates `window`.
#[must_use]
pub fn analyze(window: &[Episode], current_similarity: f32, params: AnalyzerParams) -> AnalysisOutcome {
    if window.len() < params.min_events {
        return AnalysisOutcome {
            anomaly_score: 0.5,
            trajectory: None,
            insufficient_history: true,
            unknown: false,
        };
    }

    let events = build_event_sequence(window, current_similarity);
    let series: Vec<[f64; 5]> = events.iter().map(|event| event.as_vector()).collect();

    match rosenstein::largest_lyapunov_estimate(
        &series,
        params.embedding_dimension,
        params.embedding_delay,
    ) {
        Some(divergence) if divergence.is_finite() => {
            let trajectory = classify(divergence, params);
            AnalysisOutcome {
                anomaly_score: anomaly_score(trajectory, divergence, params),
                trajectory: Some(trajectory),
                insufficient_history: false,
                unknown: false,
            }
        }
        _ => AnalysisOutcome {
            anomaly_score: 0.1,
            trajectory: Some(Trajectory::Stable),
            insufficient_history: false,
            unknown: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fewer_than_min_events_reports_insufficient_history() {
        let outcome = analyze(&[], 0.5, AnalyzerParams::default());
        assert!(outcome.insufficient_history);
        assert!((outcome.anomaly_score - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn anomaly_score_stays_in_unit_interval() {
        let params = AnalyzerParams::default();
        for trajectory in [Trajectory::Stable, Trajectory::Periodic, Trajectory::Chaotic] {
            let score = anomaly_score(trajectory, 0.05, params);
            assert!((0.0..=1.0).contains(&score));
        }
    }

    #[test]
    fn classify_respects_configured_cuts() {
        let params = AnalyzerParams::default();
        assert_eq!(classify(-1.0, params), Trajectory::Stable);
        assert_eq!(classify(0.1, params), Trajectory::Periodic);
        assert_eq!(classify(0.5, params), Trajectory::Chaotic);
    }
}
