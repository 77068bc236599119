// aimdg-core/src/episode.rs
// ============================================================================
// Module: Episode
// Description: One entry in episodic memory, tying a decision to its
//              eventual outcome.
// Purpose: Model `Episode` exactly as spec.md §3 defines it, including the
//          causal-graph invariant from the §9 redesign strategy.
// Dependencies: crate::{decision, ids, time}
// ============================================================================

//! ## Overview
//! An [`Episode`] is created after every decision and may later be updated
//! once with feedback. Its `parent_episode_id`, when present, forms a DAG
//! with no cycles — enforced not by graph traversal but by construction:
//! spec.md §9 requires `parent_id` be strictly smaller than the child's own
//! id, which [`EpisodeIdAllocator`](crate::ids::EpisodeIdAllocator)'s
//! monotonic counter makes free to check.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::decision::DecisionRecord;
use crate::ids::EpisodeId;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Whether a mitigation, in hindsight, actually worked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The mitigation prevented harm.
    Effective,
    /// The mitigation did not prevent harm.
    Ineffective,
    /// No feedback has arrived yet.
    Unknown,
}

impl Default for Outcome {
    fn default() -> Self {
        Self::Unknown
    }
}

// ============================================================================
// SECTION: Episode
// ============================================================================

/// One append-only entry in episodic memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    /// This episode's own monotonic id, assigned on append.
    pub id: EpisodeId,
    /// The decision this episode records.
    pub decision: DecisionRecord,
    /// Feature vector derived from the request/decision, consumed by the
    /// deep-path analyzer's trajectory construction (§4.4).
    pub feature_vector: Vec<f32>,
    /// Whether the applied mitigation, in hindsight, worked.
    pub outcome: Outcome,
    /// Effectiveness in `[0, 1]`, meaningful once `outcome != Unknown`.
    pub effectiveness: f32,
    /// The episode this one causally follows, if any.
    pub parent_episode_id: Option<EpisodeId>,
    /// When the episode was created.
    pub timestamp: Timestamp,
}

impl Episode {
    /// Returns `true` if `parent_episode_id`, when present, is strictly
    /// smaller than `id` — the acyclicity invariant spec.md §9 relies on.
    #[must_use]
    pub fn has_acyclic_parent(&self) -> bool {
        self.parent_episode_id
            .is_none_or(|parent| parent < self.id)
    }

    /// Applies feedback to the episode's `outcome`/`effectiveness` fields.
    ///
    /// Per spec.md §3 and §8, this is exactly-once: callers must check
    /// `outcome == Outcome::Unknown` before calling, which the episodic
    /// memory store (not this type) enforces at the storage boundary.
    pub fn apply_outcome(&mut self, outcome: Outcome, effectiveness: f32) {
        self.outcome = outcome;
        self.effectiveness = effectiveness.clamp(0.0, 1.0);
    }
}
