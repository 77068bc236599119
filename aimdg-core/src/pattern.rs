// aimdg-core/src/pattern.rs
// ============================================================================
// Module: Threat Pattern
// Description: The authoritative record type held by the pattern store.
// Purpose: Model `ThreatPattern` exactly as spec.md §3 defines it, including
//          its three signature shapes and the invariants the store enforces
//          on update.
// Dependencies: crate::{ids, time}
// ============================================================================

//! ## Overview
//! A [`ThreatPattern`] is immutable except through the pattern store's
//! published operations (`insert`, `update`): callers never mutate fields
//! directly, matching the ownership rule in spec.md §3 ("the pattern store
//! exclusively owns `ThreatPattern`").

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::ids::PatternId;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Kind, Severity, Source
// ============================================================================

/// The category of threat a pattern detects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// An attempt to override the model's instructions.
    PromptInjection,
    /// An attempt to break out of an assistant persona or guardrails.
    Jailbreak,
    /// An attempt to exfiltrate data through the model.
    DataExfiltration,
    /// Leakage of personally identifiable information.
    PiiLeak,
    /// Misuse of a tool-call capability.
    ToolAbuse,
    /// A signature tied to a previously identified attacker.
    KnownAttacker,
    /// An operator-defined category not covered above.
    Custom(String),
}

/// Severity of a threat pattern, ordered `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Low severity.
    Low,
    /// Medium severity.
    Medium,
    /// High severity.
    High,
    /// Critical severity; a policy violation at this level vetoes a request
    /// (§4.5 tie-break rule).
    Critical,
}

/// Where a pattern came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternSource {
    /// Shipped with the gateway at deployment time.
    Seeded,
    /// Learned from episodic feedback.
    Learned,
    /// Added by an operator.
    Operator,
}

// ============================================================================
// SECTION: Signature
// ============================================================================

/// The matchable shape of a threat pattern.
///
/// Exactly one of the three forms the fast-path detector understands
/// (spec.md §4.2 sub-operations (a) and (b)).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Signature {
    /// An exact substring, matched by the literal automaton.
    LiteralSubstring {
        /// The literal text to match.
        text: String,
    },
    /// A regular expression, matched by the shared NFA.
    CompiledRegex {
        /// The regex source pattern. Compiled lazily by the literal index;
        /// not stored compiled here so `ThreatPattern` stays plain data.
        pattern: String,
    },
    /// A token sequence, matched by dynamic time warping when its anchor
    /// token is present in the scanned text.
    TokenSequence {
        /// The pattern's token sequence.
        tokens: Vec<String>,
        /// An indexable token whose presence gates DTW evaluation
        /// (spec.md §9 resolves the anchor-gated vs. always-on ambiguity
        /// in favor of gating).
        anchor: String,
    },
}

// ============================================================================
// SECTION: ThreatPattern
// ============================================================================

/// A known threat signature held by the pattern store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatPattern {
    /// Monotonic identifier, never reused.
    pub id: PatternId,
    /// The category of threat.
    pub kind: PatternKind,
    /// Severity, consumed by the policy engine's tie-break rules.
    pub severity: Severity,
    /// The matchable signature.
    pub signature: Signature,
    /// Fixed-length embedding vector. Dimension is uniform across the
    /// store; enforced by `PatternStore::insert`.
    pub embedding: Vec<f32>,
    /// Baseline confidence in `[0, 1]`. Monotonic non-decreasing across
    /// updates unless manually reset.
    pub confidence_baseline: f32,
    /// When the pattern was first inserted.
    pub first_seen: Timestamp,
    /// When the pattern was last matched or updated.
    pub last_seen: Timestamp,
    /// Free-running match counter.
    pub detection_count: u64,
    /// Provenance.
    pub source: PatternSource,
}

impl ThreatPattern {
    /// Returns `true` if `embedding.len()` equals `dimension`, the
    /// store-wide invariant spec.md §8 tests directly.
    #[must_use]
    pub fn has_dimension(&self, dimension: usize) -> bool {
        self.embedding.len() == dimension
    }
}

// ============================================================================
// SECTION: Update Delta
// ============================================================================

/// Fields `PatternStore::update` is allowed to change. Embedding dimension
/// is never part of a delta: the store's invariant ("never changes embedding
/// dimensionality", spec.md §4.3) is enforced by keeping resize out of the
/// delta's vocabulary entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternUpdate {
    /// New confidence baseline, if changing. Rejected by the store if it
    /// would decrease the value (the spec invariant), unless
    /// `reset_confidence` is also set.
    pub confidence_baseline: Option<f32>,
    /// Explicit reset, bypassing the monotonicity invariant once.
    pub reset_confidence: bool,
    /// Timestamp of the observation driving this update.
    pub observed_at: Timestamp,
    /// Number of additional detections to add to `detection_count`.
    pub additional_detections: u64,
}
