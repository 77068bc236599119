// aimdg-core/src/store/mod.rs
// ============================================================================
// Module: Pattern Store
// Description: Ties the literal/regex, token-anchor, and vector sub-indices
//              into the single `PatternStore` the fast-path detector and
//              operator tooling consult.
// Purpose: Implement spec.md §4.3's full operation set over §3's
//          `ThreatPattern` model: `insert`, `update`, `query_text`,
//          `query_vector`, `snapshot`, `rebuild_vector_index`.
// Dependencies: parking_lot, crate::{ids, pattern, time}
// ============================================================================

//! ## Overview
//! The store holds the authoritative [`crate::pattern::ThreatPattern`]
//! table plus three read-optimized sub-indices built over it:
//! [`literal_index::LiteralIndex`] (literal/regex), [`token_anchor_index`]
//! (DTW candidates), and [`vector_index::VectorIndex`] (embeddings). All
//! four live behind one [`parking_lot::RwLock`], matching the concurrency
//! posture spec.md §5 calls for ("many concurrent readers, rare exclusive
//! writers, atomic at a single pointer for the vector index's rebuild").
//! Readers never block on reindexing: `query_text` takes the read lock for
//! exactly as long as it takes to clone the match lists it needs, and the
//! vector index itself is never torn out from under a reader because
//! `rebuild_vector_index` builds the replacement before taking the write
//! lock to install it.

pub mod literal_index;
pub mod token_anchor_index;
pub mod vector_index;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;

use parking_lot::RwLock;
use thiserror::Error;

use crate::ids::PatternId;
use crate::ids::PatternIdAllocator;
use crate::pattern::PatternUpdate;
use crate::pattern::Signature;
use crate::pattern::ThreatPattern;
use crate::time::Timestamp;

use literal_index::LiteralIndex;
use literal_index::LiteralIndexError;
use literal_index::LiteralMatch;
use token_anchor_index::TokenAnchorIndex;
use token_anchor_index::dtw_distance;
use token_anchor_index::dtw_similarity;
use token_anchor_index::tokenize;
use vector_index::VectorIndex;
pub use vector_index::VectorIndexParams;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by [`PatternStore`] operations.
#[derive(Debug, Error)]
pub enum PatternStoreError {
    /// An inserted pattern's embedding did not match the store's configured
    /// dimension (§4.3: "never changes embedding dimensionality").
    #[error("embedding dimension {actual} does not match store dimension {expected}")]
    DimensionMismatch {
        /// The store's fixed dimension.
        expected: usize,
        /// The rejected pattern's dimension.
        actual: usize,
    },
    /// `update` targeted a pattern the store does not hold.
    #[error("no such pattern: {0}")]
    UnknownPattern(PatternId),
    /// `update` tried to lower `confidence_baseline` without setting
    /// `reset_confidence` (§4.3 monotonicity invariant).
    #[error("confidence_baseline is monotonic non-decreasing; pass reset_confidence to override")]
    ConfidenceWouldDecrease,
    /// A regex or literal signature failed to index.
    #[error(transparent)]
    Literal(#[from] LiteralIndexError),
}

// ============================================================================
// SECTION: Query Results
// ============================================================================

/// One text-query hit, tagged with which sub-index produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextMatch {
    /// An exact literal substring matched.
    Literal {
        /// The matched pattern.
        pattern_id: PatternId,
    },
    /// A compiled regex matched.
    Regex {
        /// The matched pattern.
        pattern_id: PatternId,
    },
    /// A token sequence matched above `similarity` by DTW.
    TokenSequence {
        /// The matched pattern.
        pattern_id: PatternId,
        /// DTW-derived similarity in `[0, 1]`.
        similarity: f32,
    },
}

impl TextMatch {
    /// The matched pattern's id, regardless of which sub-index produced it.
    #[must_use]
    pub const fn pattern_id(&self) -> PatternId {
        match self {
            Self::Literal { pattern_id }
            | Self::Regex { pattern_id }
            | Self::TokenSequence { pattern_id, .. } => *pattern_id,
        }
    }
}

// ============================================================================
// SECTION: Inner State
// ============================================================================

struct Inner {
    patterns: HashMap<PatternId, ThreatPattern>,
    literal_index: LiteralIndex,
    token_index: TokenAnchorIndex,
    vector_index: VectorIndex,
}

// ============================================================================
// SECTION: Pattern Store
// ============================================================================

/// The gateway's authoritative threat-pattern table and its query indices.
pub struct PatternStore {
    dimension: usize,
    allocator: PatternIdAllocator,
    inner: RwLock<Inner>,
}

impl PatternStore {
    /// Creates an empty store fixed to `dimension`-length embeddings.
    #[must_use]
    pub fn new(dimension: usize, vector_params: VectorIndexParams) -> Self {
        Self {
            dimension,
            allocator: PatternIdAllocator::new(),
            inner: RwLock::new(Inner {
                patterns: HashMap::new(),
                literal_index: LiteralIndex::empty(),
                token_index: TokenAnchorIndex::new(),
                vector_index: VectorIndex::new(dimension, vector_params),
            }),
        }
    }

    /// The embedding dimension every pattern in this store must satisfy.
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Inserts a freshly allocated pattern, built from the caller-supplied
    /// fields, and rebuilds the literal/regex automaton to include it.
    ///
    /// # Errors
    ///
    /// Returns [`PatternStoreError::DimensionMismatch`] if `embedding.len()`
    /// does not equal the store's dimension, or
    /// [`PatternStoreError::Literal`] if a regex signature fails to compile.
    pub fn insert(
        &self,
        kind: crate::pattern::PatternKind,
        severity: crate::pattern::Severity,
        signature: Signature,
        embedding: Vec<f32>,
        confidence_baseline: f32,
        source: crate::pattern::PatternSource,
        now: Timestamp,
    ) -> Result<PatternId, PatternStoreError> {
        if embedding.len() != self.dimension {
            return Err(PatternStoreError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        let id = self.allocator.next_id();
        let pattern = ThreatPattern {
            id,
            kind,
            severity,
            signature,
            embedding: embedding.clone(),
            confidence_baseline,
            first_seen: now,
            last_seen: now,
            detection_count: 0,
            source,
        };

        let mut inner = self.inner.write();
        inner.patterns.insert(id, pattern.clone());
        if let Signature::TokenSequence { tokens, anchor } = &pattern.signature {
            inner.token_index.insert(id, anchor, tokens.clone());
        }
        inner.vector_index.insert(id, embedding);
        Self::rebuild_literal_index(&mut inner)?;
        Ok(id)
    }

    fn rebuild_literal_index(inner: &mut Inner) -> Result<(), PatternStoreError> {
        let mut literals = Vec::new();
        let mut regexes = Vec::new();
        for pattern in inner.patterns.values() {
            match &pattern.signature {
                Signature::LiteralSubstring { text } => literals.push((pattern.id, text.clone())),
                Signature::CompiledRegex { pattern: source } => {
                    regexes.push((pattern.id, source.clone()));
                }
                Signature::TokenSequence { .. } => {}
            }
        }
        inner.literal_index = LiteralIndex::build(&literals, &regexes)?;
        Ok(())
    }

    /// Applies a non-resizing delta to an existing pattern (§4.3).
    ///
    /// # Errors
    ///
    /// Returns [`PatternStoreError::UnknownPattern`] if `pattern_id` is not
    /// held, or [`PatternStoreError::ConfidenceWouldDecrease`] if the delta
    /// would lower `confidence_baseline` without `reset_confidence`.
    pub fn update(
        &self,
        pattern_id: PatternId,
        delta: PatternUpdate,
    ) -> Result<(), PatternStoreError> {
        let mut inner = self.inner.write();
        let pattern = inner
            .patterns
            .get_mut(&pattern_id)
            .ok_or(PatternStoreError::UnknownPattern(pattern_id))?;

        if let Some(new_confidence) = delta.confidence_baseline {
            if new_confidence < pattern.confidence_baseline && !delta.reset_confidence {
                return Err(PatternStoreError::ConfidenceWouldDecrease);
            }
            pattern.confidence_baseline = new_confidence;
        }
        pattern.last_seen = delta.observed_at;
        pattern.detection_count = pattern.detection_count.saturating_add(delta.additional_detections);
        Ok(())
    }

    /// Marks a pattern deleted: removed from the authoritative table and
    /// tombstoned in the vector index, reconciled on the next rebuild.
    pub fn remove(&self, pattern_id: PatternId) -> Result<(), PatternStoreError> {
        let mut inner = self.inner.write();
        if inner.patterns.remove(&pattern_id).is_none() {
            return Err(PatternStoreError::UnknownPattern(pattern_id));
        }
        inner.vector_index.tombstone(pattern_id);
        Self::rebuild_literal_index(&mut inner)?;
        Ok(())
    }

    /// Runs the literal/regex scan and anchor-gated DTW pass against `text`
    /// (spec.md §4.2 sub-operations (a) and (b)); does not consult the
    /// vector index (see [`Self::query_vector`]).
    #[must_use]
    pub fn query_text(&self, text: &str) -> Vec<TextMatch> {
        let inner = self.inner.read();
        let mut out: Vec<TextMatch> = inner
            .literal_index
            .scan(text)
            .into_iter()
            .map(|hit: LiteralMatch| {
                if hit.is_regex {
                    TextMatch::Regex {
                        pattern_id: hit.pattern_id,
                    }
                } else {
                    TextMatch::Literal {
                        pattern_id: hit.pattern_id,
                    }
                }
            })
            .collect();

        let present = tokenize(text);
        for (pattern_id, tokens) in inner.token_index.candidates(&present) {
            let distance = dtw_distance(&present, tokens);
            let similarity = dtw_similarity(distance, present.len(), tokens.len());
            out.push(TextMatch::TokenSequence {
                pattern_id,
                similarity,
            });
        }
        out
    }

    /// Returns the top-`k` patterns by embedding similarity to `query`
    /// (spec.md §4.2 sub-operation (c)).
    #[must_use]
    pub fn query_vector(&self, query: &[f32], k: usize) -> Vec<(PatternId, f32)> {
        let inner = self.inner.read();
        inner.vector_index.search(query, k)
    }

    /// Returns a point-in-time clone of every live pattern, for snapshotting
    /// or operator inspection (§4.3).
    #[must_use]
    pub fn snapshot(&self) -> Vec<ThreatPattern> {
        self.inner.read().patterns.values().cloned().collect()
    }

    /// Returns a point-in-time clone of one pattern, if still live. Used by
    /// the orchestrator to resolve a match's severity/kind for policy and
    /// responder findings without holding the store's lock across the call.
    #[must_use]
    pub fn get(&self, pattern_id: PatternId) -> Option<ThreatPattern> {
        self.inner.read().patterns.get(&pattern_id).cloned()
    }

    /// Rebuilds the vector index from the current live pattern set and
    /// installs it as the new index in one write-lock critical section
    /// (§4.3, §5: "atomic at a single pointer").
    pub fn rebuild_vector_index(&self) {
        let rebuilt = {
            let inner = self.inner.read();
            inner.vector_index.rebuild()
        };
        self.inner.write().vector_index = rebuilt;
    }

    /// Quantizes the live vector index to 8 bits per component, trading
    /// similarity precision for memory under pressure (§4.3 failure
    /// semantics).
    pub fn quantize_vector_index(&self) {
        self.inner.write().vector_index.quantize_all();
    }

    /// Number of patterns currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().patterns.len()
    }

    /// `true` if the store holds no patterns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
