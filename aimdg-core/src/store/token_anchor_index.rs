// aimdg-core/src/store/token_anchor_index.rs
// ============================================================================
// Module: Token-Anchor Index and DTW
// Description: Anchor-token lookup plus dynamic time warping for token-
//              sequence threat patterns.
// Purpose: Implement spec.md §4.2 sub-operation (b): gate the O(n*m) DTW
//          computation behind an O(1) anchor-token presence check.
// Dependencies: crate::ids
// ============================================================================

//! ## Overview
//! Each token-sequence [`crate::pattern::Signature::TokenSequence`] names an
//! anchor token. `TokenAnchorIndex` maps anchor tokens to the patterns that
//! declare them, so the detector only pays for DTW against patterns whose
//! anchor is actually present in the prompt — spec.md §9 resolves the
//! "always on vs. anchor-gated" ambiguity in favor of this gating.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;

use crate::ids::PatternId;

// ============================================================================
// SECTION: Token Anchor Index
// ============================================================================

/// Maps anchor tokens to the patterns that use them.
#[derive(Debug, Default)]
pub struct TokenAnchorIndex {
    by_anchor: HashMap<String, Vec<(PatternId, Vec<String>)>>,
}

impl TokenAnchorIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_anchor: HashMap::new(),
        }
    }

    /// Registers a token-sequence pattern under its anchor token.
    pub fn insert(&mut self, pattern_id: PatternId, anchor: &str, tokens: Vec<String>) {
        self.by_anchor
            .entry(anchor.to_string())
            .or_default()
            .push((pattern_id, tokens));
    }

    /// Returns the candidate patterns (with their token sequences) gated by
    /// whether `present_tokens` contains each candidate's anchor.
    #[must_use]
    pub fn candidates(&self, present_tokens: &[String]) -> Vec<(PatternId, &[String])> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for token in present_tokens {
            if let Some(entries) = self.by_anchor.get(token) {
                for (pattern_id, tokens) in entries {
                    if seen.insert(*pattern_id) {
                        out.push((*pattern_id, tokens.as_slice()));
                    }
                }
            }
        }
        out
    }
}

// ============================================================================
// SECTION: Tokenization
// ============================================================================

/// Splits text into lowercase whitespace-delimited tokens.
///
/// Deliberately simple: the spec does not define a tokenizer, and DTW's
/// O(n*m) cost already bounds how much sophistication is worth paying for
/// here relative to the embedder's own tokenization.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect()
}

// ============================================================================
// SECTION: Dynamic Time Warping
// ============================================================================

/// Computes the dynamic-time-warping edit distance between two token
/// sequences, using exact-match substitution cost (`0` for equal tokens,
/// `1` otherwise) and unit insertion/deletion cost.
#[must_use]
pub fn dtw_distance(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    if a.is_empty() || b.is_empty() {
        return a.len().max(b.len()) as f64;
    }

    let rows = a.len() + 1;
    let cols = b.len() + 1;
    let mut grid = vec![f64::INFINITY; rows * cols];
    grid[0] = 0.0;

    for (i, token_a) in a.iter().enumerate() {
        for (j, token_b) in b.iter().enumerate() {
            let cost = if token_a == token_b { 0.0 } else { 1.0 };
            let row = i + 1;
            let col = j + 1;
            let prior_min = grid[(row - 1) * cols + (col - 1)]
                .min(grid[(row - 1) * cols + col])
                .min(grid[row * cols + (col - 1)]);
            grid[row * cols + col] = cost + prior_min;
        }
    }

    grid[rows * cols - 1]
}

/// Converts a DTW distance into a similarity in `[0, 1]` using the
/// longer-sequence length as `d_max` (spec.md §4.2: `similarity = 1 - d /
/// d_max`).
#[must_use]
pub fn dtw_similarity(distance: f64, a_len: usize, b_len: usize) -> f32 {
    let d_max = a_len.max(b_len).max(1) as f64;
    #[allow(
        clippy::cast_possible_truncation,
        reason = "similarity is clamped to [0, 1] before narrowing to f32"
    )]
    let similarity = (1.0 - distance / d_max).clamp(0.0, 1.0) as f32;
    similarity
}
