// aimdg-core/src/store/literal_index.rs
// ============================================================================
// Module: Literal/Regex Index
// Description: Multi-pattern literal and regex matcher over pattern
//              signatures.
// Purpose: Implement spec.md §4.2 sub-operation (a): scan a text against
//          every literal and regex signature in O(n) total text length.
// Dependencies: aho-corasick, regex
// ============================================================================

//! ## Overview
//! Literal signatures compile into a single [`aho_corasick::AhoCorasick`]
//! automaton; regex signatures compile individually (the `regex` crate has
//! no shared-NFA multi-pattern API, so each compiled regex is tried in
//! sequence — still linear in text length per regex, and the set of regex
//! signatures is expected to be small relative to literals). Both live
//! behind one [`LiteralIndex`] so the detector issues one call per scan.

// ============================================================================
// SECTION: Imports
// ============================================================================

use aho_corasick::AhoCorasick;
use aho_corasick::AhoCorasickBuilder;
use aho_corasick::MatchKind;
use regex::Regex;
use thiserror::Error;

use crate::ids::PatternId;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors building or querying the literal/regex index.
#[derive(Debug, Error)]
pub enum LiteralIndexError {
    /// A regex signature failed to compile.
    #[error("invalid regex signature for pattern {pattern_id}: {source}")]
    InvalidRegex {
        /// The offending pattern.
        pattern_id: PatternId,
        /// The underlying compile error.
        #[source]
        source: regex::Error,
    },
    /// The Aho-Corasick automaton failed to build (e.g. pathological
    /// pattern set).
    #[error("failed to build literal automaton: {0}")]
    AutomatonBuild(String),
}

// ============================================================================
// SECTION: Match
// ============================================================================

/// One literal or regex match against a scanned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiteralMatch {
    /// The pattern that matched.
    pub pattern_id: PatternId,
    /// Whether the match came from a literal substring or a regex.
    pub is_regex: bool,
}

// ============================================================================
// SECTION: Literal Index
// ============================================================================

struct RegexEntry {
    pattern_id: PatternId,
    regex: Regex,
}

/// Compiled automaton over every literal and regex signature in the store.
pub struct LiteralIndex {
    automaton: Option<AhoCorasick>,
    literal_ids: Vec<PatternId>,
    regexes: Vec<RegexEntry>,
}

impl LiteralIndex {
    /// Builds an index from literal signatures (paired with their pattern
    /// id, in automaton-match order) and regex signatures.
    ///
    /// # Errors
    ///
    /// Returns [`LiteralIndexError`] if any regex fails to compile or the
    /// automaton cannot be built.
    pub fn build(
        literals: &[(PatternId, String)],
        regexes: &[(PatternId, String)],
    ) -> Result<Self, LiteralIndexError> {
        let automaton = if literals.is_empty() {
            None
        } else {
            Some(
                AhoCorasickBuilder::new()
                    .match_kind(MatchKind::LeftmostLongest)
                    .build(literals.iter().map(|(_, text)| text.as_str()))
                    .map_err(|err| LiteralIndexError::AutomatonBuild(err.to_string()))?,
            )
        };
        let literal_ids = literals.iter().map(|(id, _)| *id).collect();

        let mut compiled = Vec::with_capacity(regexes.len());
        for (pattern_id, source) in regexes {
            let regex = Regex::new(source).map_err(|source| LiteralIndexError::InvalidRegex {
                pattern_id: *pattern_id,
                source,
            })?;
            compiled.push(RegexEntry {
                pattern_id: *pattern_id,
                regex,
            });
        }

        Ok(Self {
            automaton,
            literal_ids,
            regexes: compiled,
        })
    }

    /// Builds an empty index (no literal or regex signatures registered).
    #[must_use]
    pub fn empty() -> Self {
        Self {
            automaton: None,
            literal_ids: Vec::new(),
            regexes: Vec::new(),
        }
    }

    /// Scans `text`, returning every literal or regex pattern that matched.
    /// Allocation-free aside from the returned vector, matching the §4.2
    /// cost requirement for step (a).
    #[must_use]
    pub fn scan(&self, text: &str) -> Vec<LiteralMatch> {
        let mut out = Vec::new();
        if let Some(automaton) = &self.automaton {
            for hit in automaton.find_iter(text) {
                if let Some(pattern_id) = self.literal_ids.get(hit.pattern().as_usize()) {
                    out.push(LiteralMatch {
                        pattern_id: *pattern_id,
                        is_regex: false,
                    });
                }
            }
        }
        for entry in &self.regexes {
            if entry.regex.is_match(text) {
                out.push(LiteralMatch {
                    pattern_id: entry.pattern_id,
                    is_regex: true,
                });
            }
        }
        out
    }
}
