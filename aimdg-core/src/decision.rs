// aimdg-core/src/decision.rs
// ============================================================================
// Module: Decision Record
// Description: The canonical, authenticable output of `admit`.
// Purpose: Model `DecisionRecord` (spec.md §3) and its canonical binary wire
//          codec (spec.md §6), matching the exact field order and widths
//          specified there.
// Dependencies: crate::{ids, pattern, signing, time}
// ============================================================================

//! ## Overview
//! [`DecisionRecord`] is the single output of `Gateway::admit`. Two
//! representations exist side by side: the plain struct (serde-derived, used
//! for JSON at the boundary and for hashing into episodes) and the canonical
//! binary codec in this module (`to_canonical_bytes` / `from_canonical_bytes`),
//! which matches spec.md §6's wire format byte-for-byte. `reason`, carried on
//! the struct for audit/JSON purposes, is not part of the wire format spec.md
//! §6 defines; it is reconstructible by the consumer from `verdict` and
//! `matched_patterns` and is omitted from the signed bytes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::ids::PatternId;
use crate::ids::RequestId;
use crate::pattern::Severity;

// ============================================================================
// SECTION: Verdict
// ============================================================================

/// The gateway's admission decision for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The request passes through unmodified.
    Allow,
    /// The request is modified (e.g. PII redacted) before forwarding.
    Sanitize,
    /// The request is refused entirely.
    Reject,
    /// The request is held for human or out-of-band review.
    Escalate,
}

impl Verdict {
    const fn wire_tag(self) -> u8 {
        match self {
            Self::Allow => 0,
            Self::Sanitize => 1,
            Self::Reject => 2,
            Self::Escalate => 3,
        }
    }

    const fn from_wire_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Allow),
            1 => Some(Self::Sanitize),
            2 => Some(Self::Reject),
            3 => Some(Self::Escalate),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Match Source
// ============================================================================

/// Which fast-path or deep-path sub-operation produced a pattern match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    /// Literal substring match (§4.2 step a).
    Literal,
    /// Compiled regex match (§4.2 step a).
    Regex,
    /// Token-sequence DTW match (§4.2 step b).
    TokenDtw,
    /// Vector similarity match (§4.2 step c).
    Vector,
}

impl MatchSource {
    const fn wire_tag(self) -> u8 {
        match self {
            Self::Literal => 0,
            Self::Regex => 1,
            Self::TokenDtw => 2,
            Self::Vector => 3,
        }
    }

    const fn from_wire_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Literal),
            1 => Some(Self::Regex),
            2 => Some(Self::TokenDtw),
            3 => Some(Self::Vector),
            _ => None,
        }
    }
}

/// One matched pattern, as recorded in a `DecisionRecord`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchedPattern {
    /// The matched pattern's identifier.
    pub pattern_id: PatternId,
    /// Similarity/confidence of the match in `[0, 1]`.
    pub similarity: f32,
    /// Which sub-operation produced the match.
    pub source: MatchSource,
}

// ============================================================================
// SECTION: Mitigation Tag
// ============================================================================

/// A mitigation strategy the adaptive responder may select (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MitigationTag {
    /// Pass the request through unmodified.
    Allow,
    /// Remove injected instruction-like text from the prompt.
    StripInstructions,
    /// Redact detected PII before forwarding.
    RedactPii,
    /// Isolate untrusted context from the trusted instruction channel.
    ContextIsolate,
    /// Rewrite the prompt via the (external) LLM router.
    RewritePrompt,
    /// Escalate to human review.
    EscalateToHuman,
    /// Refuse the request outright.
    Reject,
}

impl MitigationTag {
    /// Collateral-severity ordering used to break UCB1 ties (§4.6):
    /// `allow < strip_instructions < redact_pii < context_isolate <
    /// rewrite_prompt < escalate < reject`.
    #[must_use]
    pub const fn collateral_rank(self) -> u8 {
        match self {
            Self::Allow => 0,
            Self::StripInstructions => 1,
            Self::RedactPii => 2,
            Self::ContextIsolate => 3,
            Self::RewritePrompt => 4,
            Self::EscalateToHuman => 5,
            Self::Reject => 6,
        }
    }

    const fn wire_tag(self) -> u8 {
        match self {
            Self::Allow => 1,
            Self::StripInstructions => 2,
            Self::RedactPii => 3,
            Self::ContextIsolate => 4,
            Self::RewritePrompt => 5,
            Self::EscalateToHuman => 6,
            Self::Reject => 7,
        }
    }

    const fn from_wire_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Allow),
            2 => Some(Self::StripInstructions),
            3 => Some(Self::RedactPii),
            4 => Some(Self::ContextIsolate),
            5 => Some(Self::RewritePrompt),
            6 => Some(Self::EscalateToHuman),
            7 => Some(Self::Reject),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Reason Code
// ============================================================================

/// A bounded set of reasons for a non-`allow` verdict (spec.md §7
/// "User-visible behavior").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// The worker pool's queue exceeded the high-water mark.
    Overload,
    /// The policy engine's deadline expired before a verdict was reached.
    PolicyTimeout,
    /// No mitigation strategy was applicable.
    NoStrategy,
    /// A pattern match indicated a known threat.
    ThreatDetected,
    /// The deep-path analyzer flagged anomalous behavior.
    AnomalousBehavior,
    /// A named policy's formula was violated.
    PolicyViolation(String),
}

// ============================================================================
// SECTION: Decision Record
// ============================================================================

/// The tier at which the pipeline reached a confident verdict.
pub type Tier = u8;

/// The canonical, authenticable output of `Gateway::admit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// The request this record decides.
    pub request_id: RequestId,
    /// The admission verdict.
    pub verdict: Verdict,
    /// Highest tier consulted (`1`, `2`, or `3`).
    pub tier_reached: Tier,
    /// Combined confidence in `[0, 1]`.
    pub confidence: f32,
    /// Matches from all consulted tiers, merged and ordered by descending
    /// similarity (ties broken by ascending pattern id, §4.1).
    pub matched_patterns: Vec<MatchedPattern>,
    /// The mitigation applied, set iff `verdict == Sanitize` (§3 invariant).
    pub mitigation_applied: Option<MitigationTag>,
    /// End-to-end latency in nanoseconds.
    pub latency_ns: u64,
    /// Reason for a non-`allow` verdict. Not part of the wire encoding.
    pub reason: Option<ReasonCode>,
    /// Keyed-MAC proof token over the canonical signed bytes.
    pub proof_token: Vec<u8>,
}

impl DecisionRecord {
    /// Returns `true` if the record satisfies the spec.md §3 invariant that
    /// a `Sanitize` verdict always carries a mitigation tag.
    #[must_use]
    pub const fn satisfies_mitigation_invariant(&self) -> bool {
        match self.verdict {
            Verdict::Sanitize => self.mitigation_applied.is_some(),
            _ => true,
        }
    }

    /// Merges and orders matches from multiple tiers per the §4.1 tie-break
    /// rule: descending similarity, ties broken by ascending pattern id.
    pub fn merge_matches(mut matches: Vec<MatchedPattern>) -> Vec<MatchedPattern> {
        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.pattern_id.cmp(&b.pattern_id))
        });
        matches
    }
}

// ============================================================================
// SECTION: Canonical Codec
// ============================================================================

/// Errors decoding a canonical `DecisionRecord` byte string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecisionCodecError {
    /// The buffer ended before a fixed-width field could be read.
    #[error("truncated decision record: expected at least {expected} bytes, had {actual}")]
    Truncated {
        /// Minimum bytes required at the point of failure.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },
    /// An unsupported wire format version was encountered.
    #[error("unsupported decision record wire version: {version}")]
    UnsupportedVersion {
        /// The unsupported version byte.
        version: u8,
    },
    /// A tagged field held a value outside its known enumeration.
    #[error("invalid {field} tag: {tag}")]
    InvalidTag {
        /// Name of the offending field.
        field: &'static str,
        /// The unrecognized tag byte.
        tag: u8,
    },
}

/// Current wire format version.
pub const WIRE_VERSION: u8 = 1;

/// Width in bytes of a wire-format id (`request_id`, each match's
/// `pattern_id`). The data model's ids are narrower than this (a `u128` and
/// a monotonic `u64` respectively); both are zero-extended on the left to
/// fill the spec-mandated 16-byte id width and zero-checked on decode.
const WIRE_ID_WIDTH: usize = 16;

fn push_id128(out: &mut Vec<u8>, value: u128) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn push_id64_widened(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&[0_u8; 8]);
    out.extend_from_slice(&value.to_be_bytes());
}

fn read_id128(buf: &[u8], at: usize) -> Result<u128, DecisionCodecError> {
    let slice = read_exact(buf, at, WIRE_ID_WIDTH)?;
    let mut bytes = [0_u8; WIRE_ID_WIDTH];
    bytes.copy_from_slice(slice);
    Ok(u128::from_be_bytes(bytes))
}

fn read_id64_widened(buf: &[u8], at: usize) -> Result<u64, DecisionCodecError> {
    let slice = read_exact(buf, at, WIRE_ID_WIDTH)?;
    let mut bytes = [0_u8; 8];
    bytes.copy_from_slice(&slice[8..]);
    Ok(u64::from_be_bytes(bytes))
}

fn read_exact(buf: &[u8], at: usize, len: usize) -> Result<&[u8], DecisionCodecError> {
    buf.get(at..at + len)
        .ok_or(DecisionCodecError::Truncated {
            expected: at + len,
            actual: buf.len(),
        })
}

impl DecisionRecord {
    /// Encodes the bytes a proof token is computed over: every field up to
    /// and including `mitigation_tag`, in wire order, excluding the token
    /// length/value themselves ("a keyed MAC over the preceding bytes",
    /// spec.md §6).
    #[must_use]
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64 + self.matched_patterns.len() * 21);
        out.push(WIRE_VERSION);
        push_id128(&mut out, self.request_id.as_u128());
        out.push(self.verdict.wire_tag());
        out.push(self.tier_reached);
        out.extend_from_slice(&self.confidence.to_be_bytes());
        out.extend_from_slice(&self.latency_ns.to_be_bytes());
        #[allow(
            clippy::cast_possible_truncation,
            reason = "match counts are bounded well below u16::MAX by the orchestrator"
        )]
        let matches_count = self.matched_patterns.len() as u16;
        out.extend_from_slice(&matches_count.to_be_bytes());
        for matched in &self.matched_patterns {
            push_id64_widened(&mut out, matched.pattern_id.as_u64());
            out.extend_from_slice(&matched.similarity.to_be_bytes());
            out.push(matched.source.wire_tag());
        }
        out.push(self.mitigation_applied.map_or(0, MitigationTag::wire_tag));
        out
    }

    /// Encodes the full canonical wire form, including the proof token.
    #[must_use]
    pub fn to_canonical_bytes(&self) -> Vec<u8> {
        let mut out = self.signable_bytes();
        #[allow(
            clippy::cast_possible_truncation,
            reason = "proof tokens are a fixed key-id byte plus a 32-byte MAC, well below u16::MAX"
        )]
        let token_len = self.proof_token.len() as u16;
        out.extend_from_slice(&token_len.to_be_bytes());
        out.extend_from_slice(&self.proof_token);
        out
    }

    /// Decodes a canonical wire-format byte string.
    ///
    /// Unknown trailing bytes past the declared `proof_token_len` are
    /// ignored (forward compatibility, spec.md §6): the decoder reads
    /// exactly the declared lengths and never assumes the buffer ends where
    /// the known fields do.
    ///
    /// # Errors
    ///
    /// Returns [`DecisionCodecError`] if the buffer is truncated, carries an
    /// unsupported version, or holds an invalid tag for a tagged field.
    pub fn from_canonical_bytes(buf: &[u8]) -> Result<Self, DecisionCodecError> {
        let version = *read_exact(buf, 0, 1)?.first().unwrap_or(&0);
        if version != WIRE_VERSION {
            return Err(DecisionCodecError::UnsupportedVersion { version });
        }
        let mut at = 1;

        let request_id = read_id128(buf, at)?;
        at += WIRE_ID_WIDTH;

        let verdict_tag = read_exact(buf, at, 1)?[0];
        let verdict = Verdict::from_wire_tag(verdict_tag).ok_or(DecisionCodecError::InvalidTag {
            field: "verdict",
            tag: verdict_tag,
        })?;
        at += 1;

        let tier_reached = read_exact(buf, at, 1)?[0];
        at += 1;

        let confidence = f32::from_be_bytes(read_exact(buf, at, 4)?.try_into().unwrap_or([0; 4]));
        at += 4;

        let latency_ns = u64::from_be_bytes(read_exact(buf, at, 8)?.try_into().unwrap_or([0; 8]));
        at += 8;

        let matches_count =
            u16::from_be_bytes(read_exact(buf, at, 2)?.try_into().unwrap_or([0; 2]));
        at += 2;

        let mut matched_patterns = Vec::with_capacity(matches_count as usize);
        for _ in 0..matches_count {
            let pattern_id = read_id64_widened(buf, at)?;
            at += WIRE_ID_WIDTH;
            let similarity =
                f32::from_be_bytes(read_exact(buf, at, 4)?.try_into().unwrap_or([0; 4]));
            at += 4;
            let source_tag = read_exact(buf, at, 1)?[0];
            let source =
                MatchSource::from_wire_tag(source_tag).ok_or(DecisionCodecError::InvalidTag {
                    field: "match.source",
                    tag: source_tag,
                })?;
            at += 1;
            matched_patterns.push(MatchedPattern {
                pattern_id: PatternId::from_raw(pattern_id),
                similarity,
                source,
            });
        }

        let mitigation_tag = read_exact(buf, at, 1)?[0];
        let mitigation_applied = if mitigation_tag == 0 {
            None
        } else {
            Some(
                MitigationTag::from_wire_tag(mitigation_tag).ok_or(
                    DecisionCodecError::InvalidTag {
                        field: "mitigation_tag",
                        tag: mitigation_tag,
                    },
                )?,
            )
        };
        at += 1;

        let proof_token_len =
            u16::from_be_bytes(read_exact(buf, at, 2)?.try_into().unwrap_or([0; 2])) as usize;
        at += 2;
        let proof_token = read_exact(buf, at, proof_token_len)?.to_vec();

        Ok(Self {
            request_id: RequestId::from(request_id),
            verdict,
            tier_reached,
            confidence,
            matched_patterns,
            mitigation_applied,
            latency_ns,
            reason: None,
            proof_token,
        })
    }
}

/// Returns `true` if a pattern's severity alone would veto the request
/// under the §4.5 tie-break rule (critical severity always rejects).
#[must_use]
pub fn severity_vetoes(severity: Severity) -> bool {
    severity == Severity::Critical
}
