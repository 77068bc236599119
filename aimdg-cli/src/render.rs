// aimdg-cli/src/render.rs
// ============================================================================
// Module: Decision Record Rendering
// Description: Hex codec and human-readable formatting for decision records.
// Purpose: Give the `admit` and `replay` commands a shared, testable way to
//          turn a `DecisionRecord` into stdout text, independent of how the
//          caller obtained the record.
// Dependencies: aimdg-core, serde_json
// ============================================================================

//! ## Overview
//! Decision records cross the CLI boundary in one of three shapes: pretty
//! JSON (for piping into other tools), a single hex line (for round-tripping
//! the exact canonical wire bytes through a text file or shell variable), or
//! a short human-readable summary (the default, for a terminal).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use aimdg_core::DecisionRecord;
use aimdg_core::MitigationTag;
use aimdg_core::ReasonCode;
use aimdg_core::Verdict;

// ============================================================================
// SECTION: Hex Codec
// ============================================================================

/// Encodes bytes as a lowercase hex string.
#[must_use]
pub fn encode_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

/// Error decoding a hex string produced outside this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexDecodeError {
    /// Human-readable description of what went wrong.
    pub detail: String,
}

impl fmt::Display for HexDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.detail)
    }
}

impl std::error::Error for HexDecodeError {}

/// Decodes one hex digit byte into its nibble value.
fn hex_nibble(byte: u8) -> Result<u8, HexDecodeError> {
    match byte {
        b'0'..=b'9' => Ok(byte - b'0'),
        b'a'..=b'f' => Ok(byte - b'a' + 10),
        b'A'..=b'F' => Ok(byte - b'A' + 10),
        other => Err(HexDecodeError {
            detail: format!("invalid hex digit: {}", other as char),
        }),
    }
}

/// Decodes a hex string (whitespace-trimmed) back into raw bytes.
///
/// # Errors
///
/// Returns [`HexDecodeError`] if `text` has odd length or contains a
/// non-hex-digit character.
pub fn decode_hex(text: &str) -> Result<Vec<u8>, HexDecodeError> {
    let trimmed = text.trim();
    let bytes = trimmed.as_bytes();
    if !bytes.len().is_multiple_of(2) {
        return Err(HexDecodeError {
            detail: format!("hex input has odd length {}", bytes.len()),
        });
    }
    let mut out = Vec::with_capacity(bytes.len() / 2);
    for pair in bytes.chunks_exact(2) {
        let high = hex_nibble(pair[0])?;
        let low = hex_nibble(pair[1])?;
        out.push((high << 4) | low);
    }
    Ok(out)
}

// ============================================================================
// SECTION: Human-Readable Rendering
// ============================================================================

/// Short lowercase label for a verdict.
fn verdict_label(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Allow => "allow",
        Verdict::Sanitize => "sanitize",
        Verdict::Reject => "reject",
        Verdict::Escalate => "escalate",
    }
}

/// Short lowercase label for a mitigation tag.
fn mitigation_label(tag: MitigationTag) -> &'static str {
    match tag {
        MitigationTag::Allow => "allow",
        MitigationTag::StripInstructions => "strip_instructions",
        MitigationTag::RedactPii => "redact_pii",
        MitigationTag::ContextIsolate => "context_isolate",
        MitigationTag::RewritePrompt => "rewrite_prompt",
        MitigationTag::EscalateToHuman => "escalate_to_human",
        MitigationTag::Reject => "reject",
    }
}

/// Short lowercase label for a reason code.
fn reason_label(reason: &ReasonCode) -> String {
    match reason {
        ReasonCode::Overload => "overload".to_string(),
        ReasonCode::PolicyTimeout => "policy_timeout".to_string(),
        ReasonCode::NoStrategy => "no_strategy".to_string(),
        ReasonCode::ThreatDetected => "threat_detected".to_string(),
        ReasonCode::AnomalousBehavior => "anomalous_behavior".to_string(),
        ReasonCode::PolicyViolation(name) => format!("policy_violation({name})"),
    }
}

/// Renders a decision record as a short human-readable summary.
#[must_use]
pub fn render_text(record: &DecisionRecord) -> String {
    let mut out = String::new();
    out.push_str(&format!("request_id: {}\n", record.request_id));
    out.push_str(&format!("verdict: {}\n", verdict_label(record.verdict)));
    out.push_str(&format!("tier_reached: {}\n", record.tier_reached));
    out.push_str(&format!("confidence: {:.4}\n", record.confidence));
    out.push_str(&format!(
        "mitigation_applied: {}\n",
        record.mitigation_applied.map_or("none", mitigation_label)
    ));
    out.push_str(&format!(
        "reason: {}\n",
        record.reason.as_ref().map_or_else(|| "none".to_string(), reason_label)
    ));
    out.push_str(&format!("latency_ns: {}\n", record.latency_ns));
    out.push_str(&format!("matched_patterns: {}\n", record.matched_patterns.len()));
    for matched in &record.matched_patterns {
        out.push_str(&format!(
            "  - pattern_id={} similarity={:.4} source={:?}\n",
            matched.pattern_id, matched.similarity, matched.source
        ));
    }
    out.push_str(&format!("proof_token: {}\n", encode_hex(&record.proof_token)));
    out
}

/// Renders a decision record as pretty-printed JSON.
///
/// # Errors
///
/// Returns a [`serde_json::Error`] if serialization fails, which should not
/// happen for a well-formed [`DecisionRecord`].
pub fn render_json(record: &DecisionRecord) -> serde_json::Result<String> {
    serde_json::to_string_pretty(record)
}

/// Renders the canonical wire bytes of a decision record as a single hex
/// line, suitable for feeding back into the `replay` command.
#[must_use]
pub fn render_hex(record: &DecisionRecord) -> String {
    encode_hex(&record.to_canonical_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aimdg_core::ids::RequestId;

    #[test]
    fn hex_round_trips() {
        let bytes = vec![0x00, 0x1a, 0xff, 0x42];
        let encoded = encode_hex(&bytes);
        assert_eq!(encoded, "001aff42");
        assert_eq!(decode_hex(&encoded).expect("valid hex"), bytes);
    }

    #[test]
    fn decode_hex_rejects_odd_length() {
        assert!(decode_hex("abc").is_err());
    }

    #[test]
    fn decode_hex_rejects_non_hex_digit() {
        assert!(decode_hex("zz").is_err());
    }

    #[test]
    fn decode_hex_trims_surrounding_whitespace() {
        assert_eq!(decode_hex("  00ff  \n").expect("trimmed hex"), vec![0x00, 0xff]);
    }

    fn sample_record() -> DecisionRecord {
        DecisionRecord {
            request_id: RequestId::from_raw(7),
            verdict: Verdict::Allow,
            tier_reached: 1,
            confidence: 0.99,
            matched_patterns: Vec::new(),
            mitigation_applied: None,
            latency_ns: 12_345,
            reason: None,
            proof_token: vec![0, 1, 2, 3],
        }
    }

    #[test]
    fn render_text_mentions_core_fields() {
        let text = render_text(&sample_record());
        assert!(text.contains("verdict: allow"));
        assert!(text.contains("tier_reached: 1"));
        assert!(text.contains("proof_token: 00010203"));
    }

    #[test]
    fn render_hex_round_trips_through_canonical_bytes() {
        let record = sample_record();
        let hex = render_hex(&record);
        let bytes = decode_hex(&hex).expect("valid hex");
        let decoded = DecisionRecord::from_canonical_bytes(&bytes).expect("valid canonical bytes");
        assert_eq!(decoded.request_id, record.request_id);
        assert_eq!(decoded.verdict, record.verdict);
    }
}
