// aimdg-cli/src/tests.rs
// ============================================================================
// Module: CLI Library Cross-Cutting Tests
// Description: Tests that exercise more than one CLI helper module together.
// Purpose: Catch integration mistakes that a single module's own tests
//          would not (e.g. a rendered record failing to round-trip through
//          the hex codec after a field addition).
// Dependencies: aimdg-core
// ============================================================================

use aimdg_core::DecisionRecord;
use aimdg_core::Verdict;
use aimdg_core::ids::RequestId;

use crate::embed::hash_embed;
use crate::render;
use crate::t;

fn sample_record() -> DecisionRecord {
    DecisionRecord {
        request_id: RequestId::from_raw(42),
        verdict: Verdict::Sanitize,
        tier_reached: 2,
        confidence: 0.87,
        matched_patterns: Vec::new(),
        mitigation_applied: Some(aimdg_core::MitigationTag::RedactPii),
        latency_ns: 4_200,
        reason: Some(aimdg_core::ReasonCode::ThreatDetected),
        proof_token: vec![0x01, 0xaa, 0xbb, 0xcc],
    }
}

#[test]
fn hex_render_then_decode_preserves_the_decision() {
    let record = sample_record();
    let hex = render::render_hex(&record);
    let bytes = render::decode_hex(&hex).expect("hex should decode");
    let decoded = DecisionRecord::from_canonical_bytes(&bytes).expect("bytes should decode");
    assert_eq!(decoded.verdict, record.verdict);
    assert_eq!(decoded.mitigation_applied, record.mitigation_applied);
    assert_eq!(decoded.confidence, record.confidence);
}

#[test]
fn json_render_is_valid_json_with_expected_verdict() {
    let record = sample_record();
    let json = render::render_json(&record).expect("json should render");
    let value: serde_json::Value = serde_json::from_str(&json).expect("rendered json should parse");
    assert_eq!(value["verdict"], "sanitize");
}

#[test]
fn text_render_reports_reason_code() {
    let text = render::render_text(&sample_record());
    assert!(text.contains("reason: threat_detected"));
}

#[test]
fn translated_dev_signing_key_warning_mentions_the_flag() {
    let message = t!("signing.key.dev_default");
    assert!(message.contains("--signing-key-hex"));
}

#[test]
fn hash_embedder_dimension_matches_requested_size() {
    let vector = hash_embed("admit this prompt", 12);
    assert_eq!(vector.len(), 12);
}
