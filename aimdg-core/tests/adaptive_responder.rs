// aimdg-core/tests/adaptive_responder.rs
// ============================================================================
// Module: Adaptive Responder Integration Tests
// Description: Exercises UCB1 selection and the feedback loop end to end
//              through the public `AdaptiveResponder` API.
// ============================================================================
//! ## Overview
//! The responder's unit tests (inside `responder.rs`) cover single-call
//! selection logic; these tests check the feedback loop changes behavior
//! across repeated selections, the way an operator would actually run it.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions are permitted."
)]

use aimdg_core::MitigationTag;
use aimdg_core::ResponderParams;
use aimdg_core::Severity;
use aimdg_core::responder::AdaptiveResponder;
use aimdg_core::responder::Findings;

fn threat_findings(confidence: f32) -> Findings {
    Findings {
        threat_detected: true,
        highest_severity: Some(Severity::High),
        pii_detected: false,
        confidence,
    }
}

#[test]
fn every_applicable_strategy_is_tried_once_before_any_repeats() {
    let responder = AdaptiveResponder::new(ResponderParams::default());
    let findings = threat_findings(0.8);
    let mut seen = Vec::new();
    for _ in 0..6 {
        let tag = responder.select(&findings).expect("an applicable strategy exists");
        if !seen.contains(&tag) {
            seen.push(tag);
        }
        responder.record_feedback(tag, 0.5);
    }
    // Five strategies apply to a plain high-severity threat with no PII:
    // strip_instructions, rewrite_prompt, escalate_to_human, reject, and
    // context_isolate (threat-gated). Each must appear before any repeats.
    assert!(seen.len() >= 4);
}

#[test]
fn consistently_effective_strategy_is_preferred_once_all_are_visited() {
    let responder = AdaptiveResponder::new(ResponderParams::default());
    let findings = threat_findings(0.8);

    for tag in findings.applicable_strategies() {
        responder.record_feedback(tag, 0.0);
    }
    for _ in 0..50 {
        responder.record_feedback(MitigationTag::StripInstructions, 1.0);
    }

    let selected = responder.select(&findings).expect("an applicable strategy exists");
    assert_eq!(selected, MitigationTag::StripInstructions);
}

#[test]
fn clean_findings_only_allow_is_applicable() {
    let findings = Findings {
        threat_detected: false,
        highest_severity: None,
        pii_detected: false,
        confidence: 0.1,
    };
    assert_eq!(findings.applicable_strategies(), vec![MitigationTag::Allow]);
}
