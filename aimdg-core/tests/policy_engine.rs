// aimdg-core/tests/policy_engine.rs
// ============================================================================
// Module: Policy Engine Integration Tests
// Description: Builds named policies from `aimdg-logic` formulas and
//              exercises `evaluate_policies`/`apply_tie_break` together, the
//              way the orchestrator actually calls them.
// ============================================================================
//! ## Overview
//! Confirms the severity-based tie-break rule (§4.5): a critical violation
//! rejects outright, a high violation escalates, and lower-severity
//! violations fall through to the adaptive responder untouched.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions are permitted."
)]

use aimdg_core::PolicyName;
use aimdg_core::ReasonCode;
use aimdg_core::Severity;
use aimdg_core::Verdict;
use aimdg_core::policy::Policy;
use aimdg_core::policy::PredicateId;
use aimdg_core::policy::apply_tie_break;
use aimdg_core::policy::evaluate_policies;
use aimdg_logic::Formula;
use aimdg_logic::Trace;
use aimdg_logic::TraceState;

fn trace_with(predicates: &[PredicateId]) -> Trace<PredicateId> {
    let mut state = TraceState::new();
    for predicate in predicates {
        state.assert(predicate.clone());
    }
    let mut trace = Trace::new();
    trace.push(state);
    trace
}

#[test]
fn critical_violation_rejects_even_alongside_valid_policies() {
    let no_threat = Policy::new(
        PolicyName::new("no-undetected-threat"),
        Severity::Critical,
        Formula::not(Formula::atomic(PredicateId::ThreatDetected)),
    )
    .expect("valid formula");
    let within_sla = Policy::new(
        PolicyName::new("within-sla"),
        Severity::Low,
        Formula::atomic(PredicateId::LatencyWithinSla),
    )
    .expect("valid formula");

    let trace = trace_with(&[PredicateId::ThreatDetected, PredicateId::LatencyWithinSla]);
    let outcomes = evaluate_policies(&[no_threat, within_sla], &trace).expect("known predicates");

    let tie_break = apply_tie_break(&outcomes).expect("a critical violation exists");
    assert_eq!(tie_break.0, Verdict::Reject);
    assert!(matches!(tie_break.1, ReasonCode::PolicyViolation(name) if name == "no-undetected-threat"));
}

#[test]
fn lone_high_violation_does_not_escalate() {
    // §4.5 requires *multiple* high violations with no critical to
    // escalate; a single one is left to the adaptive responder.
    let pii_must_be_redacted = Policy::new(
        PolicyName::new("pii-must-be-redacted"),
        Severity::High,
        Formula::implies(
            Formula::atomic(PredicateId::PiiDetected),
            Formula::atomic(PredicateId::PiiRedacted),
        ),
    )
    .expect("valid formula");

    let trace = trace_with(&[PredicateId::PiiDetected]);
    let outcomes = evaluate_policies(std::slice::from_ref(&pii_must_be_redacted), &trace).expect("known predicates");

    assert!(apply_tie_break(&outcomes).is_none());
}

#[test]
fn multiple_high_violations_without_critical_escalate() {
    let pii_must_be_redacted = Policy::new(
        PolicyName::new("pii-must-be-redacted"),
        Severity::High,
        Formula::implies(
            Formula::atomic(PredicateId::PiiDetected),
            Formula::atomic(PredicateId::PiiRedacted),
        ),
    )
    .expect("valid formula");
    let threat_must_be_mitigated = Policy::new(
        PolicyName::new("threat-must-be-mitigated"),
        Severity::High,
        Formula::implies(
            Formula::atomic(PredicateId::ThreatDetected),
            Formula::atomic(PredicateId::MitigationApplied),
        ),
    )
    .expect("valid formula");

    let trace = trace_with(&[PredicateId::PiiDetected, PredicateId::ThreatDetected]);
    let outcomes = evaluate_policies(&[pii_must_be_redacted, threat_must_be_mitigated], &trace).expect("known predicates");

    let tie_break = apply_tie_break(&outcomes).expect("two high violations exist");
    assert_eq!(tie_break.0, Verdict::Escalate);
}

#[test]
fn all_policies_satisfied_falls_through_to_responder() {
    let within_sla = Policy::new(
        PolicyName::new("within-sla"),
        Severity::Low,
        Formula::atomic(PredicateId::LatencyWithinSla),
    )
    .expect("valid formula");

    let trace = trace_with(&[PredicateId::LatencyWithinSla]);
    let outcomes = evaluate_policies(std::slice::from_ref(&within_sla), &trace).expect("known predicates");

    assert!(outcomes[0].valid);
    assert!(apply_tie_break(&outcomes).is_none());
}
