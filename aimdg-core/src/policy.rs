// aimdg-core/src/policy.rs
// ============================================================================
// Module: Policy Engine
// Description: Wires the gateway's decision trace and built-in predicates
//              into named policies, and applies the §4.5 tie-break rules.
// Purpose: Implement spec.md §4.5 on top of the domain-agnostic evaluator in
//          `aimdg-logic`.
// Dependencies: aimdg-logic, crate::{decision, ids, pattern}
// ============================================================================

//! ## Overview
//! `aimdg-logic` provides `Formula<P>` and a finite-trace evaluator with no
//! knowledge of this gateway's domain. This module supplies the domain: the
//! atomic predicate alphabet (`PredicateId`), the named policies built from
//! it, and the severity-based tie-break rule that converts a batch of policy
//! verdicts into a single `(Verdict, ReasonCode)` decision, or `None` when
//! every policy is satisfied and the decision falls through to the adaptive
//! responder.

// ============================================================================
// SECTION: Imports
// ============================================================================

use aimdg_logic::EvaluationError;
use aimdg_logic::Formula;
use aimdg_logic::Trace;
use aimdg_logic::evaluate;

use serde::Deserialize;
use serde::Serialize;

use crate::decision::ReasonCode;
use crate::decision::Verdict;
use crate::ids::PolicyName;
use crate::pattern::Severity;

// ============================================================================
// SECTION: Predicate Alphabet
// ============================================================================

/// An atomic predicate a decision-trace state may assert.
///
/// The built-in names match spec.md §4.5's examples; `Custom` covers any
/// operator-defined predicate a policy author wires up without requiring a
/// crate release.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateId {
    /// PII was detected in the prompt or context.
    PiiDetected,
    /// Detected PII was redacted before forwarding.
    PiiRedacted,
    /// A known threat pattern matched.
    ThreatDetected,
    /// A mitigation was applied to the request.
    MitigationApplied,
    /// The request was escalated.
    Escalated,
    /// The decision was emitted within its SLA deadline.
    LatencyWithinSla,
    /// An operator-defined predicate.
    Custom(String),
}

// ============================================================================
// SECTION: Policy
// ============================================================================

/// A compiled safety policy: a name, a severity, and a finite-trace formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// The policy's name, used in `ReasonCode::PolicyViolation`.
    pub name: PolicyName,
    /// Severity of a violation of this policy.
    pub severity: Severity,
    /// The formula evaluated against the decision trace.
    pub formula: Formula<PredicateId>,
}

impl Policy {
    /// Convenience constructor validating the formula's structural limits.
    ///
    /// # Errors
    ///
    /// Returns the formula's [`aimdg_logic::FormulaError`] if it nests
    /// beyond the evaluator's configured depth limit.
    pub fn new(
        name: PolicyName,
        severity: Severity,
        formula: Formula<PredicateId>,
    ) -> Result<Self, aimdg_logic::FormulaError> {
        formula.validate()?;
        Ok(Self {
            name,
            severity,
            formula,
        })
    }
}

// ============================================================================
// SECTION: Policy Outcome
// ============================================================================

/// The result of evaluating one policy against a trace.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyOutcome {
    /// The policy that produced this outcome.
    pub name: PolicyName,
    /// The policy's configured severity.
    pub severity: Severity,
    /// Whether the policy's formula held over the whole trace.
    pub valid: bool,
    /// State index that determined the outcome, if any.
    pub witness: Option<usize>,
    /// Predicates that blocked satisfaction at the witness state.
    pub violating_predicates: Vec<PredicateId>,
    /// Set when the policy's evaluation deadline expired before a verdict
    /// was reached (§4.5 failure semantics): treated as `valid = false`
    /// with this flag distinguishing it from a genuine violation.
    pub timed_out: bool,
}

/// Evaluates every policy against `trace`.
///
/// Unknown-predicate errors propagate as-is: spec.md §4.5 treats them as a
/// configuration bug, not a runtime condition to recover from.
///
/// # Errors
///
/// Returns [`EvaluationError`] if any policy references a predicate not
/// present anywhere in `trace`'s alphabet, or if `trace` is empty.
pub fn evaluate_policies(
    policies: &[Policy],
    trace: &Trace<PredicateId>,
) -> Result<Vec<PolicyOutcome>, EvaluationError> {
    policies
        .iter()
        .map(|policy| {
            let verdict = evaluate(&policy.formula, trace)?;
            Ok(PolicyOutcome {
                name: policy.name.clone(),
                severity: policy.severity,
                valid: verdict.valid,
                witness: verdict.witness,
                violating_predicates: verdict.violating_predicates,
                timed_out: false,
            })
        })
        .collect()
}

/// Builds the timed-out outcome for a policy whose deadline expired before
/// evaluation completed (§4.5: "return `{valid: false, reason:
/// policy_timeout}` for the pending policy").
#[must_use]
pub fn timed_out_outcome(policy: &Policy) -> PolicyOutcome {
    PolicyOutcome {
        name: policy.name.clone(),
        severity: policy.severity,
        valid: false,
        witness: None,
        violating_predicates: Vec::new(),
        timed_out: true,
    }
}

// ============================================================================
// SECTION: Tie-Break Rule
// ============================================================================

/// Applies the §4.5 tie-break rule to a batch of policy outcomes.
///
/// Returns `Some((verdict, reason))` when the policy tier itself settles the
/// verdict (a critical violation, or a deadline timeout, or multiple high
/// violations with no critical one); returns `None` when every policy is
/// valid and the decision falls through to the adaptive responder.
#[must_use]
pub fn apply_tie_break(outcomes: &[PolicyOutcome]) -> Option<(Verdict, ReasonCode)> {
    if outcomes.iter().any(|outcome| outcome.timed_out) {
        return Some((Verdict::Reject, ReasonCode::PolicyTimeout));
    }

    if let Some(critical) = outcomes
        .iter()
        .find(|outcome| !outcome.valid && outcome.severity == Severity::Critical)
    {
        return Some((
            Verdict::Reject,
            ReasonCode::PolicyViolation(critical.name.as_str().to_string()),
        ));
    }

    // §4.5: "Multiple high violations with no critical → escalate." A lone
    // high violation does not by itself veto the request; it falls through
    // to the adaptive responder alongside the detector findings.
    let high_violations: Vec<&PolicyOutcome> = outcomes
        .iter()
        .filter(|outcome| !outcome.valid && outcome.severity == Severity::High)
        .collect();
    if high_violations.len() >= 2 {
        return Some((
            Verdict::Escalate,
            ReasonCode::PolicyViolation(high_violations[0].name.as_str().to_string()),
        ));
    }

    // A single high violation, or only low/medium-severity violations,
    // falls through here: not vetoed outright, left to the adaptive
    // responder to weigh alongside the detector findings.
    None
}
