// aimdg-logic/src/evaluator.rs
// ============================================================================
// Module: Evaluator
// Description: Tableau-style finite-trace evaluator for `Formula<P>`.
// Purpose: Walk a bounded trace once per formula node, producing a verdict
//          with a witness state and the set of predicates that blocked
//          satisfaction.
// Dependencies: crate::{error, formula, trace}
// ============================================================================

//! ## Overview
//! [`evaluate`] checks a [`Formula`] against a [`Trace`] in
//! `O(states * formula_nodes)` time: each temporal or boolean node is
//! evaluated at every trace state it governs, with no memoization beyond
//! what the recursive descent naturally reuses. Traces handled here are
//! short (bounded by the policy stage's window), so this is deliberately the
//! simplest correct evaluator rather than a compiled one.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::error::EvaluationError;
use crate::error::EvaluationResult;
use crate::formula::Formula;
use crate::trace::Trace;
use std::fmt::Debug;
use std::hash::Hash;

// ============================================================================
// SECTION: Verdict
// ============================================================================

/// Outcome of evaluating a formula against a trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict<P> {
    /// Whether the formula holds over the full trace.
    pub valid: bool,
    /// Index of the trace state that determined the verdict, when one
    /// exists. For `always` this is the first violating state; for
    /// `eventually` this is the first satisfying state.
    pub witness: Option<usize>,
    /// Atomic predicates that, at the witness state, prevented satisfaction.
    /// Empty when `valid` is `true`.
    pub violating_predicates: Vec<P>,
}

impl<P> Verdict<P> {
    fn satisfied() -> Self {
        Self {
            valid: true,
            witness: None,
            violating_predicates: Vec::new(),
        }
    }

    fn violated(witness: Option<usize>, violating_predicates: Vec<P>) -> Self {
        Self {
            valid: false,
            witness,
            violating_predicates,
        }
    }
}

// ============================================================================
// SECTION: Evaluation
// ============================================================================

/// Evaluates `formula` against `trace`.
///
/// # Errors
///
/// Returns [`EvaluationError::EmptyTrace`] if `trace` has no states.
pub fn evaluate<P>(formula: &Formula<P>, trace: &Trace<P>) -> EvaluationResult<Verdict<P>>
where
    P: Clone + Eq + Hash + Debug,
{
    if trace.is_empty() {
        return Err(EvaluationError::EmptyTrace);
    }
    Ok(eval_over_window(formula, trace, 0, trace.len()))
}

/// Evaluates `formula` over the sub-window `[start, end)` of `trace`.
///
/// Boolean connectives evaluated at a single reference point (the window's
/// first state) delegate straight through; temporal operators recurse over
/// every state in the window.
fn eval_over_window<P>(
    formula: &Formula<P>,
    trace: &Trace<P>,
    start: usize,
    end: usize,
) -> Verdict<P>
where
    P: Clone + Eq + Hash + Debug,
{
    match formula {
        Formula::Atomic(predicate) => eval_atomic_at(predicate, trace, start),
        Formula::Not(inner) => {
            let inner_verdict = eval_over_window(inner, trace, start, end);
            if inner_verdict.valid {
                Verdict::violated(inner_verdict.witness, inner_verdict.violating_predicates)
            } else {
                Verdict::satisfied()
            }
        }
        Formula::And(items) => eval_and(items, trace, start, end),
        Formula::Or(items) => eval_or(items, trace, start, end),
        Formula::Implies {
            antecedent,
            consequent,
        } => {
            let ant = eval_over_window(antecedent, trace, start, end);
            if !ant.valid {
                return Verdict::satisfied();
            }
            eval_over_window(consequent, trace, start, end)
        }
        Formula::Always(inner) => eval_always(inner, trace, start, end),
        Formula::Eventually(inner) => eval_eventually(inner, trace, start, end),
    }
}

fn eval_atomic_at<P>(predicate: &P, trace: &Trace<P>, at: usize) -> Verdict<P>
where
    P: Clone + Eq + Hash + Debug,
{
    match trace.state(at) {
        Some(state) if state.holds(predicate) => Verdict::satisfied(),
        _ => Verdict::violated(Some(at), vec![predicate.clone()]),
    }
}

fn eval_and<P>(items: &[Formula<P>], trace: &Trace<P>, start: usize, end: usize) -> Verdict<P>
where
    P: Clone + Eq + Hash + Debug,
{
    for item in items {
        let verdict = eval_over_window(item, trace, start, end);
        if !verdict.valid {
            return verdict;
        }
    }
    Verdict::satisfied()
}

fn eval_or<P>(items: &[Formula<P>], trace: &Trace<P>, start: usize, end: usize) -> Verdict<P>
where
    P: Clone + Eq + Hash + Debug,
{
    let mut last = Verdict::satisfied();
    for item in items {
        let verdict = eval_over_window(item, trace, start, end);
        if verdict.valid {
            return verdict;
        }
        last = verdict;
    }
    if items.is_empty() {
        return Verdict::violated(None, Vec::new());
    }
    last
}

fn eval_always<P>(inner: &Formula<P>, trace: &Trace<P>, start: usize, end: usize) -> Verdict<P>
where
    P: Clone + Eq + Hash + Debug,
{
    for index in start..end {
        let verdict = eval_over_window(inner, trace, index, index + 1);
        if !verdict.valid {
            return verdict;
        }
    }
    Verdict::satisfied()
}

fn eval_eventually<P>(inner: &Formula<P>, trace: &Trace<P>, start: usize, end: usize) -> Verdict<P>
where
    P: Clone + Eq + Hash + Debug,
{
    let mut last = Verdict::violated(None, Vec::new());
    for index in start..end {
        let verdict = eval_over_window(inner, trace, index, index + 1);
        if verdict.valid {
            return verdict;
        }
        last = verdict;
    }
    last
}
