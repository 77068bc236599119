// aimdg-logic/src/error.rs
// ============================================================================
// Module: Errors
// Description: Error types for formula validation and evaluation.
// Purpose: Distinguish configuration-time structural errors from runtime
//          evaluation errors (unknown predicate references, empty traces).
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Two error surfaces: [`crate::formula::FormulaError`] covers structural
//! problems with a formula discovered before evaluation ever runs, and
//! [`EvaluationError`] covers problems discovered while walking a trace.
//! Unknown predicate references are treated as configuration bugs, not
//! transient runtime failures, and are therefore not retried by callers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: EvaluationError
// ============================================================================

/// Errors raised while evaluating a [`crate::formula::Formula`] against a
/// [`crate::trace::Trace`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    /// The formula referenced a predicate identifier the caller's resolver
    /// does not recognize. This indicates a configuration bug (a policy
    /// referencing a predicate the detector/analyzer tier never emits), not
    /// a transient fault.
    #[error("unknown predicate referenced by formula: {predicate}")]
    UnknownPredicate {
        /// Debug rendering of the offending predicate.
        predicate: String,
    },
    /// The trace contained no states; `always`/`eventually` are undefined
    /// over an empty window.
    #[error("cannot evaluate formula against an empty trace")]
    EmptyTrace,
}

/// Convenience alias for evaluator results.
pub type EvaluationResult<T> = Result<T, EvaluationError>;
