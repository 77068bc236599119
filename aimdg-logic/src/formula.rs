// aimdg-logic/src/formula.rs
// ============================================================================
// Module: Policy Formula
// Description: Finite-trace temporal formula tree over typed atomic predicates.
// Purpose: Define `Formula<P>`, the boolean/temporal algebra policies compile
//          into, plus structural validation limits.
// Dependencies: serde::{Deserialize, Serialize}
// ============================================================================

//! ## Overview
//! A [`Formula`] is a small finite-trace linear-temporal tree: boolean
//! connectives (`and`, `or`, `not`, `implies`) composed with the two temporal
//! operators a finite trace actually supports, `always` and `eventually`.
//! Formulas are domain-agnostic over the atomic predicate type `P`; the
//! evaluator (see [`crate::evaluator`]) is the boundary where predicate
//! identifiers are resolved against trace states.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum nesting depth accepted by [`Formula::validate`].
///
/// Bounds pathological formulas (e.g. generated or malformed policy specs)
/// so evaluation cost stays proportional to trace length.
pub const MAX_FORMULA_DEPTH: usize = 32;

// ============================================================================
// SECTION: Formula Definition
// ============================================================================

/// Finite-trace temporal formula over a domain-specific atomic predicate `P`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Formula<P> {
    /// Atomic predicate, true in a trace state iff the state's predicate set
    /// contains this identifier.
    Atomic(P),
    /// Logical negation.
    Not(Box<Self>),
    /// Logical conjunction. Empty `And` is trivially true.
    And(Vec<Self>),
    /// Logical disjunction. Empty `Or` is trivially false.
    Or(Vec<Self>),
    /// Material implication: `antecedent -> consequent`.
    Implies {
        /// Left-hand side.
        antecedent: Box<Self>,
        /// Right-hand side.
        consequent: Box<Self>,
    },
    /// Holds iff the inner formula holds in every state of the trace.
    Always(Box<Self>),
    /// Holds iff the inner formula holds in at least one state of the trace.
    Eventually(Box<Self>),
}

// ============================================================================
// SECTION: Constructors
// ============================================================================

impl<P> Formula<P> {
    /// Creates an atomic formula from a predicate identifier.
    pub const fn atomic(predicate: P) -> Self {
        Self::Atomic(predicate)
    }

    /// Negates a formula.
    pub fn not(formula: Self) -> Self {
        Self::Not(Box::new(formula))
    }

    /// Conjoins a list of formulas.
    pub fn and(formulas: Vec<Self>) -> Self {
        Self::And(formulas)
    }

    /// Disjoins a list of formulas.
    pub fn or(formulas: Vec<Self>) -> Self {
        Self::Or(formulas)
    }

    /// Builds a material implication.
    pub fn implies(antecedent: Self, consequent: Self) -> Self {
        Self::Implies {
            antecedent: Box::new(antecedent),
            consequent: Box::new(consequent),
        }
    }

    /// Wraps a formula in `always`.
    pub fn always(formula: Self) -> Self {
        Self::Always(Box::new(formula))
    }

    /// Wraps a formula in `eventually`.
    pub fn eventually(formula: Self) -> Self {
        Self::Eventually(Box::new(formula))
    }
}

impl<P> std::ops::Not for Formula<P> {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self::Not(Box::new(self))
    }
}

// ============================================================================
// SECTION: Structural Validation
// ============================================================================

/// Errors returned by [`Formula::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormulaError {
    /// The formula nests deeper than [`MAX_FORMULA_DEPTH`].
    #[error("formula nesting exceeds limit: depth {actual} (max {max})")]
    TooDeep {
        /// Configured maximum depth.
        max: usize,
        /// Observed depth at the point the limit was exceeded.
        actual: usize,
    },
}

impl<P> Formula<P> {
    /// Validates structural limits (currently: nesting depth).
    ///
    /// # Errors
    ///
    /// Returns [`FormulaError::TooDeep`] when the formula nests beyond
    /// [`MAX_FORMULA_DEPTH`].
    pub fn validate(&self) -> Result<(), FormulaError> {
        self.validate_depth(1)
    }

    fn validate_depth(&self, depth: usize) -> Result<(), FormulaError> {
        if depth > MAX_FORMULA_DEPTH {
            return Err(FormulaError::TooDeep {
                max: MAX_FORMULA_DEPTH,
                actual: depth,
            });
        }
        match self {
            Self::Atomic(_) => Ok(()),
            Self::Not(inner) | Self::Always(inner) | Self::Eventually(inner) => {
                inner.validate_depth(depth + 1)
            }
            Self::And(items) | Self::Or(items) => {
                items.iter().try_for_each(|item| item.validate_depth(depth + 1))
            }
            Self::Implies {
                antecedent,
                consequent,
            } => {
                antecedent.validate_depth(depth + 1)?;
                consequent.validate_depth(depth + 1)
            }
        }
    }

    /// Returns the number of nodes in the formula tree.
    #[must_use]
    pub fn complexity(&self) -> usize {
        match self {
            Self::Atomic(_) => 1,
            Self::Not(inner) | Self::Always(inner) | Self::Eventually(inner) => {
                1 + inner.complexity()
            }
            Self::And(items) | Self::Or(items) => {
                1 + items.iter().map(Self::complexity).sum::<usize>()
            }
            Self::Implies {
                antecedent,
                consequent,
            } => 1 + antecedent.complexity() + consequent.complexity(),
        }
    }

    /// Collects unique predicate identifiers referenced by the formula, in
    /// first-occurrence order.
    #[must_use]
    pub fn predicates(&self) -> Vec<P>
    where
        P: Clone + PartialEq,
    {
        let mut out = Vec::new();
        self.collect_predicates(&mut out);
        out
    }

    fn collect_predicates(&self, out: &mut Vec<P>)
    where
        P: Clone + PartialEq,
    {
        match self {
            Self::Atomic(predicate) => {
                if !out.contains(predicate) {
                    out.push(predicate.clone());
                }
            }
            Self::Not(inner) | Self::Always(inner) | Self::Eventually(inner) => {
                inner.collect_predicates(out);
            }
            Self::And(items) | Self::Or(items) => {
                for item in items {
                    item.collect_predicates(out);
                }
            }
            Self::Implies {
                antecedent,
                consequent,
            } => {
                antecedent.collect_predicates(out);
                consequent.collect_predicates(out);
            }
        }
    }
}
