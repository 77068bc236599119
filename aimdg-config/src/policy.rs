// aimdg-config/src/policy.rs
// ============================================================================
// Module: Policy File Loader
// Description: TOML policy definitions, compiled at load time into
//              `aimdg_core::Policy` values.
// Purpose: Implement spec.md §4.4/§4.5 ("Policies are compiled at load time
//          into an evaluator over finite traces") as a config-time step, so
//          malformed policies fail startup rather than a live request.
// Dependencies: aimdg-core, aimdg-logic, serde, toml
// ============================================================================

//! ## Overview
//! Operators author policies as TOML, not Rust. [`PolicyFile`] is the
//! on-disk shape; [`PolicyFile::compile`] walks each [`FormulaSpec`] into an
//! `aimdg_logic::Formula<PredicateId>` using the same constructors
//! `aimdg-core`'s own built-in policies would use, then validates it through
//! `Policy::new` (structural depth limit, spec.md §4.5). A deserialization
//! DTO is used here rather than deriving through `Formula`/`PredicateId`
//! directly, so the TOML author writes a flat, readable `op = "..."` table
//! instead of the internally-tagged wire shape the evaluator uses on the
//! hot path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use aimdg_core::Policy;
use aimdg_core::policy::PredicateId;
use aimdg_logic::Formula;
use aimdg_logic::FormulaError;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised compiling a [`PolicyFile`] into `aimdg_core::Policy` values.
#[derive(Debug, Error)]
pub enum PolicyFileError {
    /// The file's contents were not valid TOML, or did not match the
    /// expected shape.
    #[error("failed to parse policy file: {0}")]
    Parse(String),
    /// A policy's `severity` field did not name a known severity.
    #[error("policy {policy}: unknown severity {severity:?}")]
    UnknownSeverity {
        /// The offending policy's name.
        policy: String,
        /// The unrecognized severity string.
        severity: String,
    },
    /// A compiled formula exceeded `aimdg_logic::MAX_FORMULA_DEPTH`.
    #[error("policy {policy}: {source}")]
    Formula {
        /// The offending policy's name.
        policy: String,
        /// The underlying structural error.
        source: FormulaError,
    },
    /// Two policies in the same file shared a name.
    #[error("duplicate policy name: {0}")]
    DuplicateName(String),
}

// ============================================================================
// SECTION: On-Disk Shapes
// ============================================================================

/// A TOML document declaring a set of named policies.
///
/// ```toml
/// [[policy]]
/// name = "no_unredacted_pii_forwarded"
/// severity = "critical"
/// formula = { op = "implies", antecedent = { op = "atomic", predicate = "pii_detected" }, consequent = { op = "atomic", predicate = "pii_redacted" } }
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyFile {
    /// The declared policies, in file order.
    #[serde(rename = "policy")]
    pub policies: Vec<PolicySpec>,
}

/// One policy as written in TOML, prior to compilation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PolicySpec {
    /// The policy's name.
    pub name: String,
    /// The policy's severity: one of `low`, `medium`, `high`, `critical`.
    pub severity: String,
    /// The policy's formula.
    pub formula: FormulaSpec,
}

/// The on-disk representation of `aimdg_logic::Formula<PredicateId>`.
///
/// Unlike the wire-format `Formula`, `predicate` names are plain strings:
/// any of the built-in [`PredicateId`] variant names (snake_case), or an
/// arbitrary operator-defined name, which compiles to `PredicateId::Custom`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FormulaSpec {
    /// See `Formula::Atomic`.
    Atomic {
        /// The predicate name.
        predicate: String,
    },
    /// See `Formula::Not`.
    Not {
        /// The negated formula.
        formula: Box<FormulaSpec>,
    },
    /// See `Formula::And`.
    And {
        /// The conjuncts.
        formulas: Vec<FormulaSpec>,
    },
    /// See `Formula::Or`.
    Or {
        /// The disjuncts.
        formulas: Vec<FormulaSpec>,
    },
    /// See `Formula::Implies`.
    Implies {
        /// The left-hand side.
        antecedent: Box<FormulaSpec>,
        /// The right-hand side.
        consequent: Box<FormulaSpec>,
    },
    /// See `Formula::Always`.
    Always {
        /// The wrapped formula.
        formula: Box<FormulaSpec>,
    },
    /// See `Formula::Eventually`.
    Eventually {
        /// The wrapped formula.
        formula: Box<FormulaSpec>,
    },
}

// ============================================================================
// SECTION: Compilation
// ============================================================================

fn predicate_from_name(name: &str) -> PredicateId {
    match name {
        "pii_detected" => PredicateId::PiiDetected,
        "pii_redacted" => PredicateId::PiiRedacted,
        "threat_detected" => PredicateId::ThreatDetected,
        "mitigation_applied" => PredicateId::MitigationApplied,
        "escalated" => PredicateId::Escalated,
        "latency_within_sla" => PredicateId::LatencyWithinSla,
        other => PredicateId::Custom(other.to_string()),
    }
}

fn severity_from_str(name: &str) -> Option<aimdg_core::pattern::Severity> {
    use aimdg_core::pattern::Severity;
    match name {
        "low" => Some(Severity::Low),
        "medium" => Some(Severity::Medium),
        "high" => Some(Severity::High),
        "critical" => Some(Severity::Critical),
        _ => None,
    }
}

impl FormulaSpec {
    /// Compiles this DTO into the evaluator's `Formula<PredicateId>`.
    #[must_use]
    pub fn compile(self) -> Formula<PredicateId> {
        match self {
            Self::Atomic { predicate } => Formula::atomic(predicate_from_name(&predicate)),
            Self::Not { formula } => Formula::not(formula.compile()),
            Self::And { formulas } => Formula::and(formulas.into_iter().map(Self::compile).collect()),
            Self::Or { formulas } => Formula::or(formulas.into_iter().map(Self::compile).collect()),
            Self::Implies { antecedent, consequent } => Formula::implies(antecedent.compile(), consequent.compile()),
            Self::Always { formula } => Formula::always(formula.compile()),
            Self::Eventually { formula } => Formula::eventually(formula.compile()),
        }
    }
}

impl PolicyFile {
    /// Compiles every declared policy into `aimdg_core::Policy`, in file
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyFileError::UnknownSeverity`] if a policy's severity
    /// field is not recognized, [`PolicyFileError::Formula`] if a compiled
    /// formula exceeds the evaluator's structural depth limit, or
    /// [`PolicyFileError::DuplicateName`] if two policies share a name.
    pub fn compile(self) -> Result<Vec<Policy>, PolicyFileError> {
        let mut seen = std::collections::HashSet::new();
        let mut compiled = Vec::with_capacity(self.policies.len());
        for spec in self.policies {
            if !seen.insert(spec.name.clone()) {
                return Err(PolicyFileError::DuplicateName(spec.name));
            }
            let severity = severity_from_str(&spec.severity).ok_or_else(|| PolicyFileError::UnknownSeverity {
                policy: spec.name.clone(),
                severity: spec.severity.clone(),
            })?;
            let formula = spec.formula.compile();
            let policy = Policy::new(spec.name.clone().into(), severity, formula)
                .map_err(|source| PolicyFileError::Formula { policy: spec.name, source })?;
            compiled.push(policy);
        }
        Ok(compiled)
    }
}

/// Parses `contents` as a policy TOML document and compiles it.
///
/// # Errors
///
/// Returns [`PolicyFileError::Parse`] if `contents` is not valid TOML, or
/// any other [`PolicyFileError`] variant from [`PolicyFile::compile`].
pub fn parse_policy_toml(contents: &str) -> Result<Vec<Policy>, PolicyFileError> {
    let file: PolicyFile = toml::from_str(contents).map_err(|err| PolicyFileError::Parse(err.to_string()))?;
    file.compile()
}

/// Loads a policy TOML document from `path`.
///
/// # Errors
///
/// Returns [`PolicyFileError::Parse`] wrapping the IO error if `path`
/// cannot be read, or any [`PolicyFileError`] variant from
/// [`PolicyFile::compile`].
pub fn load_policy_file(path: &std::path::Path) -> Result<Vec<Policy>, PolicyFileError> {
    let contents = std::fs::read_to_string(path).map_err(|err| PolicyFileError::Parse(err.to_string()))?;
    parse_policy_toml(&contents)
}
