// aimdg-core/src/external/mod.rs
// ============================================================================
// Module: External Interfaces
// Description: Narrow trait boundaries to every collaborator spec.md §1
//              places deliberately outside the core.
// Purpose: Let the gateway depend on capabilities, not concrete subsystems,
//          for the embedder, transport codec, feedback channel, LLM router,
//          and telemetry sink (§6).
// Dependencies: crate::{decision, episode, ids, request}
// ============================================================================

//! ## Overview
//! Every trait here pairs with its own error enum, the same idiom the
//! in-core decision interfaces use elsewhere in this codebase
//! (trait + dedicated error type per external collaborator). None of these
//! traits is a code dependency on the collaborator's implementation; the
//! gateway only ever holds `&dyn Trait` or a generic bound.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::episode::Outcome;
use crate::ids::EpisodeId;

// ============================================================================
// SECTION: Embedder
// ============================================================================

/// Errors raised by an [`Embedder`] implementation.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The embedder did not respond within its deadline.
    #[error("embedder timed out")]
    Timeout,
    /// The embedder returned a vector of the wrong dimension.
    #[error("embedder returned dimension {actual}, expected {expected}")]
    DimensionMismatch {
        /// Expected dimension (the pattern store's).
        expected: usize,
        /// Dimension actually returned.
        actual: usize,
    },
    /// The embedder failed for a reason specific to its backend.
    #[error("embedder backend error: {0}")]
    Backend(String),
}

/// Turns text into the fixed-length vectors the pattern store indexes.
///
/// Deterministic within a model version; the version id is carried by the
/// implementation and surfaced in each `DecisionRecord` for reproducibility
/// (§6). Deadline-aware: implementations must not block past the duration
/// passed to them.
pub trait Embedder: Send + Sync {
    /// Embeds a single text, returning within `deadline`.
    ///
    /// # Errors
    ///
    /// Returns [`EmbeddingError`] on timeout, dimension mismatch, or backend
    /// failure.
    fn embed(&self, text: &str, deadline: std::time::Duration) -> Result<Vec<f32>, EmbeddingError>;

    /// Embeds a batch of texts, returning within `deadline`.
    ///
    /// # Errors
    ///
    /// Returns [`EmbeddingError`] on timeout, dimension mismatch, or backend
    /// failure. A partial-batch failure fails the whole call; callers that
    /// want partial results should call `embed` per item instead.
    fn embed_batch(
        &self,
        texts: &[&str],
        deadline: std::time::Duration,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// The embedding model version id, included in decision records.
    fn model_version(&self) -> &str;
}

// ============================================================================
// SECTION: Feedback Channel
// ============================================================================

/// Errors raised reporting or receiving outcome feedback.
#[derive(Debug, Error)]
pub enum FeedbackError {
    /// The referenced episode is unknown to the memory backing this channel.
    #[error("unknown episode id: {0}")]
    UnknownEpisode(EpisodeId),
    /// Feedback for this episode was already reported.
    #[error("outcome already reported for episode {0}")]
    AlreadyReported(EpisodeId),
}

/// Reports a mitigation's real-world effectiveness back to the gateway.
///
/// `report_outcome` is exactly-once per episode (§6): a second call for the
/// same episode is rejected rather than silently overwriting the first.
pub trait FeedbackChannel: Send + Sync {
    /// Reports the outcome of the mitigation applied in `episode_id`.
    ///
    /// # Errors
    ///
    /// Returns [`FeedbackError::UnknownEpisode`] if the episode does not
    /// exist, or [`FeedbackError::AlreadyReported`] if feedback was already
    /// recorded for it.
    fn report_outcome(
        &self,
        episode_id: EpisodeId,
        outcome: Outcome,
        effectiveness: f32,
    ) -> Result<(), FeedbackError>;
}

// ============================================================================
// SECTION: LLM Router
// ============================================================================

/// Errors raised routing a request to a downstream model provider.
#[derive(Debug, Error)]
pub enum RouterError {
    /// No provider could be selected under the request's cost ceiling.
    #[error("no provider available within cost ceiling")]
    CostCeilingUnmet,
    /// The router backend failed.
    #[error("router backend error: {0}")]
    Backend(String),
}

/// Opaque handle to a chosen downstream provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderHandle(pub String);

/// Consulted only when the adaptive responder selects `rewrite_prompt` or a
/// similarly provider-dependent mitigation; never on the hot path for
/// `allow`/`reject` (§6).
pub trait LlmRouter: Send + Sync {
    /// Selects a downstream provider for a request given the tier findings.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError`] if no provider can be selected.
    fn route(&self, findings_summary: &str) -> Result<ProviderHandle, RouterError>;
}

// ============================================================================
// SECTION: Telemetry Sink
// ============================================================================

/// A fire-and-forget observability event.
///
/// This is the whole of the core's logging surface: spec.md §9 treats
/// metrics/traces/audit logs as external observers of the decision record
/// stream, so the core emits only enough structured signal for such an
/// observer to build those views, never a log line itself.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    /// A configuration or data-integrity error was detected and the
    /// offending write rejected (§7 taxonomy (d)).
    IntegrityRejected {
        /// Human-readable description of what was rejected and why.
        detail: String,
    },
    /// A request was rejected due to worker-pool backpressure (§5).
    Overloaded {
        /// Queue length observed at rejection time.
        queue_len: usize,
    },
    /// A tier returned `unknown` because a collaborator was unavailable.
    TierDegraded {
        /// Which tier degraded (`1`, `2`, or `3`).
        tier: u8,
        /// Short description of the cause.
        cause: String,
    },
}

/// Receives [`TelemetryEvent`]s emitted by the gateway.
///
/// Never called on the hot path's error-return contract: `emit` failures
/// are not propagated, since telemetry delivery is best-effort by design.
pub trait TelemetrySink: Send + Sync {
    /// Emits one telemetry event.
    fn emit(&self, event: TelemetryEvent);
}

/// A telemetry sink that discards every event, used where no observer is
/// wired up (e.g. unit tests).
#[derive(Debug, Default)]
pub struct NullTelemetrySink;

impl TelemetrySink for NullTelemetrySink {
    fn emit(&self, _event: TelemetryEvent) {}
}
