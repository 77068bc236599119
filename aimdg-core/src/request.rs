// aimdg-core/src/request.rs
// ============================================================================
// Module: Request
// Description: The unit of admission the gateway decides on.
// Purpose: Model an AI-request: caller identity, action descriptor, prompt,
//          and context documents, exactly as spec.md §3 defines `Request`.
// Dependencies: crate::{ids, time}
// ============================================================================

//! ## Overview
//! A [`Request`] is a fully parsed AI-request: the gateway never parses HTTP
//! or any other transport framing (spec.md §1, Non-goals) — it receives one
//! of these already assembled and returns a `DecisionRecord` for it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::ids::CallerId;
use crate::ids::RequestId;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Action
// ============================================================================

/// The kind of action an AI-request performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// A read of existing data or state.
    Read,
    /// A write or mutation.
    Write,
    /// An administrative operation.
    Admin,
    /// A tool or function invocation.
    Tool,
    /// Free-form generation (the common "chat" case).
    Generate,
}

/// Describes what the request is trying to do, independent of its prompt
/// text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// The kind of action.
    pub kind: ActionKind,
    /// The resource the action targets (opaque to the gateway).
    pub resource: String,
    /// The method or operation name within the resource.
    pub method: String,
    /// Digest of the action payload, used for dedup and audit correlation.
    /// Computed by the caller if available; the orchestrator computes it
    /// from the prompt and context documents when absent (§4.1 step 1).
    pub payload_digest: Option<String>,
}

// ============================================================================
// SECTION: Caller
// ============================================================================

/// Identifies the principal issuing the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Opaque caller identifier, used to scope episodic-memory lookback.
    pub id: CallerId,
    /// Free-form tags (e.g. `"trust:internal"`, `"org:acme"`).
    pub tags: Vec<String>,
}

// ============================================================================
// SECTION: Request
// ============================================================================

/// A fully parsed AI-request awaiting an admission decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Opaque 128-bit request identifier, unique per process lifetime.
    pub id: RequestId,
    /// Monotonic arrival timestamp.
    pub received_at: Timestamp,
    /// The requesting principal.
    pub caller: Caller,
    /// What the request is trying to do.
    pub action: Action,
    /// The prompt text submitted for the model.
    pub prompt: String,
    /// Ordered context documents (e.g. RAG retrieval results) accompanying
    /// the prompt.
    pub context_docs: Vec<String>,
    /// Optional per-request SLA in milliseconds, bounding the orchestrator's
    /// deadlines (§4.1).
    pub sla_ms: Option<u64>,
    /// Optional cost ceiling, consulted only by the (external) LLM router.
    pub cost_ceiling: Option<f64>,
}

impl Request {
    /// Returns every text blob the detector tiers must scan: the prompt
    /// followed by each context document, in order.
    pub fn scannable_texts(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.prompt.as_str()).chain(self.context_docs.iter().map(String::as_str))
    }

    /// Returns `true` if the request carries no prompt and no context
    /// documents (the spec.md §8 "empty prompt" boundary case).
    #[must_use]
    pub fn is_empty_payload(&self) -> bool {
        self.prompt.is_empty() && self.context_docs.iter().all(String::is_empty)
    }
}
