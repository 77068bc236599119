// aimdg-core/src/lib.rs
// ============================================================================
// Module: AI Manipulation Defense Gateway Core Library
// Description: Public API surface for the gateway's three-tier admission
//              pipeline.
// Purpose: Expose the gateway entry point plus the types a caller needs to
//          build requests, interpret decisions, and plug in its own
//          embedder, telemetry sink, and cold episode store.
// Dependencies: crate::{analyzer, config, decision, detector, episode,
//               external, hashing, ids, memory, orchestrator, pattern,
//               policy, request, responder, signing, store, time}
// ============================================================================

//! ## Overview
//! The AI Manipulation Defense Gateway inspects AI-bound prompts, tool
//! calls, and RAG contexts before they reach a model or an external effect,
//! and emits a signed, replayable [`decision::DecisionRecord`] for every
//! request. [`orchestrator::Gateway`] is the single entry point: construct
//! one from [`config::Settings`] and an [`orchestrator::PipelineDependencies`]
//! bundle, then call [`orchestrator::Gateway::admit`] per request.
//!
//! Detection runs in three tiers, each bounded by its own deadline (§4):
//! a fast pattern-and-vector match, a deep behavioral/temporal anomaly
//! analysis consulted only when the fast path is uncertain, and a
//! policy-verification-and-adaptive-response stage that picks the mitigation
//! to apply.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod analyzer;
pub mod config;
pub mod decision;
pub mod detector;
pub mod episode;
pub mod external;
pub mod hashing;
pub mod ids;
pub mod memory;
pub mod orchestrator;
pub mod pattern;
pub mod policy;
pub mod request;
pub mod responder;
pub mod signing;
pub mod store;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use analyzer::AnalysisOutcome;
pub use analyzer::AnalyzerParams;
pub use analyzer::Trajectory;
pub use config::Settings;
pub use config::SettingsCell;
pub use config::SettingsError;
pub use decision::DecisionCodecError;
pub use decision::DecisionRecord;
pub use decision::MatchSource;
pub use decision::MatchedPattern;
pub use decision::MitigationTag;
pub use decision::ReasonCode;
pub use decision::Tier;
pub use decision::Verdict;
pub use detector::DetectorOutcome;
pub use detector::DetectorParams;
pub use detector::DetectorStatus;
pub use episode::Episode;
pub use episode::Outcome;
pub use external::Embedder;
pub use external::EmbeddingError;
pub use external::FeedbackChannel;
pub use external::FeedbackError;
pub use external::LlmRouter;
pub use external::NullTelemetrySink;
pub use external::RouterError;
pub use external::TelemetryEvent;
pub use external::TelemetrySink;
pub use ids::CallerId;
pub use ids::EpisodeId;
pub use ids::PatternId;
pub use ids::PolicyName;
pub use ids::RequestId;
pub use memory::ColdEpisodeStore;
pub use memory::EpisodicMemory;
pub use memory::MemoryError;
pub use memory::MemoryParams;
pub use memory::NullColdStore;
pub use orchestrator::Gateway;
pub use orchestrator::PipelineDependencies;
pub use orchestrator::PoolError;
pub use orchestrator::WorkerPool;
pub use pattern::PatternKind;
pub use pattern::PatternSource;
pub use pattern::PatternUpdate;
pub use pattern::Severity;
pub use pattern::Signature;
pub use pattern::ThreatPattern;
pub use policy::Policy;
pub use policy::PolicyOutcome;
pub use policy::PredicateId;
pub use request::Action;
pub use request::ActionKind;
pub use request::Caller;
pub use request::Request;
pub use responder::AdaptiveResponder;
pub use responder::Findings;
pub use responder::ResponderParams;
pub use signing::SigningKey;
pub use signing::SigningKeyRing;
pub use store::PatternStore;
pub use store::PatternStoreError;
pub use store::TextMatch;
pub use store::VectorIndexParams;
pub use time::Clock;
pub use time::FixedClock;
pub use time::SystemClock;
pub use time::Timestamp;
