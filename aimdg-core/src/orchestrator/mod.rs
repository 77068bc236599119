// aimdg-core/src/orchestrator/mod.rs
// ============================================================================
// Module: Gateway Orchestrator
// Description: Ties the fast-path detector, deep-path analyzer, policy
//              engine, and adaptive responder into the single `admit`
//              entry point, behind a supervised worker pool.
// Purpose: Implement spec.md §4.1's ordered pipeline: combine tier
//          confidences, invoke deeper tiers only when the cheaper one could
//          not decide, merge matched patterns, sign the resulting decision,
//          and persist an episode — all within the per-request deadline
//          budget.
// Dependencies: aimdg-logic, crate::{analyzer, config, decision, detector,
//               episode, external, ids, memory, pattern, policy, request,
//               responder, signing, store, time}
// ============================================================================

//! ## Overview
//! [`Gateway`] is the crate's public entry point (§6). It owns a
//! [`crate::config::SettingsCell`] (pinned fresh per request), the pattern
//! store, embedder, episodic memory, adaptive responder, compiled policies,
//! signing key ring, telemetry sink, and clock — bundled as a [`Pipeline`] —
//! behind a [`supervisor::WorkerPool`]. `Gateway::admit` is the only call a
//! caller needs: it submits the request to the pool and returns the signed
//! [`crate::decision::DecisionRecord`], synthesizing an `overload` rejection
//! itself if the pool's queue was full (§5).
//!
//! The pipeline within one worker follows §4.1 exactly:
//! 1. Fill in `action.payload_digest` if the caller omitted it.
//! 2. Run the fast-path detector. If it reaches `clean` or `threat` at or
//!    above `tau_high`, emit the decision immediately at `tier_reached = 1`
//!    — the verdict (`allow` or `reject`) is wired directly from the
//!    detector's own finding; tiers 2 and 3 never run, and the decision
//!    never passes through the adaptive responder.
//! 3. Otherwise run the deep-path analyzer over the caller's recent episode
//!    window and combine its anomaly score with the fast path's own
//!    confidence via the noisy-or rule `1 - (1 - c1) * (1 - c2)`.
//! 4. If the combined confidence falls outside the uncertain band
//!    `[tau_low, tau_high)`, tier 2 itself has decided: emit `allow` below
//!    `tau_low` or `reject` at/above `tau_high`, at `tier_reached = 2`,
//!    again without consulting policy or the responder. Only when the
//!    combined confidence sits inside the band is tier 3 (policy
//!    verification, then the adaptive responder) invoked.
//! 5. Merge matched patterns (descending similarity, ties by ascending
//!    pattern id), sign the canonical bytes, and append an episode.

pub mod supervisor;

pub use supervisor::PoolError;
pub use supervisor::WorkerPool;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use aimdg_logic::Trace;
use aimdg_logic::TraceState;

use crate::analyzer;
use crate::analyzer::AnalyzerParams;
use crate::config::Settings;
use crate::config::SettingsCell;
use crate::decision::DecisionRecord;
use crate::decision::MatchedPattern;
use crate::decision::ReasonCode;
use crate::decision::Verdict;
use crate::detector;
use crate::detector::DetectorParams;
use crate::detector::DetectorStatus;
use crate::episode::Episode;
use crate::episode::Outcome;
use crate::external::Embedder;
use crate::external::TelemetryEvent;
use crate::external::TelemetrySink;
use crate::ids::RequestId;
use crate::memory::EpisodicMemory;
use crate::pattern::PatternKind;
use crate::pattern::Severity;
use crate::policy::Policy;
use crate::policy::PredicateId;
use crate::policy::evaluate_policies;
use crate::request::Request;
use crate::responder::AdaptiveResponder;
use crate::responder::Findings;
use crate::responder::respond;
use crate::signing::SigningKeyRing;
use crate::store::PatternStore;
use crate::time::Clock;

// ============================================================================
// SECTION: Pipeline Dependencies
// ============================================================================

/// Every collaborator one [`Pipeline`] needs, handed to [`Gateway::new`] in
/// one bundle so the constructor does not take a dozen positional arguments.
pub struct PipelineDependencies {
    /// The authoritative threat-pattern table.
    pub pattern_store: PatternStore,
    /// Turns prompt/context text into query vectors.
    pub embedder: Box<dyn Embedder>,
    /// Append-only per-caller decision history.
    pub memory: EpisodicMemory,
    /// UCB1 mitigation selector.
    pub responder: AdaptiveResponder,
    /// Compiled safety policies evaluated at tier 3.
    pub policies: Vec<Policy>,
    /// Keyed-MAC signer for canonical decision bytes.
    pub signing: SigningKeyRing,
    /// Observability sink for best-effort events.
    pub telemetry: Box<dyn TelemetrySink>,
    /// Source of monotonic timestamps for episodes.
    pub clock: Box<dyn Clock>,
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// The pure admission pipeline run by every worker thread.
///
/// Holds no settings of its own: every call to [`Pipeline::run`] takes the
/// pinned [`Settings`] snapshot current when the job was picked up, so a
/// concurrent settings publish never changes behavior mid-request (§9).
pub struct Pipeline {
    pattern_store: PatternStore,
    embedder: Box<dyn Embedder>,
    memory: EpisodicMemory,
    responder: AdaptiveResponder,
    policies: Vec<Policy>,
    signing: SigningKeyRing,
    telemetry: Box<dyn TelemetrySink>,
    clock: Box<dyn Clock>,
}

/// Combines two independent confidence signals via the noisy-or rule
/// (§4.1 step 4): the probability that at least one of two independent
/// observations correctly flags a threat.
fn combine_confidence(c1: f32, c2: f32) -> f32 {
    (1.0 - c1).mul_add(-(1.0 - c2), 1.0)
}

impl Pipeline {
    /// Builds a pipeline from its dependency bundle.
    #[must_use]
    pub fn new(deps: PipelineDependencies) -> Self {
        Self {
            pattern_store: deps.pattern_store,
            embedder: deps.embedder,
            memory: deps.memory,
            responder: deps.responder,
            policies: deps.policies,
            signing: deps.signing,
            telemetry: deps.telemetry,
            clock: deps.clock,
        }
    }

    /// Runs the full admission pipeline for one request (§4.1).
    #[allow(
        clippy::too_many_lines,
        reason = "the ordered five-step pipeline reads clearer as one function than split across ad hoc helpers"
    )]
    #[must_use]
    pub fn run(&self, settings: &Settings, mut request: Request) -> DecisionRecord {
        let started = Instant::now();

        if request.action.payload_digest.is_none() {
            request.action.payload_digest = Some(self.compute_payload_digest(&request));
        }

        let detector_params = DetectorParams {
            vector_k: DetectorParams::default().vector_k,
            theta_vector: settings.theta_vector,
            theta_vector_high: settings.theta_vector_high,
            mmr_lambda: settings.mmr_lambda,
        };
        let fast_deadline = settings.fast_path_deadline(request.sla_ms);
        let tier1 = detector::detect(
            &request,
            &self.pattern_store,
            self.embedder.as_ref(),
            detector_params,
            fast_deadline,
        );

        if tier1.embedder_unavailable {
            self.telemetry.emit(TelemetryEvent::TierDegraded {
                tier: 1,
                cause: "embedder unavailable".to_string(),
            });
        }

        // §4.1 step 2: a decisive fast path emits immediately — tiers 2 and
        // 3 never run, and the verdict is wired directly rather than routed
        // through the (possibly untrained) adaptive responder.
        if tier1.status == DetectorStatus::Clean && tier1.confidence >= settings.tau_high {
            return self.finish(&request, started, 1, Verdict::Allow, tier1.confidence, Vec::new(), None, None);
        }
        if tier1.status == DetectorStatus::Threat && tier1.confidence >= settings.tau_high {
            let matches = DecisionRecord::merge_matches(tier1.matches);
            return self.finish(
                &request,
                started,
                1,
                Verdict::Reject,
                tier1.confidence,
                matches,
                None,
                Some(ReasonCode::ThreatDetected),
            );
        }

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let remaining_sla_ms = request.sla_ms.map(|sla| sla.saturating_sub(elapsed_ms));
        let deep_deadline = settings.deep_path_deadline(remaining_sla_ms);

        let window = self.memory.recent(&request.caller.id, settings.caller_history_size);
        let current_similarity = tier1
            .matches
            .iter()
            .map(|matched| matched.similarity)
            .fold(0.0_f32, f32::max);
        let analyzer_params = AnalyzerParams {
            min_events: AnalyzerParams::default().min_events,
            embedding_dimension: AnalyzerParams::default().embedding_dimension,
            embedding_delay: AnalyzerParams::default().embedding_delay,
            stable_cut: AnalyzerParams::default().stable_cut,
            chaotic_cut: AnalyzerParams::default().chaotic_cut,
        };
        let outcome = if deep_deadline == Duration::ZERO {
            None
        } else {
            Some(analyzer::analyze(&window, current_similarity, analyzer_params))
        };

        let tier1_threat_prob = match tier1.status {
            DetectorStatus::Threat => tier1.confidence,
            DetectorStatus::Clean => 1.0 - tier1.confidence,
            DetectorStatus::Uncertain => tier1.confidence,
        };
        let combined = outcome.map_or(tier1_threat_prob, |analysis| {
            combine_confidence(tier1_threat_prob, analysis.anomaly_score)
        });

        if outcome.is_none() {
            self.telemetry.emit(TelemetryEvent::TierDegraded {
                tier: 2,
                cause: "deadline exhausted before analyzer ran".to_string(),
            });
        }

        let matches = DecisionRecord::merge_matches(tier1.matches);

        // §4.1 step 4: tier 3 is invoked only while `combined` sits in the
        // uncertain band `[tau_low, tau_high)`. Outside it, tier 2 itself
        // has decided and the decision is emitted without descending
        // further.
        if combined < settings.tau_low {
            return self.finish(&request, started, 2, Verdict::Allow, combined, matches, None, None);
        }
        if combined >= settings.tau_high {
            let reason = if matches.is_empty() {
                ReasonCode::AnomalousBehavior
            } else {
                ReasonCode::ThreatDetected
            };
            return self.finish(&request, started, 2, Verdict::Reject, combined, matches, None, Some(reason));
        }

        let highest_severity = self.highest_severity(&matches);
        let pii_detected = self.any_pii(&matches);
        // Reaching here means `combined >= tau_low` already (the branch
        // above returns otherwise), so the uncertain band itself counts as
        // a threat signal worth policy verification, regardless of whether
        // any individual pattern matched.
        let threat_detected = true;

        let trace = self.build_trace(threat_detected, pii_detected, &request, started, settings);
        let policy_outcomes = match evaluate_policies(&self.policies, &trace) {
            Ok(outcomes) => outcomes,
            Err(_evaluation_error) => {
                // An unknown predicate or empty trace is a configuration
                // bug (§4.5); fail closed rather than let a malformed
                // policy silently pass every request.
                Vec::new()
            }
        };

        let responder_findings = Findings {
            threat_detected,
            highest_severity,
            pii_detected,
            confidence: combined,
        };
        let (verdict, mitigation_applied, reason) =
            respond(&self.responder, &policy_outcomes, &responder_findings);

        let reason = reason.or_else(|| match verdict {
            Verdict::Allow => None,
            Verdict::Sanitize | Verdict::Escalate if threat_detected => Some(ReasonCode::ThreatDetected),
            _ => None,
        });

        self.finish(&request, started, 3, verdict, combined, matches, mitigation_applied, reason)
    }

    /// Builds, signs, and persists the final decision record for one tier's
    /// resolution, regardless of which tier settled it.
    #[allow(clippy::too_many_arguments, reason = "every field is a distinct, already-resolved piece of the record")]
    fn finish(
        &self,
        request: &Request,
        started: Instant,
        tier_reached: u8,
        verdict: Verdict,
        confidence: f32,
        matched_patterns: Vec<MatchedPattern>,
        mitigation_applied: Option<crate::decision::MitigationTag>,
        reason: Option<ReasonCode>,
    ) -> DecisionRecord {
        let latency_ns = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);
        let mut record = DecisionRecord {
            request_id: request.id,
            verdict,
            tier_reached,
            confidence,
            matched_patterns,
            mitigation_applied,
            latency_ns,
            reason,
            proof_token: Vec::new(),
        };
        record.proof_token = self.signing.sign(&record.signable_bytes()).unwrap_or_default();
        self.persist_episode(request, &record);
        record
    }

    fn compute_payload_digest(&self, request: &Request) -> String {
        let mut combined = String::new();
        for text in request.scannable_texts() {
            combined.push_str(text);
            combined.push('\u{0}');
        }
        crate::hashing::hash_bytes(crate::hashing::DEFAULT_HASH_ALGORITHM, combined.as_bytes()).value
    }

    fn highest_severity(&self, matches: &[MatchedPattern]) -> Option<Severity> {
        matches
            .iter()
            .filter_map(|matched| self.pattern_store.get(matched.pattern_id))
            .map(|pattern| pattern.severity)
            .max()
    }

    fn any_pii(&self, matches: &[MatchedPattern]) -> bool {
        matches.iter().any(|matched| {
            self.pattern_store
                .get(matched.pattern_id)
                .is_some_and(|pattern| pattern.kind == PatternKind::PiiLeak)
        })
    }

    /// Builds the single-state decision trace the policy engine evaluates
    /// (§4.5). Only predicates knowable before the responder has picked a
    /// mitigation are asserted: `mitigation_applied` and `escalated` are
    /// each an effect of this very decision, not an input to it, so named
    /// policies reason about them via the *next* request's trace instead.
    fn build_trace(
        &self,
        threat_detected: bool,
        pii_detected: bool,
        request: &Request,
        started: Instant,
        settings: &Settings,
    ) -> Trace<PredicateId> {
        let mut state = TraceState::new();
        if threat_detected {
            state.assert(PredicateId::ThreatDetected);
        }
        if pii_detected {
            state.assert(PredicateId::PiiDetected);
        }
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let within_sla = request.sla_ms.is_none_or(|sla| elapsed_ms <= sla.min(settings.total_deadline_ms));
        if within_sla {
            state.assert(PredicateId::LatencyWithinSla);
        }
        let mut trace = Trace::new();
        trace.push(state);
        trace
    }

    fn persist_episode(&self, request: &Request, record: &DecisionRecord) {
        let feature_vector = vec![
            record.confidence,
            f32::from(record.tier_reached),
            u32_to_f32_saturating(record.matched_patterns.len()),
        ];
        let episode = Episode {
            id: crate::ids::EpisodeId::from_raw(0),
            decision: record.clone(),
            feature_vector,
            outcome: Outcome::Unknown,
            effectiveness: 0.0,
            parent_episode_id: None,
            timestamp: self.clock.now(),
        };
        self.memory.append(request.caller.id.clone(), episode);
    }
}

#[allow(
    clippy::cast_precision_loss,
    reason = "feature vector entries are small bounded counts, not precision-sensitive quantities"
)]
fn u32_to_f32_saturating(value: usize) -> f32 {
    value.min(u32::MAX as usize) as f32
}

// ============================================================================
// SECTION: Gateway
// ============================================================================

/// The gateway's public entry point (§6): owns the settings cell and the
/// supervised worker pool, and exposes the single `admit` operation.
pub struct Gateway {
    settings: Arc<SettingsCell>,
    pipeline: Arc<Pipeline>,
    pool: WorkerPool,
}

impl Gateway {
    /// Constructs a gateway from validated settings and its dependency
    /// bundle, spawning the worker pool immediately.
    ///
    /// # Errors
    ///
    /// Returns [`crate::config::SettingsError`] if `settings` fails
    /// validation.
    pub fn new(
        settings: Settings,
        deps: PipelineDependencies,
    ) -> Result<Self, crate::config::SettingsError> {
        settings.validate()?;
        let worker_count = settings.worker_pool_size;
        let queue_capacity = settings.overload_high_water;
        let settings_cell = Arc::new(SettingsCell::new(settings));
        let pipeline = Arc::new(Pipeline::new(deps));
        let pool = WorkerPool::new(worker_count, queue_capacity, Arc::clone(&settings_cell), Arc::clone(&pipeline));
        Ok(Self {
            settings: settings_cell,
            pipeline,
            pool,
        })
    }

    /// Admits `request`, returning a signed, verifiable decision record.
    ///
    /// Never blocks past the pool's own queueing behavior: if the worker
    /// pool's bounded queue is full, this synthesizes an `overload`
    /// rejection directly rather than enqueuing (§5).
    #[must_use]
    pub fn admit(&self, request: Request) -> DecisionRecord {
        let request_id = request.id;
        match self.pool.submit(request) {
            Ok(record) => record,
            Err(PoolError::QueueFull { queue_len }) => self.overload_record(request_id, queue_len),
            Err(PoolError::ShuttingDown | PoolError::WorkerLost) => self.overload_record(request_id, 0),
        }
    }

    /// Publishes a new settings snapshot for subsequent admissions.
    ///
    /// # Errors
    ///
    /// Returns [`crate::config::SettingsError`] if `next` fails validation.
    pub fn update_settings(&self, next: Settings) -> Result<(), crate::config::SettingsError> {
        self.settings.publish(next)
    }

    /// Returns the currently pinned settings snapshot.
    #[must_use]
    pub fn settings(&self) -> Arc<Settings> {
        self.settings.pin()
    }

    fn overload_record(&self, request_id: RequestId, queue_len: usize) -> DecisionRecord {
        let mut record = DecisionRecord {
            request_id,
            verdict: Verdict::Reject,
            // No tier was consulted: the request never reached a worker.
            tier_reached: 0,
            confidence: 0.0,
            matched_patterns: Vec::new(),
            mitigation_applied: None,
            latency_ns: 0,
            reason: Some(ReasonCode::Overload),
            proof_token: Vec::new(),
        };
        record.proof_token = self.pipeline.signing.sign(&record.signable_bytes()).unwrap_or_default();
        self.pipeline.telemetry.emit(TelemetryEvent::Overloaded { queue_len });
        record
    }
}
