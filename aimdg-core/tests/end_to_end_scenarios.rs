// aimdg-core/tests/end_to_end_scenarios.rs
// ============================================================================
// Module: End-to-End Gateway Scenarios
// Description: Runs realistic multi-request sessions through `Gateway::admit`
//              to cover cross-tier and cross-request behavior a single-call
//              test can't: policy violations from an operator-authored
//              policy, and the worker pool's overload path under real
//              concurrency.
// ============================================================================
//! ## Overview
//! Two scenarios: an operator policy that escalates whenever PII is detected
//! without having been redacted, and a gateway with a one-slot queue driven
//! concurrently to observe a genuine overload rejection.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions are permitted."
)]

use std::sync::Arc;
use std::thread;

use aimdg_core::Action;
use aimdg_core::ActionKind;
use aimdg_core::Caller;
use aimdg_core::CallerId;
use aimdg_core::EmbeddingError;
use aimdg_core::EpisodicMemory;
use aimdg_core::Gateway;
use aimdg_core::MemoryParams;
use aimdg_core::NullColdStore;
use aimdg_core::NullTelemetrySink;
use aimdg_core::PatternKind;
use aimdg_core::PatternSource;
use aimdg_core::PatternStore;
use aimdg_core::PipelineDependencies;
use aimdg_core::PolicyName;
use aimdg_core::ReasonCode;
use aimdg_core::Request;
use aimdg_core::RequestId;
use aimdg_core::ResponderParams;
use aimdg_core::Settings;
use aimdg_core::Severity;
use aimdg_core::Signature;
use aimdg_core::SigningKey;
use aimdg_core::SigningKeyRing;
use aimdg_core::SystemClock;
use aimdg_core::Timestamp;
use aimdg_core::Verdict;
use aimdg_core::external::Embedder;
use aimdg_core::policy::Policy;
use aimdg_core::policy::PredicateId;
use aimdg_core::responder::AdaptiveResponder;
use aimdg_logic::Formula;

struct ZeroEmbedder {
    dimension: usize,
}

impl Embedder for ZeroEmbedder {
    fn embed(&self, _text: &str, _deadline: std::time::Duration) -> Result<Vec<f32>, EmbeddingError> {
        Ok(vec![0.0; self.dimension])
    }

    fn embed_batch(
        &self,
        texts: &[&str],
        _deadline: std::time::Duration,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|_| vec![0.0; self.dimension]).collect())
    }

    fn model_version(&self) -> &str {
        "zero-v0"
    }
}

fn request_with_prompt(prompt: &str) -> Request {
    Request {
        id: RequestId::from_raw(1),
        received_at: Timestamp::from_nanos(0),
        caller: Caller {
            id: CallerId::new("scenario-caller"),
            tags: Vec::new(),
        },
        action: Action {
            kind: ActionKind::Generate,
            resource: "chat".to_string(),
            method: "complete".to_string(),
            payload_digest: None,
        },
        prompt: prompt.to_string(),
        context_docs: Vec::new(),
        sla_ms: None,
        cost_ceiling: None,
    }
}

#[test]
fn pii_without_redaction_policy_escalates_the_request() {
    // A DTW-only match (not literal/regex) keeps tier 1 at `Uncertain`
    // rather than an immediate `Threat`, so this exercises tier 3's policy
    // stage rather than the fast path's own "emit immediately" shortcut
    // (§4.1 step 2 only fires for literal/regex or decisive vector hits).
    let store = PatternStore::new(4, aimdg_core::VectorIndexParams::default());
    store
        .insert(
            PatternKind::PiiLeak,
            Severity::Medium,
            Signature::TokenSequence {
                tokens: vec![
                    "my".to_string(),
                    "social".to_string(),
                    "security".to_string(),
                    "number".to_string(),
                    "is".to_string(),
                    "confidential".to_string(),
                ],
                anchor: "social".to_string(),
            },
            vec![0.0; 4],
            0.8,
            PatternSource::Seeded,
            Timestamp::from_nanos(0),
        )
        .expect("insert should succeed");

    // Two independent high-severity violations are required to escalate
    // (§4.5: "Multiple high violations with no critical → escalate"); a
    // lone high violation is left to the adaptive responder instead.
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

    let deps = PipelineDependencies {
        pattern_store: store,
        embedder: Box::new(ZeroEmbedder { dimension: 4 }),
        memory: EpisodicMemory::new(MemoryParams::default(), Box::new(NullColdStore)),
        responder: AdaptiveResponder::new(ResponderParams::default()),
        policies: vec![pii_must_be_redacted, threat_must_be_mitigated],
        signing: SigningKeyRing::new(SigningKey::new(0, b"scenario-key".to_vec())),
        telemetry: Box::new(NullTelemetrySink),
        clock: Box::new(SystemClock),
    };
    let gateway = Gateway::new(Settings::default(), deps).expect("default settings are valid");

    // Token-for-token identical to the pattern except "confidential" vs.
    // the digit group: DTW similarity = 1 - 1/6 ≈ 0.833, which combines
    // with the fresh caller's `insufficient_history` anomaly score (0.5)
    // to land at ≈0.917 — inside the uncertain band so tier 3 runs.
    let record = gateway.admit(request_with_prompt("my social security number is 000-00-0000"));
    assert_eq!(record.tier_reached, 3);
    assert_eq!(record.verdict, Verdict::Escalate);
    assert!(matches!(record.reason, Some(ReasonCode::PolicyViolation(_))));
}

#[test]
fn overloaded_pool_synthesizes_a_signed_rejection() {
    let deps = PipelineDependencies {
        pattern_store: PatternStore::new(4, aimdg_core::VectorIndexParams::default()),
        embedder: Box::new(ZeroEmbedder { dimension: 4 }),
        memory: EpisodicMemory::new(MemoryParams::default(), Box::new(NullColdStore)),
        responder: AdaptiveResponder::new(ResponderParams::default()),
        policies: Vec::new(),
        signing: SigningKeyRing::new(SigningKey::new(0, b"scenario-key".to_vec())),
        telemetry: Box::new(NullTelemetrySink),
        clock: Box::new(SystemClock),
    };
    let mut settings = Settings::default();
    settings.worker_pool_size = 1;
    settings.overload_high_water = 1;
    let gateway = Arc::new(Gateway::new(settings, deps).expect("settings are valid"));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let gateway = Arc::clone(&gateway);
            thread::spawn(move || gateway.admit(request_with_prompt(&format!("request {i}"))))
        })
        .collect();

    let records: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("worker thread should not panic"))
        .collect();

    // Every submission gets a signed, self-consistent decision regardless
    // of whether it was admitted or rejected for overload: the pool never
    // silently drops a request.
    assert_eq!(records.len(), 16);
    for record in &records {
        assert!(!record.proof_token.is_empty());
        assert!(record.satisfies_mitigation_invariant());
        if record.reason == Some(ReasonCode::Overload) {
            assert_eq!(record.tier_reached, 0);
        }
    }
}
