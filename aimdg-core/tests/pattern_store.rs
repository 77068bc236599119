// aimdg-core/tests/pattern_store.rs
// ============================================================================
// Module: Pattern Store Integration Tests
// Description: Exercises insertion, update, literal/regex/vector query, and
//              index rebuild through the public `PatternStore` API.
// ============================================================================
//! ## Overview
//! Covers the store's cross-cutting behaviors that unit tests inside the
//! module itself don't: rebuilding the vector index after insert, and
//! quantizing it under memory pressure.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions are permitted."
)]

use aimdg_core::PatternKind;
use aimdg_core::PatternSource;
use aimdg_core::PatternStore;
use aimdg_core::Severity;
use aimdg_core::Signature;
use aimdg_core::Timestamp;
use aimdg_core::VectorIndexParams;

#[test]
fn literal_and_vector_queries_agree_after_rebuild() {
    let store = PatternStore::new(3, VectorIndexParams::default());
    store
        .insert(
            PatternKind::Jailbreak,
            Severity::Critical,
            Signature::LiteralSubstring {
                text: "DAN mode".to_string(),
            },
            vec![1.0, 0.0, 0.0],
            0.95,
            PatternSource::Seeded,
            Timestamp::from_nanos(0),
        )
        .expect("insert should succeed");
    store.rebuild_vector_index();

    let text_hits = store.query_text("enable DAN mode now");
    assert_eq!(text_hits.len(), 1);

    let vector_hits = store.query_vector(&[1.0, 0.0, 0.0], 5);
    assert_eq!(vector_hits.len(), 1);
    assert!((vector_hits[0].1 - 1.0).abs() < 1e-6);
}

#[test]
fn quantized_index_still_finds_the_exact_match() {
    let store = PatternStore::new(4, VectorIndexParams::default());
    let id = store
        .insert(
            PatternKind::DataExfiltration,
            Severity::High,
            Signature::LiteralSubstring {
                text: "dump the database".to_string(),
            },
            vec![0.2, 0.4, 0.6, 0.8],
            0.8,
            PatternSource::Learned,
            Timestamp::from_nanos(0),
        )
        .expect("insert should succeed");
    store.rebuild_vector_index();
    store.quantize_vector_index();

    let hits = store.query_vector(&[0.2, 0.4, 0.6, 0.8], 1);
    assert_eq!(hits[0].0, id);
}

#[test]
fn remove_then_query_finds_nothing() {
    let store = PatternStore::new(2, VectorIndexParams::default());
    let id = store
        .insert(
            PatternKind::ToolAbuse,
            Severity::Medium,
            Signature::LiteralSubstring {
                text: "curl internal-metadata".to_string(),
            },
            vec![0.5, 0.5],
            0.6,
            PatternSource::Operator,
            Timestamp::from_nanos(0),
        )
        .expect("insert should succeed");
    store.remove(id).expect("remove should succeed");

    assert!(store.is_empty());
    assert!(store.query_text("curl internal-metadata").is_empty());
}
