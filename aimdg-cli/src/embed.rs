// aimdg-cli/src/embed.rs
// ============================================================================
// Module: Offline Embedder
// Description: Deterministic, dependency-free stand-in for a real embedding
//              model, for use when the CLI runs without a configured
//              embedding backend.
// Purpose: Let `admit` exercise the gateway's vector-similarity path without
//          a network call, while still producing a stable, reproducible
//          embedding for a given request across runs.
// Dependencies: aimdg-core
// ============================================================================

//! ## Overview
//! [`HashEmbedder`] implements the feature-hashing trick: each byte of the
//! input text is folded into a running FNV-1a-style hash, which selects a
//! bucket to increment in a fixed-length vector. The result is normalized to
//! unit length. Two requests with similar byte content land close together
//! under cosine similarity, which is enough to drive the pattern store's
//! vector index end to end in a CLI context; it is not a semantic embedding
//! and should never be mistaken for one in a deployment that has a real
//! model available.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use aimdg_core::Embedder;
use aimdg_core::EmbeddingError;

// ============================================================================
// SECTION: HashEmbedder
// ============================================================================

/// A deterministic, offline [`Embedder`] backed by feature hashing.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    /// Length of the vectors this embedder produces.
    dimension: usize,
}

impl HashEmbedder {
    /// Creates an embedder that produces `dimension`-length vectors.
    #[must_use]
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str, _deadline: Duration) -> Result<Vec<f32>, EmbeddingError> {
        Ok(hash_embed(text, self.dimension))
    }

    fn embed_batch(&self, texts: &[&str], deadline: Duration) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|text| self.embed(text, deadline)).collect()
    }

    fn model_version(&self) -> &str {
        "hash-bow-v1"
    }
}

/// Maps `text` onto a unit-length, `dimension`-length vector by hashing each
/// byte into a signed bucket contribution.
#[must_use]
pub fn hash_embed(text: &str, dimension: usize) -> Vec<f32> {
    let dimension = dimension.max(1);
    let mut out = vec![0.0f32; dimension];
    let mut state: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in text.bytes() {
        state ^= u64::from(byte);
        state = state.wrapping_mul(0x0000_0100_0000_01B3);
        let bucket = (state as usize) % dimension;
        let sign = if state & 1 == 0 { 1.0 } else { -1.0 };
        out[bucket] += sign;
    }
    let norm = out.iter().map(|value| value * value).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut out {
            *value /= norm;
        }
    }
    out
}
