// aimdg-core/src/store/vector_index.rs
// ============================================================================
// Module: Vector Index
// Description: Hierarchical graph-based approximate nearest-neighbor index
//              over pattern embeddings, with scalar quantization under
//              memory pressure.
// Purpose: Implement spec.md §4.3's vector index: parameters `M`,
//          `ef_construction`, `ef_search`; wait-free reads against inserts;
//          atomic single-pointer swap on rebuild; tombstone deletion.
// Dependencies: rand, crate::ids
// ============================================================================

//! ## Overview
//! This is a from-scratch HNSW-style index: each inserted vector is
//! assigned a random level by the usual exponential-decay rule
//! (`m_l = 1 / ln(M)`), linked into every layer at or below its level, and
//! searched top-down — a greedy single-candidate descent through the upper
//! layers, then a beam search of width `ef_search` at layer 0. Deletions set
//! a tombstone bit rather than unlinking (cheap, keeps the graph connected);
//! `rebuild` compacts tombstoned entries into a fresh graph that the caller
//! swaps in atomically.
//!
//! Under memory pressure the store quantizes vectors to 8 bits per
//! component (spec.md §4.3 "Failure semantics"; the 4-bit option is noted in
//! `DESIGN.md` as considered and not built). Quantized similarity
//! dequantizes on the fly; this trades a small accuracy loss for the memory
//! reduction, which is exactly the tradeoff spec.md calls for.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::collections::HashSet;

use rand::Rng;

use crate::ids::PatternId;

// ============================================================================
// SECTION: Parameters
// ============================================================================

/// Tuning parameters for a [`VectorIndex`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorIndexParams {
    /// Neighbors per node per layer (default 16).
    pub m: usize,
    /// Candidate list size during construction (default 200).
    pub ef_construction: usize,
    /// Candidate list size during search (default 100).
    pub ef_search: usize,
}

impl Default for VectorIndexParams {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 100,
        }
    }
}

// ============================================================================
// SECTION: Vector Storage
// ============================================================================

/// A stored embedding, either full precision or 8-bit scalar-quantized.
#[derive(Debug, Clone)]
enum Storage {
    Full(Vec<f32>),
    Quantized {
        scale: f32,
        min: f32,
        bytes: Vec<u8>,
    },
}

impl Storage {
    fn dequantize(&self) -> Vec<f32> {
        match self {
            Self::Full(values) => values.clone(),
            Self::Quantized { scale, min, bytes } => bytes
                .iter()
                .map(|byte| min + (f32::from(*byte) * *scale))
                .collect(),
        }
    }

    fn quantize_from(values: &[f32]) -> Self {
        let min = values.iter().copied().fold(f32::INFINITY, f32::min);
        let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let range = (max - min).max(f32::EPSILON);
        let scale = range / 255.0;
        let bytes = values
            .iter()
            .map(|value| {
                let normalized = ((*value - min) / scale).round().clamp(0.0, 255.0);
                #[allow(
                    clippy::cast_possible_truncation,
                    reason = "normalized is clamped to [0, 255] above"
                )]
                let byte = normalized as u8;
                byte
            })
            .collect();
        Self::Quantized { scale, min, bytes }
    }
}

// ============================================================================
// SECTION: Similarity
// ============================================================================

/// Cosine similarity between two equal-length vectors, in `[-1, 1]`.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

// ============================================================================
// SECTION: Node
// ============================================================================

struct Node {
    pattern_id: PatternId,
    storage: Storage,
    layers: Vec<Vec<usize>>,
    tombstoned: bool,
}

// ============================================================================
// SECTION: Scored Candidate
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct Candidate {
    index: usize,
    similarity: f32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.similarity == other.similarity
    }
}
impl Eq for Candidate {}
impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.similarity
            .partial_cmp(&other.similarity)
            .unwrap_or(Ordering::Equal)
    }
}

// ============================================================================
// SECTION: Vector Index
// ============================================================================

/// A single hierarchical approximate-NN graph instance.
///
/// The pattern store never mutates one of these in place across a rebuild:
/// it builds a fresh `VectorIndex` on a shadow copy and swaps an `Arc` to it
/// (§4.3, §5). Within one instance, inserts and tombstones are the only
/// supported mutation.
pub struct VectorIndex {
    params: VectorIndexParams,
    dimension: usize,
    nodes: Vec<Node>,
    entry_point: Option<usize>,
    max_level: usize,
}

impl VectorIndex {
    /// Creates an empty index over `dimension`-length vectors.
    #[must_use]
    pub fn new(dimension: usize, params: VectorIndexParams) -> Self {
        Self {
            params,
            dimension,
            nodes: Vec::new(),
            entry_point: None,
            max_level: 0,
        }
    }

    /// Returns the embedding dimension this index was built for.
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Returns the number of live (non-tombstoned) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|node| !node.tombstoned).count()
    }

    /// Returns `true` if the index holds no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn level_for_new_node(&self) -> usize {
        let m_l = 1.0 / (self.params.m.max(2) as f64).ln();
        let mut rng = rand::thread_rng();
        let uniform: f64 = rng.gen_range(f64::EPSILON..1.0);
        (-uniform.ln() * m_l).floor() as usize
    }

    fn similarity_to(&self, index: usize, query: &[f32]) -> f32 {
        cosine_similarity(&self.nodes[index].storage.dequantize(), query)
    }

    fn search_layer(&self, query: &[f32], entry: usize, ef: usize, layer: usize) -> Vec<Candidate> {
        let mut visited = HashSet::new();
        visited.insert(entry);
        let entry_similarity = self.similarity_to(entry, query);
        let mut candidates = BinaryHeap::new();
        candidates.push(Candidate {
            index: entry,
            similarity: entry_similarity,
        });
        let mut results = vec![Candidate {
            index: entry,
            similarity: entry_similarity,
        }];

        while let Some(current) = candidates.pop() {
            let worst_kept = results
                .iter()
                .map(|candidate| candidate.similarity)
                .fold(f32::INFINITY, f32::min);
            if current.similarity < worst_kept && results.len() >= ef {
                break;
            }
            let Some(neighbors) = self.nodes[current.index].layers.get(layer) else {
                continue;
            };
            for &neighbor in neighbors {
                if !visited.insert(neighbor) {
                    continue;
                }
                let similarity = self.similarity_to(neighbor, query);
                candidates.push(Candidate {
                    index: neighbor,
                    similarity,
                });
                results.push(Candidate {
                    index: neighbor,
                    similarity,
                });
                if results.len() > ef {
                    results.sort_by(|a, b| b.cmp(a));
                    results.truncate(ef);
                }
            }
        }

        results.sort_by(|a, b| b.cmp(a));
        results.truncate(ef.max(1));
        results
    }

    /// Inserts a new embedding into the index.
    ///
    /// Connectivity is kept: the new node links into every layer at or
    /// below its assigned level, and reverse links are added and pruned to
    /// `M` on the neighbors it connects to.
    pub fn insert(&mut self, pattern_id: PatternId, embedding: Vec<f32>) {
        let level = self.level_for_new_node();
        let new_index = self.nodes.len();
        self.nodes.push(Node {
            pattern_id,
            storage: Storage::Full(embedding.clone()),
            layers: vec![Vec::new(); level + 1],
            tombstoned: false,
        });

        let Some(entry_point) = self.entry_point else {
            self.entry_point = Some(new_index);
            self.max_level = level;
            return;
        };

        let mut current_entry = entry_point;
        for layer in (level + 1..=self.max_level).rev() {
            let found = self.search_layer(&embedding, current_entry, 1, layer);
            if let Some(best) = found.first() {
                current_entry = best.index;
            }
        }

        for layer in (0..=level.min(self.max_level)).rev() {
            let candidates = self.search_layer(
                &embedding,
                current_entry,
                self.params.ef_construction,
                layer,
            );
            let chosen: Vec<usize> = candidates
                .iter()
                .take(self.params.m)
                .map(|candidate| candidate.index)
                .collect();
            for &neighbor in &chosen {
                self.nodes[new_index].layers[layer].push(neighbor);
                let reverse = &mut self.nodes[neighbor].layers;
                if reverse.len() > layer {
                    reverse[layer].push(new_index);
                    if reverse[layer].len() > self.params.m {
                        reverse[layer].truncate(self.params.m);
                    }
                }
            }
            if let Some(first) = chosen.first() {
                current_entry = *first;
            }
        }

        if level > self.max_level {
            self.max_level = level;
            self.entry_point = Some(new_index);
        }
    }

    /// Marks a pattern's entry as deleted without removing it from the
    /// graph (§4.3: "deletions mark tombstones and reconcile on rebuild").
    pub fn tombstone(&mut self, pattern_id: PatternId) {
        if let Some(node) = self
            .nodes
            .iter_mut()
            .find(|node| node.pattern_id == pattern_id)
        {
            node.tombstoned = true;
        }
    }

    /// Returns the top-`k` live entries by cosine similarity to `query`,
    /// descending.
    #[must_use]
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(PatternId, f32)> {
        let Some(entry_point) = self.entry_point else {
            return Vec::new();
        };
        let mut current_entry = entry_point;
        for layer in (1..=self.max_level).rev() {
            let found = self.search_layer(query, current_entry, 1, layer);
            if let Some(best) = found.first() {
                current_entry = best.index;
            }
        }
        let candidates = self.search_layer(query, current_entry, self.params.ef_search.max(k), 0);
        candidates
            .into_iter()
            .filter(|candidate| !self.nodes[candidate.index].tombstoned)
            .take(k)
            .map(|candidate| (self.nodes[candidate.index].pattern_id, candidate.similarity))
            .collect()
    }

    /// Falls back to an exhaustive linear scan over live entries, used when
    /// the index is mid-rebuild and the detector's deadline does not allow
    /// waiting for the swap (§4.2 "Failure semantics").
    #[must_use]
    pub fn linear_scan(&self, query: &[f32], k: usize) -> Vec<(PatternId, f32)> {
        let mut scored: Vec<(PatternId, f32)> = self
            .nodes
            .iter()
            .filter(|node| !node.tombstoned)
            .map(|node| (node.pattern_id, cosine_similarity(&node.storage.dequantize(), query)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);
        scored
    }

    /// Rebuilds a fresh, compacted index from the live entries of `self`,
    /// dropping tombstoned nodes. The caller is responsible for swapping
    /// the returned index in atomically (§4.3, §5).
    #[must_use]
    pub fn rebuild(&self) -> Self {
        let mut fresh = Self::new(self.dimension, self.params);
        for node in &self.nodes {
            if !node.tombstoned {
                fresh.insert(node.pattern_id, node.storage.dequantize());
            }
        }
        fresh
    }

    /// Quantizes every stored vector to 8 bits per component in place,
    /// reducing memory at the cost of similarity precision (§4.3 "Failure
    /// semantics": invoked when the index crosses a configured memory
    /// ceiling).
    pub fn quantize_all(&mut self) {
        for node in &mut self.nodes {
            if let Storage::Full(values) = &node.storage {
                node.storage = Storage::quantize_from(values);
            }
        }
    }

    /// Returns `true` if every stored vector is currently quantized.
    #[must_use]
    pub fn is_fully_quantized(&self) -> bool {
        self.nodes
            .iter()
            .all(|node| matches!(node.storage, Storage::Quantized { .. }))
    }
}
