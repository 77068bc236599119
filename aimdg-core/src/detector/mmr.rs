// aimdg-core/src/detector/mmr.rs
// ============================================================================
// Module: MMR Diversification
// Description: Maximal-marginal-relevance re-ranking of vector-similarity
//              candidates.
// Purpose: Implement spec.md §4.2 step (c)'s re-rank: favor coverage over
//          duplicate matches among the retained vector candidates.
// Dependencies: crate::{ids, store::vector_index}
// ============================================================================

//! ## Overview
//! Greedy MMR: start from the highest-similarity candidate, then repeatedly
//! pick whichever remaining candidate maximizes `λ·sim(query, p) −
//! (1−λ)·max_chosen sim(p, chosen)`, until candidates are exhausted. `λ = 1`
//! degenerates to plain similarity ranking; `λ = 0` degenerates to pure
//! diversity (farthest-first).

use crate::ids::PatternId;
use crate::store::vector_index::cosine_similarity;

/// Re-ranks `candidates` (pattern id, query similarity) by MMR, using
/// `embeddings` to score pairwise similarity between already-chosen
/// candidates and the remaining pool. Candidates absent from `embeddings`
/// (e.g. a pattern removed between the store query and this call) are kept
/// at the end in their original order, since no diversity score can be
/// computed for them.
#[must_use]
pub fn mmr_select(
    _query: &[f32],
    candidates: &[(PatternId, f32)],
    embeddings: &[(PatternId, Vec<f32>)],
    lambda: f32,
) -> Vec<(PatternId, f32)> {
    let lookup = |id: PatternId| embeddings.iter().find(|(pid, _)| *pid == id).map(|(_, v)| v.as_slice());

    let mut pool: Vec<(PatternId, f32)> = candidates.to_vec();
    pool.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut chosen: Vec<(PatternId, f32)> = Vec::with_capacity(pool.len());
    let mut remaining: Vec<(PatternId, f32)> = Vec::new();
    let mut unscored: Vec<(PatternId, f32)> = Vec::new();

    for entry in pool.drain(..) {
        if lookup(entry.0).is_some() {
            remaining.push(entry);
        } else {
            unscored.push(entry);
        }
    }

    while !remaining.is_empty() {
        let mut best_index = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (index, (pattern_id, similarity)) in remaining.iter().enumerate() {
            let diversity_penalty = chosen
                .iter()
                .filter_map(|(chosen_id, _)| {
                    let a = lookup(*pattern_id)?;
                    let b = lookup(*chosen_id)?;
                    Some(cosine_similarity(a, b))
                })
                .fold(0.0_f32, f32::max);

            let score = lambda * similarity - (1.0 - lambda) * diversity_penalty;
            if score > best_score {
                best_score = score;
                best_index = index;
            }
        }

        chosen.push(remaining.remove(best_index));
    }

    chosen.extend(unscored);
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_candidates_are_penalized_after_the_first() {
        let query = vec![1.0, 0.0];
        let candidates = vec![
            (PatternId::from_raw(1), 0.99),
            (PatternId::from_raw(2), 0.98),
        ];
        let embeddings = vec![
            (PatternId::from_raw(1), vec![1.0, 0.0]),
            (PatternId::from_raw(2), vec![1.0, 0.0]),
        ];

        let selected = mmr_select(&query, &candidates, &embeddings, 0.5);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].0, PatternId::from_raw(1));
    }

    #[test]
    fn unscored_candidates_are_appended_in_original_order() {
        let query = vec![1.0, 0.0];
        let candidates = vec![(PatternId::from_raw(7), 0.9)];
        let selected = mmr_select(&query, &candidates, &[], 0.5);
        assert_eq!(selected, vec![(PatternId::from_raw(7), 0.9)]);
    }
}
