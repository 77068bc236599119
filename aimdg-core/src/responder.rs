// aimdg-core/src/responder.rs
// ============================================================================
// Module: Adaptive Responder
// Description: Selects a mitigation strategy via UCB1 over a fixed set of
//              applicable actions, and folds outcome feedback back into the
//              per-strategy reward estimate.
// Purpose: Implement spec.md §4.6 exactly: the mitigation set, the UCB1
//          selection rule with its collateral-severity tie-break, and the
//          exponential-moving-average feedback update.
// Dependencies: crate::{decision, episode, pattern, policy}
// ============================================================================

//! ## Overview
//! The responder holds one reward cell per [`crate::decision::MitigationTag`],
//! each packed into a single `AtomicU64` as `(mean: f32 bits, count: u32)` so
//! the feedback update is a single compare-and-swap loop — matching spec.md
//! §5's "reward update uses compare-and-swap on a packed `(mean, count)`
//! word" concurrency rule without a lock. Selection itself
//! ([`AdaptiveResponder::select`]) only reads the cells; it never blocks.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use crate::decision::MitigationTag;
use crate::decision::ReasonCode;
use crate::decision::Verdict;
use crate::pattern::Severity;
use crate::policy::PolicyOutcome;

// ============================================================================
// SECTION: Findings
// ============================================================================

/// What the responder knows about a request when it is asked to pick a
/// mitigation: whatever the fast/deep paths and the policy stage found.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Findings {
    /// Whether any tier matched a threat pattern at all.
    pub threat_detected: bool,
    /// Highest severity among matched patterns, if any.
    pub highest_severity: Option<Severity>,
    /// Whether PII was detected in the prompt or context.
    pub pii_detected: bool,
    /// Combined confidence from the fast/deep paths, in `[0, 1]`.
    pub confidence: f32,
}

impl Findings {
    /// Returns the mitigation set applicable to these findings, in the §4.6
    /// collateral-severity order (ascending), before UCB1 scoring.
    ///
    /// `allow` is applicable whenever nothing was detected; the redaction
    /// and isolation strategies require their respective finding; `reject`
    /// and `escalate_to_human` are always applicable as the universal
    /// fallbacks spec.md's failure semantics rely on.
    #[must_use]
    pub fn applicable_strategies(&self) -> Vec<MitigationTag> {
        let mut out = Vec::new();
        if !self.threat_detected && !self.pii_detected {
            out.push(MitigationTag::Allow);
        }
        if self.threat_detected {
            out.push(MitigationTag::StripInstructions);
        }
        if self.pii_detected {
            out.push(MitigationTag::RedactPii);
        }
        if self.threat_detected || self.pii_detected {
            out.push(MitigationTag::ContextIsolate);
        }
        if self.threat_detected && self.confidence < 0.95 {
            out.push(MitigationTag::RewritePrompt);
        }
        out.push(MitigationTag::EscalateToHuman);
        out.push(MitigationTag::Reject);
        out.sort_by_key(MitigationTag::collateral_rank);
        out
    }
}

// ============================================================================
// SECTION: Reward Cell
// ============================================================================

/// A packed `(mean: f32, count: u32)` reward estimate, updated by CAS.
struct RewardCell(AtomicU64);

fn pack(mean: f32, count: u32) -> u64 {
    (u64::from(mean.to_bits()) << 32) | u64::from(count)
}

fn unpack(word: u64) -> (f32, u32) {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "intentional truncation to extract the packed 32-bit halves"
    )]
    let mean_bits = (word >> 32) as u32;
    #[allow(
        clippy::cast_possible_truncation,
        reason = "intentional truncation to extract the packed 32-bit halves"
    )]
    let count = word as u32;
    (f32::from_bits(mean_bits), count)
}

impl RewardCell {
    fn new() -> Self {
        Self(AtomicU64::new(pack(0.0, 0)))
    }

    fn load(&self) -> (f32, u32) {
        unpack(self.0.load(Ordering::Acquire))
    }

    /// Folds `effectiveness` into the mean via an EMA with `alpha = 0.1`
    /// (§4.6) and increments the visit count, retrying the CAS on
    /// contention.
    fn update(&self, effectiveness: f32) {
        const ALPHA: f32 = 0.1;
        loop {
            let current = self.0.load(Ordering::Acquire);
            let (mean, count) = unpack(current);
            let new_mean = if count == 0 {
                effectiveness
            } else {
                ALPHA.mul_add(effectiveness, (1.0 - ALPHA) * mean)
            };
            let new_word = pack(new_mean, count.saturating_add(1));
            if self
                .0
                .compare_exchange(current, new_word, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return;
            }
        }
    }
}

// ============================================================================
// SECTION: Adaptive Responder
// ============================================================================

/// Tuning parameters for selection (spec.md §4.6 defaults).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponderParams {
    /// UCB1 exploration constant `c`.
    pub ucb_c: f32,
}

impl Default for ResponderParams {
    fn default() -> Self {
        Self {
            ucb_c: std::f32::consts::SQRT_2,
        }
    }
}

/// Per-strategy reward statistics, plus the UCB1 selection rule.
pub struct AdaptiveResponder {
    allow: RewardCell,
    strip_instructions: RewardCell,
    redact_pii: RewardCell,
    context_isolate: RewardCell,
    rewrite_prompt: RewardCell,
    escalate_to_human: RewardCell,
    reject: RewardCell,
    params: ResponderParams,
}

impl AdaptiveResponder {
    /// Creates a responder with every strategy's statistics at `(0, 0)`.
    #[must_use]
    pub fn new(params: ResponderParams) -> Self {
        Self {
            allow: RewardCell::new(),
            strip_instructions: RewardCell::new(),
            redact_pii: RewardCell::new(),
            context_isolate: RewardCell::new(),
            rewrite_prompt: RewardCell::new(),
            escalate_to_human: RewardCell::new(),
            reject: RewardCell::new(),
            params,
        }
    }

    fn cell(&self, tag: MitigationTag) -> &RewardCell {
        match tag {
            MitigationTag::Allow => &self.allow,
            MitigationTag::StripInstructions => &self.strip_instructions,
            MitigationTag::RedactPii => &self.redact_pii,
            MitigationTag::ContextIsolate => &self.context_isolate,
            MitigationTag::RewritePrompt => &self.rewrite_prompt,
            MitigationTag::EscalateToHuman => &self.escalate_to_human,
            MitigationTag::Reject => &self.reject,
        }
    }

    /// Reads the current `(mean, visit count)` for `tag`.
    #[must_use]
    pub fn stats(&self, tag: MitigationTag) -> (f32, u32) {
        self.cell(tag).load()
    }

    /// Applies feedback for one past selection of `tag` (§4.6 feedback
    /// loop). `effectiveness` is clamped to `[0, 1]` before folding in.
    pub fn record_feedback(&self, tag: MitigationTag, effectiveness: f32) {
        self.cell(tag).update(effectiveness.clamp(0.0, 1.0));
    }

    /// Selects a mitigation for `findings` using UCB1 over the applicable
    /// strategies (§4.6 selection rule).
    ///
    /// Returns `None` if no strategy is applicable, which the caller must
    /// turn into `reject` with `ReasonCode::NoStrategy` per the failure
    /// semantics.
    #[must_use]
    pub fn select(&self, findings: &Findings) -> Option<MitigationTag> {
        let applicable = findings.applicable_strategies();
        if applicable.is_empty() {
            return None;
        }

        let stats: Vec<(MitigationTag, f32, u32)> = applicable
            .iter()
            .map(|&tag| {
                let (mean, count) = self.stats(tag);
                (tag, mean, count)
            })
            .collect();

        let total_visits: u32 = stats.iter().map(|(_, _, count)| count).sum();

        // An unvisited strategy has no empirical evidence: per UCB1's usual
        // treatment, it is tried first rather than scored (its bound would
        // be infinite). Ties among multiple unvisited strategies break by
        // ascending collateral rank, which `applicable` is already sorted by.
        if let Some((tag, _, _)) = stats.iter().find(|(_, _, count)| *count == 0) {
            return Some(*tag);
        }

        #[allow(
            clippy::cast_precision_loss,
            reason = "visit counts are bounded well below f32's exact-integer range in practice"
        )]
        let ln_total = (f64::from(total_visits)).ln();

        let mut best: Option<(MitigationTag, f64)> = None;
        for (tag, mean, count) in stats {
            #[allow(
                clippy::cast_precision_loss,
                reason = "visit counts are bounded well below f32's exact-integer range in practice"
            )]
            let bound = f64::from(mean)
                + f64::from(self.params.ucb_c) * (ln_total / f64::from(count)).sqrt();
            match best {
                None => best = Some((tag, bound)),
                Some((_, best_bound)) if bound > best_bound => best = Some((tag, bound)),
                _ => {}
            }
        }

        best.map(|(tag, _)| tag)
    }
}

impl Default for AdaptiveResponder {
    fn default() -> Self {
        Self::new(ResponderParams::default())
    }
}

// ============================================================================
// SECTION: Verdict Mapping
// ============================================================================

/// Maps a selected mitigation tag to the verdict it implies.
#[must_use]
pub const fn verdict_for_mitigation(tag: MitigationTag) -> Verdict {
    match tag {
        MitigationTag::Allow => Verdict::Allow,
        MitigationTag::StripInstructions
        | MitigationTag::RedactPii
        | MitigationTag::ContextIsolate
        | MitigationTag::RewritePrompt => Verdict::Sanitize,
        MitigationTag::EscalateToHuman => Verdict::Escalate,
        MitigationTag::Reject => Verdict::Reject,
    }
}

/// Runs the full tier-3 responder step given the policy outcomes and
/// detector findings: falls through from [`crate::policy::apply_tie_break`]
/// when every policy is valid, otherwise the policy tier's own verdict wins.
#[must_use]
pub fn respond(
    responder: &AdaptiveResponder,
    policy_outcomes: &[PolicyOutcome],
    findings: &Findings,
) -> (Verdict, Option<MitigationTag>, Option<ReasonCode>) {
    if let Some((verdict, reason)) = crate::policy::apply_tie_break(policy_outcomes) {
        return (verdict, None, Some(reason));
    }

    match responder.select(findings) {
        Some(tag) => (verdict_for_mitigation(tag), Some(tag), None),
        None => (Verdict::Reject, None, Some(ReasonCode::NoStrategy)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unvisited_strategy_is_tried_before_scoring() {
        let responder = AdaptiveResponder::default();
        let findings = Findings {
            threat_detected: true,
            highest_severity: Some(Severity::Medium),
            pii_detected: false,
            confidence: 0.8,
        };
        let selected = responder.select(&findings).expect("should select");
        // All strategies start unvisited; lowest collateral rank wins.
        assert_eq!(selected, MitigationTag::StripInstructions);
    }

    #[test]
    fn no_strategy_applicable_returns_none_only_when_empty() {
        let findings = Findings {
            threat_detected: false,
            highest_severity: None,
            pii_detected: false,
            confidence: 1.0,
        };
        // `allow`, `escalate_to_human`, `reject` are always present when no
        // finding disqualifies `allow`, so this is never empty in practice.
        assert!(!findings.applicable_strategies().is_empty());
    }

    #[test]
    fn feedback_updates_reward_via_ema() {
        let responder = AdaptiveResponder::default();
        responder.record_feedback(MitigationTag::RedactPii, 1.0);
        let (mean, count) = responder.stats(MitigationTag::RedactPii);
        assert!((mean - 1.0).abs() < f32::EPSILON);
        assert_eq!(count, 1);

        responder.record_feedback(MitigationTag::RedactPii, 0.0);
        let (mean, count) = responder.stats(MitigationTag::RedactPii);
        assert!((mean - 0.9).abs() < 1e-6);
        assert_eq!(count, 2);
    }

    #[test]
    fn preferring_visited_high_reward_strategy_over_unvisited_low_rank() {
        let responder = AdaptiveResponder::default();
        // Visit every candidate once so none is auto-selected as unvisited.
        for tag in [
            MitigationTag::StripInstructions,
            MitigationTag::ContextIsolate,
            MitigationTag::EscalateToHuman,
            MitigationTag::Reject,
        ] {
            responder.record_feedback(tag, 0.0);
        }
        responder.record_feedback(MitigationTag::StripInstructions, 1.0);

        let findings = Findings {
            threat_detected: true,
            highest_severity: Some(Severity::High),
            pii_detected: false,
            confidence: 0.96,
        };
        let selected = responder.select(&findings).expect("should select");
        assert_eq!(selected, MitigationTag::StripInstructions);
    }
}
