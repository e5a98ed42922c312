//! Best-first agenda for expanding one chart cell.

use crate::hypothesis::{Hypothesis, HypothesisKey};
use ordered_float::OrderedFloat;
use priority_queue::PriorityQueue;
use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Reverse;

/// Score first, then earlier insertion first.
type Priority = (OrderedFloat<f64>, Reverse<u64>);

/// Max-priority queue of hypotheses for one cell.
///
/// Each hypothesis identity is admitted once: cube-pruning reaches the same
/// `(left_rank, right_rank)` corner from both of its lattice predecessors,
/// and the second arrival is dropped whether the first is still queued or
/// already popped.
#[derive(Debug)]
pub struct HypothesisQueue {
    agenda: PriorityQueue<HypothesisKey, Priority>,
    pending: FxHashMap<HypothesisKey, Hypothesis>,
    seen: FxHashSet<HypothesisKey>,
    next_seq: u64,
    duplicates: usize,
}

impl Default for HypothesisQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl HypothesisQueue {
    pub fn new() -> Self {
        HypothesisQueue {
            agenda: PriorityQueue::new(),
            pending: FxHashMap::default(),
            seen: FxHashSet::default(),
            next_seq: 0,
            duplicates: 0,
        }
    }

    /// Queue a hypothesis. Returns false if an identical one was already
    /// admitted.
    pub fn push(&mut self, hyp: Hypothesis) -> bool {
        let key = hyp.key();
        if !self.seen.insert(key) {
            self.duplicates += 1;
            return false;
        }
        let priority = (hyp.score().sort_key(), Reverse(self.next_seq));
        self.next_seq += 1;
        self.pending.insert(key, hyp);
        self.agenda.push(key, priority);
        true
    }

    /// Remove and return the best hypothesis.
    pub fn pop(&mut self) -> Option<Hypothesis> {
        let (key, _) = self.agenda.pop()?;
        self.pending.remove(&key)
    }

    /// Score of the best queued hypothesis.
    pub fn peek_score(&self) -> Option<f64> {
        self.agenda.peek().map(|(_, p)| p.0.into_inner())
    }

    pub fn len(&self) -> usize {
        self.agenda.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agenda.is_empty()
    }

    /// How many pushes were rejected as duplicates.
    pub fn duplicates_skipped(&self) -> usize {
        self.duplicates
    }
}
