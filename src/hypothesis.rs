//! Chart cell contents: hypotheses, target spans and span stacks.
//!
//! All `TargetSpan`s of a chart live in one arena owned by the `HyperGraph`.
//! Hypotheses refer to their children by `TargetSpanId`, never by pointer.

use crate::hyper_edge::{EdgeType, HyperEdge};
use ordered_float::OrderedFloat;

/// Index of a `TargetSpan` in its chart's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetSpanId(pub(crate) usize);

impl TargetSpanId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Lazily computed score of a hypothesis.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Score {
    #[default]
    Unscored,
    Scored(f64),
}

impl Score {
    pub fn value(self) -> Option<f64> {
        match self {
            Score::Unscored => None,
            Score::Scored(s) => Some(s),
        }
    }

    pub fn is_scored(self) -> bool {
        matches!(self, Score::Scored(_))
    }

    /// Total order used for ranking; unscored sorts below every real score.
    pub(crate) fn sort_key(self) -> OrderedFloat<f64> {
        OrderedFloat(self.value().unwrap_or(f64::NEG_INFINITY))
    }
}

/// Identity of a hypothesis within one cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HypothesisKey {
    pub trg_left: i32,
    pub trg_right: i32,
    pub edge_type: EdgeType,
    pub center: i32,
    pub left_rank: usize,
    pub right_rank: usize,
}

/// One derivation step over source span `[left, right]` producing target
/// span `[trg_left, trg_right]`.
///
/// `left_rank`/`right_rank` index the child cells' span stacks as they were
/// when this hypothesis was built; `left_child`/`right_child` are the
/// target spans found at those ranks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hypothesis {
    pub left: i32,
    pub right: i32,
    pub trg_left: i32,
    pub trg_right: i32,
    pub edge_type: EdgeType,
    pub center: i32,
    pub left_rank: usize,
    pub right_rank: usize,
    pub left_child: Option<TargetSpanId>,
    pub right_child: Option<TargetSpanId>,
    score: Score,
    loss: f64,
}

impl Hypothesis {
    /// A forward or backward terminal.
    pub fn terminal(
        score: f64,
        left: i32,
        right: i32,
        trg_left: i32,
        trg_right: i32,
        edge_type: EdgeType,
    ) -> Self {
        Hypothesis {
            left,
            right,
            trg_left,
            trg_right,
            edge_type,
            center: -1,
            left_rank: 0,
            right_rank: 0,
            left_child: None,
            right_child: None,
            score: Score::Scored(score),
            loss: 0.0,
        }
    }

    /// A straight or inverted combination of two child spans.
    #[allow(clippy::too_many_arguments)]
    pub fn binary(
        score: f64,
        left: i32,
        right: i32,
        trg_left: i32,
        trg_right: i32,
        edge_type: EdgeType,
        center: i32,
        left_rank: usize,
        right_rank: usize,
        left_child: TargetSpanId,
        right_child: TargetSpanId,
    ) -> Self {
        Hypothesis {
            left,
            right,
            trg_left,
            trg_right,
            edge_type,
            center,
            left_rank,
            right_rank,
            left_child: Some(left_child),
            right_child: Some(right_child),
            score: Score::Scored(score),
            loss: 0.0,
        }
    }

    /// The synthetic root over a sentence of `n` words, wrapping the
    /// top-cell span at `rank`.
    pub fn root(score: f64, n: i32, rank: usize, child: TargetSpanId) -> Self {
        Hypothesis {
            left: 0,
            right: n - 1,
            trg_left: 0,
            trg_right: n - 1,
            edge_type: EdgeType::Root,
            center: -1,
            left_rank: rank,
            right_rank: 0,
            left_child: Some(child),
            right_child: None,
            score: Score::Scored(score),
            loss: 0.0,
        }
    }

    pub fn score(&self) -> Score {
        self.score
    }

    pub fn set_score(&mut self, score: f64) {
        self.score = Score::Scored(score);
    }

    pub fn reset_score(&mut self) {
        self.score = Score::Unscored;
    }

    pub fn loss(&self) -> f64 {
        self.loss
    }

    pub(crate) fn set_loss(&mut self, loss: f64) {
        self.loss = loss;
    }

    /// The grammar production this hypothesis applies.
    pub fn edge(&self) -> HyperEdge {
        HyperEdge::new(self.left, self.center, self.right, self.edge_type)
    }

    pub fn key(&self) -> HypothesisKey {
        HypothesisKey {
            trg_left: self.trg_left,
            trg_right: self.trg_right,
            edge_type: self.edge_type,
            center: self.center,
            left_rank: self.left_rank,
            right_rank: self.right_rank,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.edge_type.is_terminal()
    }
}

/// All hypotheses of one cell that yield the same target span.
#[derive(Clone, Debug)]
pub struct TargetSpan {
    pub left: i32,
    pub right: i32,
    pub trg_left: i32,
    pub trg_right: i32,
    hyps: Vec<Hypothesis>,
}

impl TargetSpan {
    pub fn new(left: i32, right: i32, trg_left: i32, trg_right: i32) -> Self {
        TargetSpan {
            left,
            right,
            trg_left,
            trg_right,
            hyps: Vec::new(),
        }
    }

    pub fn add_hypothesis(&mut self, hyp: Hypothesis) {
        self.hyps.push(hyp);
    }

    pub fn hypotheses(&self) -> &[Hypothesis] {
        &self.hyps
    }

    pub(crate) fn hypotheses_mut(&mut self) -> &mut [Hypothesis] {
        &mut self.hyps
    }

    pub fn hypothesis(&self, rank: usize) -> Option<&Hypothesis> {
        self.hyps.get(rank)
    }

    /// Score of the rank-0 hypothesis.
    pub fn score(&self) -> Score {
        self.hyps.first().map_or(Score::Unscored, |h| h.score())
    }

    /// Stable sort, best first.
    pub(crate) fn sort_hypotheses(&mut self) {
        self.hyps.sort_by_key(|h| std::cmp::Reverse(h.score().sort_key()));
    }
}

/// One chart cell: ids of its target spans, best first once finished.
#[derive(Clone, Debug, Default)]
pub struct SpanStack {
    spans: Vec<TargetSpanId>,
}

impl SpanStack {
    pub fn new(spans: Vec<TargetSpanId>) -> Self {
        SpanStack { spans }
    }

    pub fn add_span(&mut self, id: TargetSpanId) {
        self.spans.push(id);
    }

    /// Target span at `rank`, if the cell has that many.
    pub fn get(&self, rank: usize) -> Option<TargetSpanId> {
        self.spans.get(rank).copied()
    }

    pub fn spans(&self) -> &[TargetSpanId] {
        &self.spans
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = TargetSpanId> + '_ {
        self.spans.iter().copied()
    }

    /// Stable sort, best first, using the arena to look up span scores.
    pub(crate) fn sort_by_score(&mut self, arena: &[TargetSpan]) {
        self.spans
            .sort_by_key(|id| std::cmp::Reverse(arena[id.0].score().sort_key()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_states() {
        let mut hyp = Hypothesis::terminal(1.5, 0, 1, 1, 0, EdgeType::Backward);
        assert_eq!(hyp.score(), Score::Scored(1.5));

        hyp.reset_score();
        assert_eq!(hyp.score(), Score::Unscored);
        assert!(!hyp.score().is_scored());

        // a legitimately very low score is still a score
        hyp.set_score(f64::MIN);
        assert_eq!(hyp.score().value(), Some(f64::MIN));
    }

    #[test]
    fn test_edge_and_key() {
        let hyp = Hypothesis::binary(
            0.0,
            0,
            3,
            2,
            1,
            EdgeType::Inverted,
            2,
            1,
            0,
            TargetSpanId(4),
            TargetSpanId(7),
        );
        assert_eq!(hyp.edge(), HyperEdge::new(0, 2, 3, EdgeType::Inverted));
        assert!(!hyp.is_terminal());

        let key = hyp.key();
        assert_eq!((key.left_rank, key.right_rank), (1, 0));
        assert_eq!((key.trg_left, key.trg_right), (2, 1));
    }

    #[test]
    fn test_target_span_sort_is_stable() {
        let mut span = TargetSpan::new(0, 1, 0, 1);
        span.add_hypothesis(Hypothesis::terminal(1.0, 0, 1, 0, 1, EdgeType::Forward));
        span.add_hypothesis(Hypothesis::terminal(3.0, 0, 1, 0, 1, EdgeType::Forward));
        span.add_hypothesis(Hypothesis::terminal(1.0, 0, 1, 0, 1, EdgeType::Backward));

        let mut unscored = Hypothesis::terminal(9.0, 0, 1, 0, 1, EdgeType::Backward);
        unscored.reset_score();
        span.add_hypothesis(unscored);

        span.sort_hypotheses();
        let order: Vec<_> = span
            .hypotheses()
            .iter()
            .map(|h| (h.score().value(), h.edge_type))
            .collect();
        assert_eq!(
            order,
            vec![
                (Some(3.0), EdgeType::Forward),
                (Some(1.0), EdgeType::Forward),
                (Some(1.0), EdgeType::Backward),
                (None, EdgeType::Backward),
            ]
        );
        assert_eq!(span.score(), Score::Scored(3.0));
    }

    #[test]
    fn test_span_stack_sort() {
        let mut arena = Vec::new();
        for score in [0.5, 2.0, 0.5] {
            let mut span = TargetSpan::new(0, 0, 0, 0);
            span.add_hypothesis(Hypothesis::terminal(score, 0, 0, 0, 0, EdgeType::Forward));
            arena.push(span);
        }
        let mut stack = SpanStack::new(vec![TargetSpanId(0), TargetSpanId(1), TargetSpanId(2)]);
        stack.sort_by_score(&arena);

        assert_eq!(
            stack.spans(),
            &[TargetSpanId(1), TargetSpanId(0), TargetSpanId(2)]
        );
        assert_eq!(stack.get(3), None);
    }
}
