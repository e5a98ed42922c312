//! Packed forest of reordering derivations.
//!
//! The chart is filled bottom-up: every cell `(l, r)` is expanded with
//! cube-pruning beam search over the already finished cells it splits into,
//! then a root cell wraps each alternative of the top cell `(0, n-1)`.
//! Scoring, loss and feature aggregation run as separate recursive passes
//! over the finished forest, following explicit ranks.

use crate::error::{ReorderError, Result};
use crate::feature::{FeatureGenerator, FeatureSet, FeatureVector};
use crate::hyper_edge::{EdgeType, HyperEdge};
use crate::hypothesis::{Hypothesis, Score, SpanStack, TargetSpan, TargetSpanId};
use crate::model::ReordererModel;
use crate::queue::HypothesisQueue;
use crate::symbols::FeatureId;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Enter a tracing span for a chart stage (when the `tracing` feature is
/// enabled). A no-op otherwise.
macro_rules! trace_stage {
    ($name:expr) => {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("chart_stage", stage = $name).entered();
    };
}

/// Configuration for chart construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartConfig {
    /// Hypotheses accepted per cell (0 = unlimited).
    pub beam_size: usize,
}

impl Default for ChartConfig {
    fn default() -> Self {
        ChartConfig { beam_size: 0 }
    }
}

/// Statistics about the last build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChartStats {
    pub cells: usize,
    pub target_spans: usize,
    pub hypotheses: usize,
    pub queue_pops: usize,
    pub duplicates_skipped: usize,
    pub feature_cache_hits: usize,
    pub feature_cache_misses: usize,
}

type EdgeFeatureMap = FxHashMap<HyperEdge, Rc<FeatureVector>>;

/// The chart: span stacks for every source span, the root stack, the arena
/// holding every target span, and the per-edge feature cache.
#[derive(Debug, Default)]
pub struct HyperGraph {
    config: ChartConfig,
    /// Sentence length of the current chart (0 = not built).
    n: usize,
    /// Cell `(l, r)` lives at `r * (r + 1) / 2 + l`.
    stacks: Vec<SpanStack>,
    root: Option<SpanStack>,
    spans: Vec<TargetSpan>,
    features: EdgeFeatureMap,
    stats: ChartStats,
}

impl HyperGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ChartConfig) -> Self {
        HyperGraph {
            config,
            ..Self::default()
        }
    }

    pub fn with_beam_size(beam_size: usize) -> Self {
        Self::with_config(ChartConfig { beam_size })
    }

    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    pub fn stats(&self) -> &ChartStats {
        &self.stats
    }

    pub fn num_words(&self) -> usize {
        self.n
    }

    pub fn is_built(&self) -> bool {
        self.root.is_some()
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    fn cell_index(&self, l: i32, r: i32) -> Option<usize> {
        if l < 0 || l > r || r as usize >= self.n {
            return None;
        }
        let (l, r) = (l as usize, r as usize);
        Some(r * (r + 1) / 2 + l)
    }

    /// The finished stack of source span `[l, r]`.
    pub fn stack(&self, l: i32, r: i32) -> Result<&SpanStack> {
        if self.n == 0 {
            return Err(ReorderError::NotBuilt);
        }
        let idx = self.cell_index(l, r).ok_or(ReorderError::SpanOutOfRange {
            left: l,
            right: r,
            len: self.n,
        })?;
        Ok(&self.stacks[idx])
    }

    pub fn root_stack(&self) -> Result<&SpanStack> {
        self.root.as_ref().ok_or(ReorderError::NotBuilt)
    }

    /// The target span `id` of this chart.
    ///
    /// Ids are only meaningful for the build that produced them; rebuilding
    /// the chart reuses the same indices for different spans.
    ///
    /// # Panics
    ///
    /// Panics if `id` is past the end of the arena. See `get_target_span`
    /// for a checked lookup.
    pub fn target_span(&self, id: TargetSpanId) -> &TargetSpan {
        &self.spans[id.index()]
    }

    pub fn get_target_span(&self, id: TargetSpanId) -> Option<&TargetSpan> {
        self.spans.get(id.index())
    }

    /// Every target span in the arena, root spans included.
    pub fn target_spans(&self) -> impl Iterator<Item = (TargetSpanId, &TargetSpan)> {
        self.spans
            .iter()
            .enumerate()
            .map(|(i, span)| (TargetSpanId(i), span))
    }

    /// The cached feature vector of `edge`, if it was generated.
    pub fn cached_features(&self, edge: &HyperEdge) -> Option<&FeatureVector> {
        self.features.get(edge).map(|v| &**v)
    }

    /// The best root span.
    pub fn best_root(&self) -> Result<TargetSpanId> {
        self.root_stack()?.get(0).ok_or(ReorderError::NotBuilt)
    }

    /// Score of the best root span.
    pub fn best_score(&self) -> Result<f64> {
        let best = self.best_root()?;
        self.target_span(best)
            .score()
            .value()
            .ok_or(ReorderError::NotBuilt)
    }

    /// Target span of rank `rank` in cell `(l, r)`.
    fn get_trg_span(&self, l: i32, r: i32, rank: usize) -> Option<TargetSpanId> {
        let idx = self.cell_index(l, r)?;
        self.stacks[idx].get(rank)
    }

    fn span_score(&self, id: TargetSpanId) -> f64 {
        self.spans[id.index()].score().sort_key().into_inner()
    }

    fn add_target_span(&mut self, span: TargetSpan) -> TargetSpanId {
        self.spans.push(span);
        TargetSpanId(self.spans.len() - 1)
    }

    fn reset(&mut self, n: usize) {
        self.n = n;
        self.stacks = vec![SpanStack::default(); n * (n + 1) / 2];
        self.root = None;
        self.spans.clear();
        self.features.clear();
        self.stats = ChartStats::default();
    }

    // ------------------------------------------------------------------
    // Features
    // ------------------------------------------------------------------

    /// Features of `edge`, generated on first request and cached after.
    pub fn edge_features<G: FeatureGenerator>(
        &mut self,
        features: &mut FeatureSet<G>,
        sent: &[G::Data],
        edge: &HyperEdge,
    ) -> Result<Rc<FeatureVector>> {
        if let Some(vec) = self.features.get(edge) {
            self.stats.feature_cache_hits += 1;
            return Ok(Rc::clone(vec));
        }
        let vec = Rc::new(features.make_edge_features(sent, edge)?);
        self.stats.feature_cache_misses += 1;
        self.features.insert(*edge, Rc::clone(&vec));
        Ok(vec)
    }

    /// Model score of a single edge.
    pub fn edge_score<G: FeatureGenerator>(
        &mut self,
        model: &ReordererModel,
        features: &mut FeatureSet<G>,
        sent: &[G::Data],
        edge: &HyperEdge,
    ) -> Result<f64> {
        let vec = self.edge_features(features, sent, edge)?;
        Ok(model.score_feature_vector(&vec))
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Build the forest for `sent` and return the best root score.
    ///
    /// Any previous chart is discarded. If a cell fails, the chart is left
    /// empty.
    pub fn build<G: FeatureGenerator>(
        &mut self,
        model: &ReordererModel,
        features: &mut FeatureSet<G>,
        sent: &[G::Data],
    ) -> Result<f64> {
        trace_stage!("build");
        let n = features.validate_sentence(sent)?;
        self.reset(n);
        if let Err(e) = self.fill_chart(model, features, sent) {
            self.reset(0);
            return Err(e);
        }
        self.best_score()
    }

    fn fill_chart<G: FeatureGenerator>(
        &mut self,
        model: &ReordererModel,
        features: &mut FeatureSet<G>,
        sent: &[G::Data],
    ) -> Result<()> {
        let n = self.n as i32;
        for r in 0..n {
            for l in (0..=r).rev() {
                let stack = self.process_one_span(model, features, sent, l, r)?;
                if let Some(idx) = self.cell_index(l, r) {
                    self.stacks[idx] = stack;
                }
            }
        }

        let top = self.stack(0, n - 1)?.clone();
        let mut root = SpanStack::default();
        for (rank, child) in top.iter().enumerate() {
            let score = self.span_score(child);
            let c = self.target_span(child);
            let mut span = TargetSpan::new(0, n - 1, c.trg_left, c.trg_right);
            span.add_hypothesis(Hypothesis::root(score, n, rank, child));
            root.add_span(self.add_target_span(span));
        }
        self.root = Some(root);
        Ok(())
    }

    /// Expand cell `(l, r)` with cube pruning and return its finished stack.
    fn process_one_span<G: FeatureGenerator>(
        &mut self,
        model: &ReordererModel,
        features: &mut FeatureSet<G>,
        sent: &[G::Data],
        l: i32,
        r: i32,
    ) -> Result<SpanStack> {
        let mut q = HypothesisQueue::new();

        // Terminals, if the span is short enough
        let max_term = features.max_term();
        if max_term == 0 || ((r - l) as usize) < max_term {
            let edge = HyperEdge::terminal(l, r, EdgeType::Forward);
            let score = self.edge_score(model, features, sent, &edge)?;
            q.push(Hypothesis::terminal(score, l, r, l, r, EdgeType::Forward));

            let edge = HyperEdge::terminal(l, r, EdgeType::Backward);
            let score = self.edge_score(model, features, sent, &edge)?;
            q.push(Hypothesis::terminal(score, l, r, r, l, EdgeType::Backward));
        }

        // Best straight and inverted combination for every split point
        for c in (l + 1)..=r {
            let (Some(left_id), Some(right_id)) =
                (self.get_trg_span(l, c - 1, 0), self.get_trg_span(c, r, 0))
            else {
                continue;
            };
            let children = self.span_score(left_id) + self.span_score(right_id);
            let (left_trg, right_trg) = (self.target_span(left_id), self.target_span(right_id));
            let (ll, lr) = (left_trg.trg_left, left_trg.trg_right);
            let (rl, rr) = (right_trg.trg_left, right_trg.trg_right);

            let edge = HyperEdge::new(l, c, r, EdgeType::Straight);
            let score = children + self.edge_score(model, features, sent, &edge)?;
            q.push(Hypothesis::binary(
                score,
                l,
                r,
                ll,
                rr,
                EdgeType::Straight,
                c,
                0,
                0,
                left_id,
                right_id,
            ));

            let edge = HyperEdge::new(l, c, r, EdgeType::Inverted);
            let score = children + self.edge_score(model, features, sent, &edge)?;
            q.push(Hypothesis::binary(
                score,
                l,
                r,
                rl,
                lr,
                EdgeType::Inverted,
                c,
                0,
                0,
                left_id,
                right_id,
            ));
        }

        let beam_size = self.config.beam_size;
        let mut by_target: FxHashMap<(i32, i32), TargetSpanId> = FxHashMap::default();
        let mut created: Vec<TargetSpanId> = Vec::new();
        let mut num_processed = 0;
        while beam_size == 0 || num_processed < beam_size {
            let Some(hyp) = q.pop() else { break };
            self.stats.queue_pops += 1;

            let trg_idx = (hyp.trg_left, hyp.trg_right);
            let id = match by_target.get(&trg_idx) {
                Some(&id) => id,
                None => {
                    let id = self.add_target_span(TargetSpan::new(l, r, trg_idx.0, trg_idx.1));
                    by_target.insert(trg_idx, id);
                    created.push(id);
                    id
                }
            };
            self.spans[id.index()].add_hypothesis(hyp);
            num_processed += 1;

            if hyp.is_terminal() {
                continue;
            }
            let score = hyp.score().sort_key().into_inner();

            // Move one rank down on the left side
            if let (Some(old), Some(new)) = (
                hyp.left_child,
                self.get_trg_span(l, hyp.center - 1, hyp.left_rank + 1),
            ) {
                let mut next = hyp;
                next.set_score(score - self.span_score(old) + self.span_score(new));
                next.left_rank += 1;
                next.left_child = Some(new);
                let new_trg = self.target_span(new);
                if hyp.edge_type == EdgeType::Straight {
                    next.trg_left = new_trg.trg_left;
                } else {
                    next.trg_right = new_trg.trg_right;
                }
                q.push(next);
            }

            // Move one rank down on the right side
            if let (Some(old), Some(new)) = (
                hyp.right_child,
                self.get_trg_span(hyp.center, r, hyp.right_rank + 1),
            ) {
                let mut next = hyp;
                next.set_score(score - self.span_score(old) + self.span_score(new));
                next.right_rank += 1;
                next.right_child = Some(new);
                let new_trg = self.target_span(new);
                if hyp.edge_type == EdgeType::Straight {
                    next.trg_right = new_trg.trg_right;
                } else {
                    next.trg_left = new_trg.trg_left;
                }
                q.push(next);
            }
        }

        for &id in &created {
            self.spans[id.index()].sort_hypotheses();
        }
        let mut stack = SpanStack::new(created);
        stack.sort_by_score(&self.spans);

        self.stats.cells += 1;
        self.stats.target_spans += stack.len();
        self.stats.hypotheses += num_processed;
        self.stats.duplicates_skipped += q.duplicates_skipped();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            l,
            r,
            target_spans = stack.len(),
            accepted = num_processed,
            "processed span"
        );

        Ok(stack)
    }

    // ------------------------------------------------------------------
    // Scoring
    // ------------------------------------------------------------------

    /// Score of a target span: the best of its hypotheses. If the span is
    /// unscored, every hypothesis is scored and the list re-sorted.
    pub fn score_span(
        &mut self,
        model: &ReordererModel,
        loss_multiplier: f64,
        id: TargetSpanId,
    ) -> Result<f64> {
        let span = self
            .get_target_span(id)
            .ok_or(ReorderError::InvalidHypothesis {
                span: id.index(),
                rank: 0,
            })?;
        if let Score::Scored(score) = span.score() {
            return Ok(score);
        }
        let mut max_score = f64::NEG_INFINITY;
        for rank in 0..span.hypotheses().len() {
            max_score = max_score.max(self.score_hypothesis(model, loss_multiplier, id, rank)?);
        }
        self.spans[id.index()].sort_hypotheses();
        Ok(max_score)
    }

    /// Score of the hypothesis at position `rank` of span `id`:
    /// `loss * loss_multiplier + edge score + child span scores`. An id or
    /// rank outside the chart is `InvalidHypothesis`.
    pub fn score_hypothesis(
        &mut self,
        model: &ReordererModel,
        loss_multiplier: f64,
        id: TargetSpanId,
        rank: usize,
    ) -> Result<f64> {
        let hyp = self
            .get_target_span(id)
            .and_then(|span| span.hypothesis(rank))
            .copied()
            .ok_or(ReorderError::InvalidHypothesis {
                span: id.index(),
                rank,
            })?;
        if let Score::Scored(score) = hyp.score() {
            return Ok(score);
        }

        let mut score = hyp.loss() * loss_multiplier;
        if hyp.edge_type != EdgeType::Root {
            let edge = hyp.edge();
            let vec = self
                .features
                .get(&edge)
                .ok_or_else(|| missing_features(&edge))?;
            score += model.score_feature_vector(vec);
        }
        if let Some(child) = hyp.left_child {
            score += self.score_span(model, loss_multiplier, child)?;
        }
        if let Some(child) = hyp.right_child {
            score += self.score_span(model, loss_multiplier, child)?;
        }

        self.spans[id.index()].hypotheses_mut()[rank].set_score(score);
        Ok(score)
    }

    /// Recompute every score in the forest under `model`, re-sort every
    /// stack, and return the best root score.
    pub fn rescore(&mut self, model: &ReordererModel, loss_multiplier: f64) -> Result<f64> {
        trace_stage!("rescore");
        let root: Vec<TargetSpanId> = self.root_stack()?.spans().to_vec();

        for span in &mut self.spans {
            for hyp in span.hypotheses_mut() {
                hyp.reset_score();
            }
        }

        for id in root {
            self.score_span(model, loss_multiplier, id)?;
        }
        // Spans no longer reachable from the root still get a consistent score
        for idx in 0..self.stacks.len() {
            let ids: Vec<TargetSpanId> = self.stacks[idx].spans().to_vec();
            for id in ids {
                self.score_span(model, loss_multiplier, id)?;
            }
        }

        let spans = &self.spans;
        for stack in &mut self.stacks {
            stack.sort_by_score(spans);
        }
        if let Some(root) = self.root.as_mut() {
            root.sort_by_score(spans);
        }

        self.best_score()
    }

    /// Set the loss of every non-root hypothesis. Scores are left as they
    /// are; call `rescore` to fold the new losses in.
    ///
    /// All losses are computed before any is stored, so on `NegativeLoss`
    /// the chart is unchanged.
    pub fn assign_losses<F>(&mut self, mut loss_fn: F) -> Result<()>
    where
        F: FnMut(&Hypothesis) -> f64,
    {
        let mut losses = Vec::new();
        for span in &self.spans {
            for hyp in span.hypotheses() {
                if hyp.edge_type == EdgeType::Root {
                    continue;
                }
                let loss = loss_fn(hyp);
                if !(loss >= 0.0) {
                    return Err(ReorderError::NegativeLoss(loss));
                }
                losses.push(loss);
            }
        }

        let mut losses = losses.into_iter();
        for span in &mut self.spans {
            for hyp in span.hypotheses_mut() {
                if hyp.edge_type == EdgeType::Root {
                    continue;
                }
                if let Some(loss) = losses.next() {
                    hyp.set_loss(loss);
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Aggregation over the best derivation
    // ------------------------------------------------------------------

    /// Sum of losses along the rank-0 derivation under `id`.
    pub fn accumulate_loss(&self, id: TargetSpanId) -> f64 {
        let Some(hyp) = self.target_span(id).hypothesis(0) else {
            return 0.0;
        };
        let mut loss = hyp.loss();
        if let Some(child) = hyp.left_child {
            loss += self.accumulate_loss(child);
        }
        if let Some(child) = hyp.right_child {
            loss += self.accumulate_loss(child);
        }
        loss
    }

    /// Sum of feature vectors along the rank-0 derivation under `id`.
    pub fn accumulate_features(&self, id: TargetSpanId) -> Result<FeatureVector> {
        let mut feat_map = BTreeMap::new();
        self.accumulate_features_into(id, &mut feat_map)?;
        Ok(feat_map.into_iter().collect())
    }

    fn accumulate_features_into(
        &self,
        id: TargetSpanId,
        feat_map: &mut BTreeMap<FeatureId, f64>,
    ) -> Result<()> {
        let Some(hyp) = self.target_span(id).hypothesis(0) else {
            return Ok(());
        };
        if hyp.edge_type != EdgeType::Root {
            let edge = hyp.edge();
            let vec = self
                .features
                .get(&edge)
                .ok_or_else(|| missing_features(&edge))?;
            for &(feat, value) in vec.iter() {
                *feat_map.entry(feat).or_insert(0.0) += value;
            }
        }
        if let Some(child) = hyp.left_child {
            self.accumulate_features_into(child, feat_map)?;
        }
        if let Some(child) = hyp.right_child {
            self.accumulate_features_into(child, feat_map)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Readout
    // ------------------------------------------------------------------

    /// Source positions in target order for the rank-0 derivation under `id`.
    pub fn reordering(&self, id: TargetSpanId) -> Vec<usize> {
        let mut order = Vec::new();
        self.push_reordering(id, &mut order);
        order
    }

    /// Source positions in target order for the best derivation.
    pub fn best_reordering(&self) -> Result<Vec<usize>> {
        Ok(self.reordering(self.best_root()?))
    }

    fn push_reordering(&self, id: TargetSpanId, order: &mut Vec<usize>) {
        let Some(hyp) = self.target_span(id).hypothesis(0) else {
            return;
        };
        let (l, r) = (hyp.left as usize, hyp.right as usize);
        match (hyp.edge_type, hyp.left_child, hyp.right_child) {
            (EdgeType::Forward, _, _) => order.extend(l..=r),
            (EdgeType::Backward, _, _) => order.extend((l..=r).rev()),
            (EdgeType::Straight, Some(left), Some(right)) => {
                self.push_reordering(left, order);
                self.push_reordering(right, order);
            }
            (EdgeType::Inverted, Some(left), Some(right)) => {
                self.push_reordering(right, order);
                self.push_reordering(left, order);
            }
            (EdgeType::Root, Some(child), _) => self.push_reordering(child, order),
            _ => {}
        }
    }

    /// Bracketed rendering of the rank-0 derivation under `id`: `[..]` for
    /// straight, `<..>` for inverted, `(F ..)`/`(B ..)` for terminals, words
    /// always in source order. `words` must have one entry per source word.
    pub fn parse_string<S: AsRef<str>>(&self, id: TargetSpanId, words: &[S]) -> Result<String> {
        if words.len() != self.n {
            return Err(ReorderError::MismatchedSentence {
                expected: self.n,
                found: words.len(),
            });
        }
        let mut out = String::new();
        self.push_parse(id, words, &mut out);
        Ok(out)
    }

    fn push_parse<S: AsRef<str>>(&self, id: TargetSpanId, words: &[S], out: &mut String) {
        let Some(hyp) = self.target_span(id).hypothesis(0) else {
            return;
        };
        match (hyp.edge_type, hyp.left_child, hyp.right_child) {
            (EdgeType::Forward | EdgeType::Backward, _, _) => {
                out.push('(');
                out.push(hyp.edge_type.as_char());
                for word in &words[hyp.left as usize..=hyp.right as usize] {
                    out.push(' ');
                    out.push_str(word.as_ref());
                }
                out.push(')');
            }
            (EdgeType::Straight | EdgeType::Inverted, Some(left), Some(right)) => {
                let (open, close) = if hyp.edge_type == EdgeType::Straight {
                    ('[', ']')
                } else {
                    ('<', '>')
                };
                out.push(open);
                self.push_parse(left, words, out);
                out.push(' ');
                self.push_parse(right, words, out);
                out.push(close);
            }
            (EdgeType::Root, Some(child), _) => self.push_parse(child, words, out),
            _ => {}
        }
    }
}

/// Builder for a `HyperGraph`.
#[derive(Debug, Default)]
pub struct HyperGraphBuilder {
    config: ChartConfig,
}

impl HyperGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: ChartConfig) -> Self {
        self.config = config;
        self
    }

    pub fn beam_size(mut self, k: usize) -> Self {
        self.config.beam_size = k;
        self
    }

    pub fn build(self) -> HyperGraph {
        HyperGraph::with_config(self.config)
    }
}

fn missing_features(edge: &HyperEdge) -> ReorderError {
    ReorderError::MissingEdgeFeatures {
        left: edge.left,
        center: edge.center,
        right: edge.right,
        edge_type: edge.edge_type,
    }
}
