//! ITG reordering: a cube-pruned chart decoder for discriminative
//! source-side reordering.
//!
//! This crate provides:
//! - Hyperedges for the four productions of a bracketing ITG (forward and
//!   backward terminals, straight and inverted combinations) plus the root
//! - Feature generation over hyperedges with interned feature names
//! - A linear model scoring feature vectors
//! - A packed forest built bottom-up with cube-pruning beam search
//! - Rescoring, loss and feature accumulation over the best derivation
//! - Python bindings via PyO3 (`python` feature)

pub mod error;
pub mod feature;
pub mod hyper_edge;
pub mod hyper_graph;
pub mod hypothesis;
pub mod model;
pub mod queue;
pub mod sequence;
pub mod symbols;

#[cfg(feature = "python")]
mod python;


// Re-exports for convenience
pub use error::{ReorderError, Result};
pub use feature::{
    FeatureData, FeatureGenerator, FeaturePair, FeatureSet, FeatureVector, FeatureVectorString,
    UnknownFeaturePolicy,
};
pub use hyper_edge::{EdgeType, HyperEdge};
pub use hyper_graph::{ChartConfig, ChartStats, HyperGraph, HyperGraphBuilder};
pub use hypothesis::{Hypothesis, HypothesisKey, Score, SpanStack, TargetSpan, TargetSpanId};
pub use model::ReordererModel;
pub use queue::HypothesisQueue;
pub use sequence::{FeatureDataSequence, SequenceFeatureGen};
pub use symbols::{FeatureId, SymbolSet};
