//! Error types shared by the feature, model and chart layers.

use crate::hyper_edge::EdgeType;
use thiserror::Error;

/// Errors that can occur while generating features or decoding a sentence.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReorderError {
    /// An edge that construction should have cached has no feature vector.
    /// This is an internal consistency failure and aborts the decode.
    #[error("no features found for edge l={left}, c={center}, r={right}, t={edge_type}")]
    MissingEdgeFeatures {
        left: i32,
        center: i32,
        right: i32,
        edge_type: EdgeType,
    },
    #[error("unknown feature name in frozen feature set: {0}")]
    UnknownFeature(String),
    #[error("feature id {0} was never assigned")]
    UnknownFeatureId(u32),
    #[error("cannot decode an empty sentence")]
    EmptySentence,
    #[error("sentence data mismatch: expected {expected}, found {found}")]
    MismatchedSentence { expected: usize, found: usize },
    #[error("span [{left}, {right}] is out of range for sentence of length {len}")]
    SpanOutOfRange { left: i32, right: i32, len: usize },
    #[error("no hypothesis at rank {rank} of target span {span}")]
    InvalidHypothesis { span: usize, rank: usize },
    #[error("hypothesis loss must be non-negative, got {0}")]
    NegativeLoss(f64),
    #[error("hypergraph has not been built")]
    NotBuilt,
}

/// Result type for reordering operations.
pub type Result<T> = std::result::Result<T, ReorderError>;
