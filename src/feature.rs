//! Feature generation over hyperedges.
//!
//! A `FeatureSet` pairs one `FeatureGenerator` with each column of per-token
//! data in a sentence, collects the string-named features every generator
//! emits for an edge, and converts them into a sorted, id-indexed
//! `FeatureVector` through its own `SymbolSet`.

use crate::error::{ReorderError, Result};
use crate::hyper_edge::{EdgeType, HyperEdge};
use crate::symbols::{FeatureId, SymbolSet};

/// A single `(id, value)` feature.
pub type FeaturePair = (FeatureId, f64);

/// Integer-indexed feature vector, ids unique and ascending.
pub type FeatureVector = Vec<FeaturePair>;

/// String-named features as produced by a generator.
pub type FeatureVectorString = Vec<(String, f64)>;

/// Per-token data consumed by one generator.
pub trait FeatureData {
    /// Number of source tokens this data covers.
    fn num_words(&self) -> usize;
}

/// Produces named features for the productions of the reordering grammar.
///
/// Terminal edges (forward and backward) are described by the span they
/// cover; binary edges (straight and inverted) by how they combine the two
/// sub-spans on either side of `edge.center`.
pub trait FeatureGenerator {
    type Data: FeatureData;

    fn generate_span_features(&self, data: &Self::Data, edge: &HyperEdge) -> FeatureVectorString;

    fn generate_combination_features(
        &self,
        data: &Self::Data,
        edge: &HyperEdge,
    ) -> FeatureVectorString;
}

/// What to do with a feature name that is not in a frozen symbol table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnknownFeaturePolicy {
    /// Drop the feature from the vector.
    #[default]
    Skip,
    /// Fail the decode with `ReorderError::UnknownFeature`.
    Fail,
}

/// A set of generators plus the feature-name table they share.
#[derive(Debug, Clone)]
pub struct FeatureSet<G> {
    generators: Vec<G>,
    symbols: SymbolSet,
    /// Longest span allowed to be a terminal (0 = unlimited).
    max_term: usize,
    frozen: bool,
    unknown_policy: UnknownFeaturePolicy,
}

impl<G> Default for FeatureSet<G> {
    fn default() -> Self {
        FeatureSet {
            generators: Vec::new(),
            symbols: SymbolSet::new(),
            max_term: 0,
            frozen: false,
            unknown_policy: UnknownFeaturePolicy::default(),
        }
    }
}

impl<G: FeatureGenerator> FeatureSet<G> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style variant of `add_generator`.
    pub fn with_generator(mut self, gen: G) -> Self {
        self.add_generator(gen);
        self
    }

    /// Add a generator. It reads the sentence data column at the same index.
    pub fn add_generator(&mut self, gen: G) {
        self.generators.push(gen);
    }

    pub fn generators(&self) -> &[G] {
        &self.generators
    }

    pub fn max_term(&self) -> usize {
        self.max_term
    }

    pub fn with_max_term(mut self, max_term: usize) -> Self {
        self.max_term = max_term;
        self
    }

    /// Stop assigning ids to unseen feature names.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn set_unknown_policy(&mut self, policy: UnknownFeaturePolicy) {
        self.unknown_policy = policy;
    }

    pub fn symbols(&self) -> &SymbolSet {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut SymbolSet {
        &mut self.symbols
    }

    /// Check that the sentence has one data column per generator and that
    /// all columns agree on the number of words. Returns that number.
    pub fn validate_sentence(&self, sent: &[G::Data]) -> Result<usize> {
        if sent.len() != self.generators.len() {
            return Err(ReorderError::MismatchedSentence {
                expected: self.generators.len(),
                found: sent.len(),
            });
        }
        let n = sent.first().map_or(0, |d| d.num_words());
        if n == 0 {
            return Err(ReorderError::EmptySentence);
        }
        for data in &sent[1..] {
            if data.num_words() != n {
                return Err(ReorderError::MismatchedSentence {
                    expected: n,
                    found: data.num_words(),
                });
            }
        }
        Ok(n)
    }

    /// Generate the feature vector of one edge. Root edges have none.
    ///
    /// The edge must lie inside the sentence, and a binary edge must split
    /// it with `left < center <= right`; anything else is `SpanOutOfRange`.
    pub fn make_edge_features(&mut self, sent: &[G::Data], edge: &HyperEdge) -> Result<FeatureVector> {
        let n = self.validate_sentence(sent)?;
        check_edge(edge, n)?;

        let mut feats = FeatureVector::new();
        if edge.edge_type == EdgeType::Root {
            return Ok(feats);
        }

        for (gen, data) in self.generators.iter().zip(sent) {
            let str_feats = if edge.edge_type.is_terminal() {
                gen.generate_span_features(data, edge)
            } else {
                gen.generate_combination_features(data, edge)
            };
            for (name, value) in str_feats {
                match self.symbols.get_id(&name, !self.frozen) {
                    Ok(id) => feats.push((id, value)),
                    Err(ReorderError::UnknownFeature(_))
                        if self.unknown_policy == UnknownFeaturePolicy::Skip =>
                    {
                        continue
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(normalize(feats))
    }

    /// Change an integer-indexed feature vector back into named features.
    pub fn stringify_feature_indices(&self, vec: &[FeaturePair]) -> Result<FeatureVectorString> {
        vec.iter()
            .map(|&(id, value)| Ok((self.symbols.get_symbol(id)?.to_string(), value)))
            .collect()
    }
}

fn check_edge(edge: &HyperEdge, n: usize) -> Result<()> {
    let in_sentence = edge.left >= 0 && edge.left <= edge.right && (edge.right as usize) < n;
    let split_ok = !edge.edge_type.is_binary() || (edge.left < edge.center && edge.center <= edge.right);
    if in_sentence && split_ok {
        Ok(())
    } else {
        Err(ReorderError::SpanOutOfRange {
            left: edge.left,
            right: edge.right,
            len: n,
        })
    }
}

/// Sort by id and merge repeated ids.
fn normalize(mut feats: FeatureVector) -> FeatureVector {
    feats.sort_by_key(|&(id, _)| id);
    let mut merged: FeatureVector = Vec::with_capacity(feats.len());
    for (id, value) in feats {
        match merged.last_mut() {
            Some(last) if last.0 == id => last.1 += value,
            _ => merged.push((id, value)),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::{FeatureDataSequence, SequenceFeatureGen};

    struct FixedGen;

    impl FeatureGenerator for FixedGen {
        type Data = FeatureDataSequence;

        fn generate_span_features(&self, _: &Self::Data, edge: &HyperEdge) -> FeatureVectorString {
            vec![
                ("b".to_string(), 1.0),
                (format!("T||{}", edge.edge_type), 1.0),
                ("b".to_string(), 2.0),
            ]
        }

        fn generate_combination_features(
            &self,
            _: &Self::Data,
            edge: &HyperEdge,
        ) -> FeatureVectorString {
            vec![(format!("T||{}", edge.edge_type), 1.0)]
        }
    }

    fn sentence(s: &str) -> Vec<FeatureDataSequence> {
        vec![FeatureDataSequence::parse(s)]
    }

    #[test]
    fn test_edge_features_sorted_and_merged() {
        let mut fs = FeatureSet::new().with_generator(FixedGen);
        let sent = sentence("a b");

        let feats = fs
            .make_edge_features(&sent, &HyperEdge::terminal(0, 1, EdgeType::Forward))
            .unwrap();

        // "b" was interned first and its two occurrences are summed
        assert_eq!(feats, vec![(FeatureId::new(0), 3.0), (FeatureId::new(1), 1.0)]);
        let named = fs.stringify_feature_indices(&feats).unwrap();
        assert_eq!(named[1], ("T||F".to_string(), 1.0));
    }

    #[test]
    fn test_root_has_no_features() {
        let mut fs = FeatureSet::new().with_generator(FixedGen);
        let sent = sentence("a b");
        let feats = fs
            .make_edge_features(&sent, &HyperEdge::terminal(0, 1, EdgeType::Root))
            .unwrap();
        assert!(feats.is_empty());
        assert!(fs.symbols().is_empty());
    }

    #[test]
    fn test_frozen_skip_policy() {
        let mut fs = FeatureSet::new().with_generator(FixedGen);
        let sent = sentence("a b");
        fs.make_edge_features(&sent, &HyperEdge::terminal(0, 0, EdgeType::Forward))
            .unwrap();
        fs.freeze();

        let feats = fs
            .make_edge_features(&sent, &HyperEdge::new(0, 1, 1, EdgeType::Straight))
            .unwrap();
        assert!(feats.is_empty());
        assert_eq!(fs.symbols().len(), 2);
    }

    #[test]
    fn test_frozen_fail_policy() {
        let mut fs = FeatureSet::new().with_generator(FixedGen);
        fs.freeze();
        fs.set_unknown_policy(UnknownFeaturePolicy::Fail);
        let sent = sentence("a b");

        let err = fs
            .make_edge_features(&sent, &HyperEdge::new(0, 1, 1, EdgeType::Inverted))
            .unwrap_err();
        assert_eq!(err, ReorderError::UnknownFeature("T||I".to_string()));
    }

    #[test]
    fn test_edge_out_of_range() {
        let mut fs = FeatureSet::new().with_generator(FixedGen);
        let sent = sentence("a b");

        for edge in [
            HyperEdge::terminal(0, 5, EdgeType::Forward),
            HyperEdge::terminal(-1, 0, EdgeType::Backward),
            HyperEdge::terminal(1, 0, EdgeType::Forward),
            HyperEdge::new(0, 0, 1, EdgeType::Straight),
            HyperEdge::new(0, 2, 1, EdgeType::Inverted),
        ] {
            assert_eq!(
                fs.make_edge_features(&sent, &edge),
                Err(ReorderError::SpanOutOfRange {
                    left: edge.left,
                    right: edge.right,
                    len: 2
                })
            );
        }
        assert!(fs.symbols().is_empty());
    }

    #[test]
    fn test_validate_sentence() {
        let fs = FeatureSet::new()
            .with_generator(SequenceFeatureGen::new("W"))
            .with_generator(SequenceFeatureGen::new("P"));

        let ok = vec![
            FeatureDataSequence::parse("the cat"),
            FeatureDataSequence::parse("DT NN"),
        ];
        assert_eq!(fs.validate_sentence(&ok), Ok(2));

        let short = vec![FeatureDataSequence::parse("the cat")];
        assert_eq!(
            fs.validate_sentence(&short),
            Err(ReorderError::MismatchedSentence { expected: 2, found: 1 })
        );

        let ragged = vec![
            FeatureDataSequence::parse("the cat"),
            FeatureDataSequence::parse("DT"),
        ];
        assert_eq!(
            fs.validate_sentence(&ragged),
            Err(ReorderError::MismatchedSentence { expected: 2, found: 1 })
        );

        let empty = vec![FeatureDataSequence::parse(""), FeatureDataSequence::parse("")];
        assert_eq!(fs.validate_sentence(&empty), Err(ReorderError::EmptySentence));
    }
}
