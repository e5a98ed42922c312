//! Features over a plain sequence of symbols (words, tags, clusters...).

use crate::feature::{FeatureData, FeatureGenerator, FeatureVectorString};
use crate::hyper_edge::HyperEdge;

/// One symbol per source token.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeatureDataSequence {
    sequence: Vec<String>,
}

impl FeatureDataSequence {
    pub fn new(sequence: Vec<String>) -> Self {
        FeatureDataSequence { sequence }
    }

    /// Split a line on whitespace.
    pub fn parse(line: &str) -> Self {
        FeatureDataSequence {
            sequence: line.split_whitespace().map(str::to_string).collect(),
        }
    }

    pub fn element(&self, i: usize) -> &str {
        &self.sequence[i]
    }

    /// Elements of the span `[l, r]` joined with `sep`.
    pub fn range_string(&self, l: usize, r: usize, sep: &str) -> String {
        self.sequence[l..=r].join(sep)
    }
}

impl FeatureData for FeatureDataSequence {
    fn num_words(&self) -> usize {
        self.sequence.len()
    }
}

impl<S: Into<String>> FromIterator<S> for FeatureDataSequence {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        FeatureDataSequence {
            sequence: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Fixed structural templates over one sequence column.
///
/// Every feature name starts with `prefix`, so several generators (say one
/// over words and one over POS tags) can share a `FeatureSet`.
#[derive(Clone, Debug)]
pub struct SequenceFeatureGen {
    prefix: String,
    /// Spans up to this many words get their full content as a feature.
    max_phrase_len: usize,
    /// Span lengths at or above this are bucketed together.
    max_len_bucket: usize,
}

impl SequenceFeatureGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        SequenceFeatureGen {
            prefix: prefix.into(),
            max_phrase_len: 1,
            max_len_bucket: 5,
        }
    }

    pub fn with_max_phrase_len(mut self, len: usize) -> Self {
        self.max_phrase_len = len;
        self
    }

    pub fn with_max_len_bucket(mut self, len: usize) -> Self {
        self.max_len_bucket = len.max(1);
        self
    }

    fn len_bucket(&self, len: usize) -> String {
        if len >= self.max_len_bucket {
            format!("{}+", self.max_len_bucket)
        } else {
            len.to_string()
        }
    }

    fn feat(&self, template: &str, value: &str, edge: &HyperEdge) -> (String, f64) {
        (
            format!("{}{}||{}||{}", self.prefix, template, value, edge.edge_type),
            1.0,
        )
    }
}

impl FeatureGenerator for SequenceFeatureGen {
    type Data = FeatureDataSequence;

    fn generate_span_features(&self, data: &Self::Data, edge: &HyperEdge) -> FeatureVectorString {
        let (l, r) = (edge.left as usize, edge.right as usize);
        let mut feats = vec![
            (format!("{}T||{}", self.prefix, edge.edge_type), 1.0),
            self.feat("SL", &self.len_bucket(r - l + 1), edge),
            self.feat("SW", data.element(l), edge),
            self.feat("EW", data.element(r), edge),
        ];
        if r - l < self.max_phrase_len {
            feats.push(self.feat("SP", &data.range_string(l, r, "_"), edge));
        }
        feats
    }

    fn generate_combination_features(
        &self,
        data: &Self::Data,
        edge: &HyperEdge,
    ) -> FeatureVectorString {
        let (l, c, r) = (edge.left as usize, edge.center as usize, edge.right as usize);
        let left_end = data.element(c - 1);
        let right_start = data.element(c);
        vec![
            (format!("{}T||{}", self.prefix, edge.edge_type), 1.0),
            self.feat("SL", &self.len_bucket(r - l + 1), edge),
            self.feat("LS", data.element(l), edge),
            self.feat("LE", left_end, edge),
            self.feat("RS", right_start, edge),
            self.feat("RE", data.element(r), edge),
            self.feat("LR", &format!("{}_{}", left_end, right_start), edge),
            self.feat(
                "BAL",
                &format!("{}_{}", self.len_bucket(c - l), self.len_bucket(r - c + 1)),
                edge,
            ),
        ]
    }
}
