//! Python bindings via PyO3.

use crate::error::ReorderError;
use crate::feature::FeatureSet;
use crate::hyper_graph::{HyperGraph, HyperGraphBuilder};
use crate::model::ReordererModel;
use crate::sequence::{FeatureDataSequence, SequenceFeatureGen};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;
use std::collections::HashMap;

impl From<ReorderError> for PyErr {
    fn from(err: ReorderError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

/// A weighted reorderer over sequence features.
///
/// Sentences are passed as one whitespace-separated line per feature column
/// (e.g. words, then POS tags); column `i` is read by the generator with
/// prefix `prefixes[i]`.
#[pyclass(name = "Reorderer", unsendable)]
struct PyReorderer {
    features: FeatureSet<SequenceFeatureGen>,
    model: ReordererModel,
    graph: HyperGraph,
}

impl PyReorderer {
    fn build(&mut self, columns: &[String]) -> PyResult<f64> {
        let sent: Vec<FeatureDataSequence> = columns
            .iter()
            .map(|line| FeatureDataSequence::parse(line))
            .collect();
        Ok(self.graph.build(&self.model, &mut self.features, &sent)?)
    }
}

#[pymethods]
impl PyReorderer {
    #[new]
    #[pyo3(signature = (weights, beam_size = 0, max_term = 0, prefixes = None))]
    fn new(
        weights: HashMap<String, f64>,
        beam_size: usize,
        max_term: usize,
        prefixes: Option<Vec<String>>,
    ) -> PyResult<Self> {
        let mut features = FeatureSet::new().with_max_term(max_term);
        for prefix in prefixes.unwrap_or_else(|| vec!["W".to_string()]) {
            features.add_generator(SequenceFeatureGen::new(prefix));
        }

        let mut model = ReordererModel::new();
        for (name, weight) in &weights {
            model.set_named_weight(features.symbols_mut(), name, *weight)?;
        }
        // Features outside the model have weight zero anyway
        features.freeze();

        Ok(PyReorderer {
            features,
            model,
            graph: HyperGraphBuilder::new().beam_size(beam_size).build(),
        })
    }

    /// Best reordering of a sentence and its score.
    fn reorder(&mut self, columns: Vec<String>) -> PyResult<(Vec<usize>, f64)> {
        let score = self.build(&columns)?;
        Ok((self.graph.best_reordering()?, score))
    }

    /// Bracketed derivation of the best reordering.
    fn parse(&mut self, columns: Vec<String>) -> PyResult<String> {
        self.build(&columns)?;
        let words: Vec<&str> = columns
            .first()
            .map(|line| line.split_whitespace().collect())
            .unwrap_or_default();
        Ok(self.graph.parse_string(self.graph.best_root()?, &words)?)
    }

    /// Number of features known to the model.
    fn num_features(&self) -> usize {
        self.features.symbols().len()
    }

    /// Statistics of the last decode.
    fn stats(&self, py: Python) -> PyResult<PyObject> {
        let stats = self.graph.stats();
        let dict = PyDict::new(py);
        dict.set_item("cells", stats.cells)?;
        dict.set_item("target_spans", stats.target_spans)?;
        dict.set_item("hypotheses", stats.hypotheses)?;
        dict.set_item("queue_pops", stats.queue_pops)?;
        dict.set_item("duplicates_skipped", stats.duplicates_skipped)?;
        dict.set_item("feature_cache_hits", stats.feature_cache_hits)?;
        dict.set_item("feature_cache_misses", stats.feature_cache_misses)?;
        Ok(dict.into_py(py))
    }
}

/// Python module definition.
#[pymodule]
fn itg_reorder(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyReorderer>()?;
    Ok(())
}
