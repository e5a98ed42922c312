//! Linear scoring model.

use crate::error::Result;
use crate::feature::FeaturePair;
use crate::symbols::{FeatureId, SymbolSet};

/// Dense weight vector indexed by `FeatureId`.
///
/// Ids past the end of the vector have weight zero, so a model trained on a
/// smaller feature set scores features it has never seen as 0.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReordererModel {
    weights: Vec<f64>,
}

impl ReordererModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_weights(weights: Vec<f64>) -> Self {
        ReordererModel { weights }
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn weight(&self, id: FeatureId) -> f64 {
        self.weights.get(id.index()).copied().unwrap_or(0.0)
    }

    pub fn set_weight(&mut self, id: FeatureId, weight: f64) {
        if id.index() >= self.weights.len() {
            self.weights.resize(id.index() + 1, 0.0);
        }
        self.weights[id.index()] = weight;
    }

    /// Set a weight by feature name, interning the name if needed.
    pub fn set_named_weight(&mut self, symbols: &mut SymbolSet, name: &str, weight: f64) -> Result<()> {
        let id = symbols.get_id(name, true)?;
        self.set_weight(id, weight);
        Ok(())
    }

    /// Dot product of the weights with a feature vector.
    pub fn score_feature_vector(&self, vec: &[FeaturePair]) -> f64 {
        vec.iter().map(|&(id, value)| self.weight(id) * value).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_feature_vector() {
        let model = ReordererModel::from_weights(vec![1.0, -2.0, 0.5]);
        let vec = vec![
            (FeatureId::new(0), 2.0),
            (FeatureId::new(2), 4.0),
            (FeatureId::new(9), 100.0),
        ];
        // id 9 is unknown to the model and contributes nothing
        assert!((model.score_feature_vector(&vec) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_set_weight_grows() {
        let mut model = ReordererModel::new();
        model.set_weight(FeatureId::new(3), 1.5);
        assert_eq!(model.len(), 4);
        assert_eq!(model.weight(FeatureId::new(3)), 1.5);
        assert_eq!(model.weight(FeatureId::new(1)), 0.0);
    }

    #[test]
    fn test_set_named_weight() {
        let mut symbols = SymbolSet::new();
        let mut model = ReordererModel::new();
        model.set_named_weight(&mut symbols, "WT||S", 2.0).unwrap();
        model.set_named_weight(&mut symbols, "WT||I", -1.0).unwrap();

        let id = symbols.find("WT||I").unwrap();
        assert_eq!(model.weight(id), -1.0);
        assert_eq!(symbols.len(), 2);
    }
}
