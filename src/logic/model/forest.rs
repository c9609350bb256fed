//! Random Forest - bagged decision trees
//!
//! Each tree sees a bootstrap resample of the training rows and a random
//! sqrt-sized feature subset at every split. Seeds derive from
//! `random_state`, so the same data and params give the same forest.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::tree::{DecisionTree, TreeParams};
use super::{Classifier, ModelError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub random_state: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            min_samples_split: 2,
            random_state: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RandomForest {
    params: ForestParams,
    n_features: usize,
    trees: Vec<DecisionTree>,
    feature_importances: Vec<f64>,
}

impl RandomForest {
    pub fn fit(x: &[Vec<f64>], y: &[u8], params: ForestParams) -> Result<Self, ModelError> {
        if x.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        if x.len() != y.len() {
            return Err(ModelError::LengthMismatch { rows: x.len(), labels: y.len() });
        }
        if params.n_estimators == 0 || params.max_depth == 0 {
            return Err(ModelError::InvalidParams(
                "n_estimators and max_depth must be at least 1".to_string(),
            ));
        }

        let n_features = x[0].len();
        if let Some((row, bad)) = x.iter().enumerate().find(|(_, r)| r.len() != n_features) {
            return Err(ModelError::RowWidth { row, expected: n_features, got: bad.len() });
        }

        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split.max(2),
            max_features: ((n_features as f64).sqrt() as usize).max(1),
        };

        let mut trees = Vec::with_capacity(params.n_estimators);
        let mut importances = vec![0.0; n_features];

        for t in 0..params.n_estimators {
            let mut rng = StdRng::seed_from_u64(params.random_state.wrapping_add(t as u64));
            let mut samples: Vec<usize> = (0..x.len()).map(|_| rng.gen_range(0..x.len())).collect();
            let mut tree_importances = vec![0.0; n_features];

            trees.push(DecisionTree::fit(x, y, &mut samples, tree_params, &mut rng, &mut tree_importances));

            normalize(&mut tree_importances);
            for (total, v) in importances.iter_mut().zip(&tree_importances) {
                *total += v;
            }
        }

        normalize(&mut importances);

        tracing::debug!(
            "Random forest fitted: {} trees over {} rows x {} features",
            trees.len(),
            x.len(),
            n_features
        );

        Ok(Self {
            params,
            n_features,
            trees,
            feature_importances: importances,
        })
    }

    pub fn params(&self) -> ForestParams {
        self.params
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Reject deserialized forests that prediction could not walk safely
    pub fn validate(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        if self.feature_importances.len() != self.n_features {
            return Err(format!(
                "{} feature importances for {} features",
                self.feature_importances.len(),
                self.n_features
            ));
        }

        for (t, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features).map_err(|e| format!("tree {}: {}", t, e))?;
        }

        Ok(())
    }

    /// Mean impurity decrease per feature, summing to 1
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}

impl Classifier for RandomForest {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn churn_probability(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict_proba(row)).sum();
        sum / self.trees.len() as f64
    }
}

fn normalize(values: &mut [f64]) {
    let sum: f64 = values.iter().sum();
    if sum > 0.0 {
        values.iter_mut().for_each(|v| *v /= sum);
    }
}
