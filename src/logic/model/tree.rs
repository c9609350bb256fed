//! Decision Tree - CART with Gini impurity for the binary churn label
//!
//! Nodes live in a flat arena; leaves keep the fraction of churned samples
//! that reached them, which is the tree's churn probability.

use rand::rngs::StdRng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

/// Smallest impurity decrease that still counts as a useful split
const MIN_IMPURITY_DECREASE: f64 = 1e-12;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Leaf {
        churn_fraction: f64,
        samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub max_features: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// Weighted child impurity
    impurity: f64,
}

struct Builder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [u8],
    params: TreeParams,
    n_features: usize,
    rng: &'a mut StdRng,
    importances: &'a mut [f64],
    nodes: Vec<Node>,
}

impl DecisionTree {
    /// Grow a tree over `samples` (indices into `x`, repeats allowed).
    /// Impurity decreases are accumulated into `importances`.
    pub fn fit(
        x: &[Vec<f64>],
        y: &[u8],
        samples: &mut [usize],
        params: TreeParams,
        rng: &mut StdRng,
        importances: &mut [f64],
    ) -> Self {
        let n_features = importances.len();
        let mut builder = Builder {
            x,
            y,
            params,
            n_features,
            rng,
            importances,
            nodes: Vec::new(),
        };

        builder.grow(samples, 0);

        Self { nodes: builder.nodes }
    }

    /// Churn fraction of the leaf the row falls into
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { churn_fraction, .. } => return *churn_fraction,
                Node::Split { feature, threshold, left, right } => {
                    let value = row.get(*feature).copied().unwrap_or(0.0);
                    id = if value <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Structural check for trees that did not come from `fit`.
    /// Children always sit after their parent, so a valid tree cannot cycle.
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }

        for (id, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Leaf { churn_fraction, .. } => {
                    if !(0.0..=1.0).contains(churn_fraction) {
                        return Err(format!("node {} has churn fraction {}", id, churn_fraction));
                    }
                }
                Node::Split { feature, left, right, .. } => {
                    if *feature >= n_features {
                        return Err(format!("node {} splits on feature {} of {}", id, feature, n_features));
                    }
                    for child in [*left, *right] {
                        if child <= id || child >= self.nodes.len() {
                            return Err(format!("node {} points to invalid child {}", id, child));
                        }
                    }
                }
            }
        }

        Ok(())
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match &nodes[id] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() { 0 } else { walk(&self.nodes, 0) }
    }
}

fn gini(positives: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = positives as f64 / total as f64;
    2.0 * p * (1.0 - p)
}

impl Builder<'_> {
    fn grow(&mut self, samples: &mut [usize], depth: usize) -> usize {
        let total = samples.len();
        let positives = samples.iter().filter(|&&i| self.y[i] == 1).count();
        let id = self.nodes.len();

        self.nodes.push(Node::Leaf {
            churn_fraction: if total == 0 { 0.0 } else { positives as f64 / total as f64 },
            samples: total,
        });

        if depth >= self.params.max_depth
            || total < self.params.min_samples_split
            || positives == 0
            || positives == total
        {
            return id;
        }

        let parent_impurity = gini(positives, total);
        let Some(split) = self.best_split(samples, parent_impurity) else {
            return id;
        };

        // partition in place: rows with value <= threshold go left
        let mut mid = 0;
        for k in 0..samples.len() {
            if self.x[samples[k]][split.feature] <= split.threshold {
                samples.swap(mid, k);
                mid += 1;
            }
        }

        self.importances[split.feature] += total as f64 * (parent_impurity - split.impurity);

        let (left_samples, right_samples) = samples.split_at_mut(mid);
        let left = self.grow(left_samples, depth + 1);
        let right = self.grow(right_samples, depth + 1);

        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    fn best_split(&mut self, samples: &[usize], parent_impurity: f64) -> Option<SplitCandidate> {
        let total = samples.len();
        let total_positives = samples.iter().filter(|&&i| self.y[i] == 1).count();
        let candidates = index::sample(&mut *self.rng, self.n_features, self.params.max_features.min(self.n_features));

        let mut best: Option<SplitCandidate> = None;
        let mut column: Vec<(f64, u8)> = Vec::with_capacity(total);

        for feature in candidates.iter() {
            column.clear();
            column.extend(samples.iter().map(|&i| (self.x[i][feature], self.y[i])));
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_positives = 0;
            for k in 1..total {
                left_positives += column[k - 1].1 as usize;

                let (lower, upper) = (column[k - 1].0, column[k].0);
                if lower >= upper {
                    continue;
                }

                let right_positives = total_positives - left_positives;
                let impurity = (k as f64 * gini(left_positives, k)
                    + (total - k) as f64 * gini(right_positives, total - k))
                    / total as f64;

                if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                    let mut threshold = (lower + upper) / 2.0;
                    if threshold >= upper {
                        threshold = lower;
                    }
                    best = Some(SplitCandidate { feature, threshold, impurity });
                }
            }
        }

        best.filter(|b| parent_impurity - b.impurity > MIN_IMPURITY_DECREASE)
    }
}
