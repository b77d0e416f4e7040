//! Random forest of Gini CART trees.
//!
//! Trees are grown in parallel with rayon. Each tree draws its bootstrap
//! sample and its per-split feature subsets from an RNG seeded by
//! `(run seed, tree index)`, so the fitted forest does not depend on thread
//! scheduling.

use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::tree::{Gini, Tree, TreeParams, build_tree};
use crate::models::{balanced_class_weights, validate_training_set};
use crate::train::budget::{Deadline, FitError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Reweight classes inversely to their frequency.
    pub balanced: bool,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: 15,
            min_samples_leaf: 3,
            balanced: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    n_classes: usize,
    trees: Vec<Tree>,
}

impl RandomForest {
    pub fn fit(
        x: &DMatrix<f64>,
        y: &[usize],
        n_classes: usize,
        params: &ForestParams,
        seed: u64,
        deadline: &Deadline,
    ) -> Result<Self, FitError> {
        validate_training_set(x, y, n_classes)?;
        if params.n_trees == 0 || params.max_depth == 0 || params.min_samples_leaf == 0 {
            return Err(FitError::InvalidParams(format!(
                "random forest needs n_trees, max_depth and min_samples_leaf >= 1 (got {params:?})"
            )));
        }

        let n = x.nrows();
        let class_weight = if params.balanced {
            balanced_class_weights(y, n_classes)
        } else {
            vec![1.0; n_classes]
        };
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_leaf: params.min_samples_leaf,
            max_features: Some(((x.ncols() as f64).sqrt() as usize).max(1)),
        };

        let trees = (0..params.n_trees)
            .into_par_iter()
            .map(|t| {
                deadline.check()?;
                let mut rng = StdRng::seed_from_u64(tree_seed(seed, t));

                let mut counts = vec![0u32; n];
                for _ in 0..n {
                    counts[rng.gen_range(0..n)] += 1;
                }
                let samples: Vec<usize> = (0..n).filter(|&i| counts[i] > 0).collect();
                let weights: Vec<f64> = (0..n)
                    .map(|i| counts[i] as f64 * class_weight[y[i]])
                    .collect();

                let criterion = Gini {
                    y,
                    weights: &weights,
                    n_classes,
                };
                Ok(build_tree(x, &samples, &criterion, &tree_params, &mut rng))
            })
            .collect::<Result<Vec<Tree>, FitError>>()?;

        Ok(Self { n_classes, trees })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean of the per-tree leaf class distributions (`n x n_classes`).
    ///
    /// Each row is renormalised by its sum so no entry exceeds 1.
    pub fn predict_proba(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        let mut out = DMatrix::zeros(x.nrows(), self.n_classes);
        if self.trees.is_empty() {
            return out;
        }
        for i in 0..x.nrows() {
            for tree in &self.trees {
                for (k, p) in tree.predict_row(x, i).iter().enumerate().take(self.n_classes) {
                    out[(i, k)] += p;
                }
            }
            let total: f64 = out.row(i).sum();
            if total > 0.0 {
                for k in 0..self.n_classes {
                    out[(i, k)] /= total;
                }
            }
        }
        out
    }
}

fn tree_seed(seed: u64, tree: usize) -> u64 {
    seed ^ (tree as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::blobs;
    use std::time::Duration;

    fn small_params() -> ForestParams {
        ForestParams {
            n_trees: 25,
            max_depth: 6,
            min_samples_leaf: 1,
            balanced: true,
        }
    }

    #[test]
    fn separates_blobs_and_rows_sum_to_one() {
        let (x, y) = blobs(60, 3, 11);
        let forest =
            RandomForest::fit(&x, &y, 5, &small_params(), 42, &Deadline::unbounded()).unwrap();
        assert_eq!(forest.n_trees(), 25);

        let proba = forest.predict_proba(&x);
        let mut correct = 0;
        for i in 0..x.nrows() {
            let row_sum: f64 = proba.row(i).sum();
            assert!((row_sum - 1.0).abs() < 1e-9);
            if crate::models::argmax(proba.row(i).iter().copied()) == y[i] {
                correct += 1;
            }
        }
        assert!(correct as f64 / y.len() as f64 > 0.9);
    }

    #[test]
    fn pure_leaves_give_probability_exactly_one() {
        let (x, _) = blobs(10, 2, 5);
        let y = vec![3; x.nrows()];
        let params = ForestParams {
            n_trees: 7,
            ..small_params()
        };
        let forest = RandomForest::fit(&x, &y, 5, &params, 9, &Deadline::unbounded()).unwrap();
        let proba = forest.predict_proba(&x);
        for i in 0..x.nrows() {
            assert_eq!(proba[(i, 3)], 1.0);
            assert!(proba.row(i).iter().all(|p| (0.0..=1.0).contains(p)));
        }
    }

    #[test]
    fn deterministic_for_fixed_seed() {
        let (x, y) = blobs(40, 2, 3);
        let a = RandomForest::fit(&x, &y, 5, &small_params(), 7, &Deadline::unbounded()).unwrap();
        let b = RandomForest::fit(&x, &y, 5, &small_params(), 7, &Deadline::unbounded()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn zero_budget_times_out() {
        let (x, y) = blobs(20, 2, 1);
        let err = RandomForest::fit(&x, &y, 5, &small_params(), 1, &Deadline::new(Duration::ZERO))
            .unwrap_err();
        assert!(matches!(err, FitError::Timeout { .. }));
    }

    #[test]
    fn rejects_zero_trees() {
        let (x, y) = blobs(20, 2, 1);
        let params = ForestParams {
            n_trees: 0,
            ..small_params()
        };
        let err = RandomForest::fit(&x, &y, 5, &params, 1, &Deadline::unbounded()).unwrap_err();
        assert!(matches!(err, FitError::InvalidParams(_)));
    }
}
