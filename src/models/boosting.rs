//! Multiclass gradient boosting with softmax link.
//!
//! Each round fits one shallow regression tree per present class to the
//! softmax residuals `y_k - p_k`; leaf values take a single Newton step
//! `(K-1)/K * sum(r) / sum(p (1 - p))`.

use nalgebra::DMatrix;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::models::tree::{Criterion, Moments, Tree, TreeParams, build_tree};
use crate::models::{softmax_in_place, validate_training_set};
use crate::train::budget::{Deadline, FitError};

/// Raw score floor for classes absent from training.
const ABSENT_CLASS_SCORE: f64 = -30.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    pub n_rounds: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub min_samples_leaf: usize,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_rounds: 100,
            max_depth: 8,
            learning_rate: 0.1,
            min_samples_leaf: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    n_classes: usize,
    learning_rate: f64,
    init: Vec<f64>,
    /// `rounds[m][k]`: tree for class `k` in round `m` (`None` for absent classes).
    rounds: Vec<Vec<Option<Tree>>>,
}

struct NewtonResidual<'a> {
    residual: &'a [f64],
    hessian: &'a [f64],
    n_classes: usize,
}

impl Criterion for NewtonResidual<'_> {
    type Stats = Moments;

    fn empty(&self) -> Moments {
        Moments::default()
    }

    fn add(&self, stats: &mut Moments, i: usize) {
        stats.add(self.residual[i]);
    }

    fn remove(&self, stats: &mut Moments, i: usize) {
        stats.remove(self.residual[i]);
    }

    fn impurity(&self, stats: &Moments) -> f64 {
        stats.sse()
    }

    fn leaf_value(&self, samples: &[usize]) -> Vec<f64> {
        let num: f64 = samples.iter().map(|&i| self.residual[i]).sum();
        let den: f64 = samples.iter().map(|&i| self.hessian[i]).sum();
        let k = self.n_classes as f64;
        let step = if den.abs() < 1e-150 {
            0.0
        } else {
            (k - 1.0) / k * num / den
        };
        vec![step]
    }
}

impl GradientBoosting {
    pub fn fit(
        x: &DMatrix<f64>,
        y: &[usize],
        n_classes: usize,
        params: &BoostingParams,
        seed: u64,
        deadline: &Deadline,
    ) -> Result<Self, FitError> {
        validate_training_set(x, y, n_classes)?;
        if params.n_rounds == 0
            || params.max_depth == 0
            || !(params.learning_rate.is_finite() && params.learning_rate > 0.0)
        {
            return Err(FitError::InvalidParams(format!(
                "gradient boosting needs n_rounds, max_depth >= 1 and learning_rate > 0 (got {params:?})"
            )));
        }

        let n = x.nrows();
        let mut counts = vec![0usize; n_classes];
        for &k in y {
            counts[k] += 1;
        }
        let init: Vec<f64> = counts
            .iter()
            .map(|&c| {
                if c > 0 {
                    (c as f64 / n as f64).ln()
                } else {
                    ABSENT_CLASS_SCORE
                }
            })
            .collect();

        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_leaf: params.min_samples_leaf.max(1),
            max_features: None,
        };
        let samples: Vec<usize> = (0..n).collect();
        // Trees use every feature, so the RNG is never drawn from.
        let mut rng = StdRng::seed_from_u64(seed);

        let mut raw = DMatrix::from_fn(n, n_classes, |_, k| init[k]);
        let mut rounds = Vec::with_capacity(params.n_rounds);
        let mut residual = vec![0.0; n];
        let mut hessian = vec![0.0; n];
        let mut proba = vec![0.0; n_classes];

        for _ in 0..params.n_rounds {
            deadline.check()?;

            let mut probs = DMatrix::zeros(n, n_classes);
            for i in 0..n {
                for k in 0..n_classes {
                    proba[k] = raw[(i, k)];
                }
                softmax_in_place(&mut proba);
                for k in 0..n_classes {
                    probs[(i, k)] = proba[k];
                }
            }

            let mut round = Vec::with_capacity(n_classes);
            for k in 0..n_classes {
                if counts[k] == 0 {
                    round.push(None);
                    continue;
                }
                for i in 0..n {
                    let p = probs[(i, k)];
                    let target = if y[i] == k { 1.0 } else { 0.0 };
                    residual[i] = target - p;
                    hessian[i] = p * (1.0 - p);
                }
                let criterion = NewtonResidual {
                    residual: &residual,
                    hessian: &hessian,
                    n_classes,
                };
                let tree = build_tree(x, &samples, &criterion, &tree_params, &mut rng);
                for i in 0..n {
                    let step = tree.predict_row(x, i).first().copied().unwrap_or(0.0);
                    raw[(i, k)] += params.learning_rate * step;
                }
                round.push(Some(tree));
            }
            rounds.push(round);
        }

        if raw.iter().any(|v| !v.is_finite()) {
            return Err(FitError::Numerical(
                "gradient boosting produced non-finite scores".to_string(),
            ));
        }

        Ok(Self {
            n_classes,
            learning_rate: params.learning_rate,
            init,
            rounds,
        })
    }

    pub fn n_rounds(&self) -> usize {
        self.rounds.len()
    }

    pub fn predict_proba(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        let mut out = DMatrix::zeros(x.nrows(), self.n_classes);
        let mut scores = vec![0.0; self.n_classes];
        for i in 0..x.nrows() {
            scores.copy_from_slice(&self.init);
            for round in &self.rounds {
                for (k, tree) in round.iter().enumerate() {
                    if let Some(tree) = tree {
                        let step = tree.predict_row(x, i).first().copied().unwrap_or(0.0);
                        scores[k] += self.learning_rate * step;
                    }
                }
            }
            softmax_in_place(&mut scores);
            for k in 0..self.n_classes {
                out[(i, k)] = scores[k];
            }
        }
        out
    }
}
