//! One-vs-rest linear SVM trained with Pegasos (primal hinge-loss SGD).
//!
//! The bias is folded in as a constant feature. Class probabilities are a
//! softmax over the per-class margins.

use nalgebra::DMatrix;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::models::{balanced_class_weights, softmax_in_place, validate_training_set};
use crate::train::budget::{Deadline, FitError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SvmParams {
    /// Inverse regularization strength; `lambda = 1 / (c * n)`.
    pub c: f64,
    pub epochs: usize,
    pub balanced: bool,
}

impl Default for SvmParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            epochs: 20,
            balanced: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearSvm {
    n_features: usize,
    /// Per class: `n_features` weights followed by the bias (`None` = class absent).
    weights: Vec<Option<Vec<f64>>>,
}

impl LinearSvm {
    pub fn fit(
        x: &DMatrix<f64>,
        y: &[usize],
        n_classes: usize,
        params: &SvmParams,
        seed: u64,
        deadline: &Deadline,
    ) -> Result<Self, FitError> {
        validate_training_set(x, y, n_classes)?;
        if params.epochs == 0 || !(params.c.is_finite() && params.c > 0.0) {
            return Err(FitError::InvalidParams(format!(
                "linear svm needs epochs >= 1 and c > 0 (got {params:?})"
            )));
        }

        let n = x.nrows();
        let p = x.ncols();
        let lambda = 1.0 / (params.c * n as f64);
        let radius = 1.0 / lambda.sqrt();
        let sample_weight = if params.balanced {
            balanced_class_weights(y, n_classes)
        } else {
            vec![1.0; n_classes]
        };

        let mut present = vec![false; n_classes];
        for &k in y {
            present[k] = true;
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut order: Vec<usize> = (0..n).collect();
        let mut weights = Vec::with_capacity(n_classes);

        for (k, &is_present) in present.iter().enumerate() {
            if !is_present {
                weights.push(None);
                continue;
            }
            let mut w = vec![0.0; p + 1];
            let mut t = 0usize;
            for _ in 0..params.epochs {
                deadline.check()?;
                order.shuffle(&mut rng);
                for &i in &order {
                    t += 1;
                    let eta = 1.0 / (lambda * t as f64);
                    let target = if y[i] == k { 1.0 } else { -1.0 };
                    let margin = target * decision(&w, x, i);

                    let shrink = 1.0 - eta * lambda;
                    w.iter_mut().for_each(|v| *v *= shrink);
                    if margin < 1.0 {
                        let step = eta * sample_weight[y[i]] * target;
                        for j in 0..p {
                            w[j] += step * x[(i, j)];
                        }
                        w[p] += step;
                    }

                    let norm = w.iter().map(|v| v * v).sum::<f64>().sqrt();
                    if norm > radius {
                        let scale = radius / norm;
                        w.iter_mut().for_each(|v| *v *= scale);
                    }
                }
            }
            if w.iter().any(|v| !v.is_finite()) {
                return Err(FitError::Numerical(format!(
                    "linear svm diverged for class {k}"
                )));
            }
            weights.push(Some(w));
        }

        Ok(Self {
            n_features: p,
            weights,
        })
    }

    /// Raw one-vs-rest margins (`-inf` for absent classes).
    pub fn decision_function(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        DMatrix::from_fn(x.nrows(), self.weights.len(), |i, k| {
            match &self.weights[k] {
                Some(w) => decision(w, x, i),
                None => f64::NEG_INFINITY,
            }
        })
    }

    pub fn predict_proba(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        let mut margins = self.decision_function(x);
        let mut row = vec![0.0; self.weights.len()];
        for i in 0..margins.nrows() {
            for (k, v) in row.iter_mut().enumerate() {
                *v = margins[(i, k)];
            }
            softmax_in_place(&mut row);
            for (k, v) in row.iter().enumerate() {
                margins[(i, k)] = *v;
            }
        }
        margins
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

fn decision(w: &[f64], x: &DMatrix<f64>, i: usize) -> f64 {
    let p = w.len() - 1;
    let mut acc = w[p];
    for j in 0..p {
        acc += w[j] * x[(i, j)];
    }
    acc
}
