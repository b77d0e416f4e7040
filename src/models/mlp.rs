//! Multi-layer perceptron classifier (ReLU hidden layers, softmax output).
//!
//! Trained with mini-batch Adam on cross-entropy plus an L2 penalty. With early
//! stopping enabled, a seeded slice of the training rows is held out and the
//! weights from the epoch with the best validation accuracy are kept.

use nalgebra::DMatrix;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::models::{argmax, softmax_in_place, validate_training_set};
use crate::train::budget::{Deadline, FitError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpParams {
    pub hidden: Vec<usize>,
    pub learning_rate: f64,
    /// L2 penalty.
    pub alpha: f64,
    pub batch_size: usize,
    pub max_epochs: usize,
    pub early_stopping: bool,
    pub validation_fraction: f64,
    /// Epochs without validation improvement before stopping.
    pub patience: usize,
    pub tol: f64,
}

impl Default for MlpParams {
    fn default() -> Self {
        Self {
            hidden: vec![64, 32],
            learning_rate: 1e-3,
            alpha: 1e-4,
            batch_size: 200,
            max_epochs: 200,
            early_stopping: true,
            validation_fraction: 0.1,
            patience: 10,
            tol: 1e-4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DenseLayer {
    /// `fan_in x fan_out`
    w: DMatrix<f64>,
    b: Vec<f64>,
}

impl DenseLayer {
    fn forward(&self, input: &DMatrix<f64>) -> DMatrix<f64> {
        let mut z = input * &self.w;
        for j in 0..z.ncols() {
            let bias = self.b[j];
            z.column_mut(j).iter_mut().for_each(|v| *v += bias);
        }
        z
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuralNetwork {
    layers: Vec<DenseLayer>,
    /// Epochs actually run.
    epochs: usize,
}

/// Adam first/second moment buffers for one layer.
struct AdamState {
    mw: Vec<f64>,
    vw: Vec<f64>,
    mb: Vec<f64>,
    vb: Vec<f64>,
}

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const EPSILON: f64 = 1e-8;

impl NeuralNetwork {
    pub fn fit(
        x: &DMatrix<f64>,
        y: &[usize],
        n_classes: usize,
        params: &MlpParams,
        seed: u64,
        deadline: &Deadline,
    ) -> Result<Self, FitError> {
        validate_training_set(x, y, n_classes)?;
        if params.hidden.iter().any(|&h| h == 0)
            || params.batch_size == 0
            || params.max_epochs == 0
            || !(params.learning_rate.is_finite() && params.learning_rate > 0.0)
            || !(0.0..1.0).contains(&params.validation_fraction)
        {
            return Err(FitError::InvalidParams(format!(
                "invalid neural network parameters: {params:?}"
            )));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut layers = init_layers(x.ncols(), &params.hidden, n_classes, &mut rng)?;
        let mut adam: Vec<AdamState> = layers
            .iter()
            .map(|l| AdamState {
                mw: vec![0.0; l.w.len()],
                vw: vec![0.0; l.w.len()],
                mb: vec![0.0; l.b.len()],
                vb: vec![0.0; l.b.len()],
            })
            .collect();

        let mut rows: Vec<usize> = (0..x.nrows()).collect();
        rows.shuffle(&mut rng);
        let n_val = if params.early_stopping {
            (x.nrows() as f64 * params.validation_fraction).ceil() as usize
        } else {
            0
        };
        // Too few rows to hold any out: train on everything.
        let (val_rows, train_rows) = if n_val >= 1 && n_val < x.nrows() {
            rows.split_at(n_val)
        } else {
            (&rows[..0], &rows[..])
        };
        let train_rows = train_rows.to_vec();
        let x_val = x.select_rows(val_rows);
        let y_val: Vec<usize> = val_rows.iter().map(|&i| y[i]).collect();

        let mut best: Option<(f64, Vec<DenseLayer>)> = None;
        let mut stale = 0usize;
        let mut step = 0i32;
        let mut epochs = 0;
        let mut order = train_rows.clone();

        for _ in 0..params.max_epochs {
            deadline.check()?;
            epochs += 1;
            order.shuffle(&mut rng);

            for batch in order.chunks(params.batch_size) {
                step += 1;
                let xb = x.select_rows(batch);
                let yb: Vec<usize> = batch.iter().map(|&i| y[i]).collect();
                let grads = backprop(&layers, &xb, &yb, params.alpha);
                adam_update(&mut layers, &mut adam, &grads, params.learning_rate, step);
            }

            if layers
                .iter()
                .any(|l| l.w.iter().any(|v| !v.is_finite()))
            {
                return Err(FitError::Numerical(
                    "neural network weights diverged".to_string(),
                ));
            }

            if !y_val.is_empty() {
                let score = accuracy(&layers, &x_val, &y_val);
                let improved = best
                    .as_ref()
                    .is_none_or(|(best_score, _)| score > best_score + params.tol);
                if improved {
                    best = Some((score, layers.clone()));
                    stale = 0;
                } else {
                    stale += 1;
                    if stale >= params.patience {
                        break;
                    }
                }
            }
        }

        if let Some((_, best_layers)) = best {
            layers = best_layers;
        }
        Ok(Self { layers, epochs })
    }

    pub fn epochs(&self) -> usize {
        self.epochs
    }

    pub fn predict_proba(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        let mut out = forward_logits(&self.layers, x);
        softmax_rows(&mut out);
        out
    }
}

fn init_layers(
    n_inputs: usize,
    hidden: &[usize],
    n_outputs: usize,
    rng: &mut StdRng,
) -> Result<Vec<DenseLayer>, FitError> {
    let mut sizes = Vec::with_capacity(hidden.len() + 2);
    sizes.push(n_inputs);
    sizes.extend_from_slice(hidden);
    sizes.push(n_outputs);

    sizes
        .windows(2)
        .map(|pair| {
            let (fan_in, fan_out) = (pair[0], pair[1]);
            let std = (2.0 / fan_in.max(1) as f64).sqrt();
            let normal =
                Normal::new(0.0, std).map_err(|e| FitError::Numerical(e.to_string()))?;
            Ok(DenseLayer {
                w: DMatrix::from_fn(fan_in, fan_out, |_, _| normal.sample(rng)),
                b: vec![0.0; fan_out],
            })
        })
        .collect()
}

/// Pre-softmax outputs of the last layer.
fn forward_logits(layers: &[DenseLayer], x: &DMatrix<f64>) -> DMatrix<f64> {
    let mut a = x.clone();
    for (l, layer) in layers.iter().enumerate() {
        a = layer.forward(&a);
        if l + 1 < layers.len() {
            a.iter_mut().for_each(|v| *v = v.max(0.0));
        }
    }
    a
}

fn softmax_rows(m: &mut DMatrix<f64>) {
    let mut row = vec![0.0; m.ncols()];
    for i in 0..m.nrows() {
        for (k, v) in row.iter_mut().enumerate() {
            *v = m[(i, k)];
        }
        softmax_in_place(&mut row);
        for (k, v) in row.iter().enumerate() {
            m[(i, k)] = *v;
        }
    }
}

fn accuracy(layers: &[DenseLayer], x: &DMatrix<f64>, y: &[usize]) -> f64 {
    let logits = forward_logits(layers, x);
    let correct = (0..logits.nrows())
        .filter(|&i| argmax(logits.row(i).iter().copied()) == y[i])
        .count();
    correct as f64 / y.len().max(1) as f64
}

/// Gradients `(dW, db)` per layer for mean cross-entropy + L2.
fn backprop(
    layers: &[DenseLayer],
    x: &DMatrix<f64>,
    y: &[usize],
    alpha: f64,
) -> Vec<(DMatrix<f64>, Vec<f64>)> {
    let m = x.nrows() as f64;

    let mut activations = Vec::with_capacity(layers.len() + 1);
    activations.push(x.clone());
    for (l, layer) in layers.iter().enumerate() {
        let mut z = layer.forward(&activations[l]);
        if l + 1 < layers.len() {
            z.iter_mut().for_each(|v| *v = v.max(0.0));
        }
        activations.push(z);
    }

    let Some(mut delta) = activations.pop() else {
        return Vec::new();
    };
    softmax_rows(&mut delta);
    for (i, &k) in y.iter().enumerate() {
        delta[(i, k)] -= 1.0;
    }
    delta /= m;

    let mut grads = Vec::with_capacity(layers.len());
    for l in (0..layers.len()).rev() {
        let input = &activations[l];
        let mut dw = input.transpose() * &delta;
        dw += &layers[l].w * (alpha / m);
        let db: Vec<f64> = delta.column_iter().map(|c| c.sum()).collect();

        if l > 0 {
            let mut next = &delta * layers[l].w.transpose();
            next.zip_apply(input, |d, a| {
                if a <= 0.0 {
                    *d = 0.0;
                }
            });
            delta = next;
        }
        grads.push((dw, db));
    }
    grads.reverse();
    grads
}

fn adam_update(
    layers: &mut [DenseLayer],
    states: &mut [AdamState],
    grads: &[(DMatrix<f64>, Vec<f64>)],
    learning_rate: f64,
    step: i32,
) {
    let lr_t = learning_rate * (1.0 - BETA2.powi(step)).sqrt() / (1.0 - BETA1.powi(step));
    for ((layer, state), (dw, db)) in layers.iter_mut().zip(states.iter_mut()).zip(grads) {
        adam_step(
            layer.w.as_mut_slice(),
            dw.as_slice(),
            &mut state.mw,
            &mut state.vw,
            lr_t,
        );
        adam_step(&mut layer.b, db, &mut state.mb, &mut state.vb, lr_t);
    }
}

fn adam_step(param: &mut [f64], grad: &[f64], m: &mut [f64], v: &mut [f64], lr_t: f64) {
    for (((p, g), m), v) in param.iter_mut().zip(grad).zip(m.iter_mut()).zip(v.iter_mut()) {
        *m = BETA1 * *m + (1.0 - BETA1) * g;
        *v = BETA2 * *v + (1.0 - BETA2) * g * g;
        *p -= lr_t * *m / (v.sqrt() + EPSILON);
    }
}
