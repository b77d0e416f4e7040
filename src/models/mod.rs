//! Candidate estimators and the preprocessing pipeline that wraps them.
//!
//! Every estimator works on a dense, imputed `n x p` matrix and integer class
//! labels in `0..n_classes`, and exposes `predict_proba` returning an
//! `n x n_classes` matrix whose rows sum to 1.

use nalgebra::DMatrix;

use crate::train::budget::FitError;

pub mod boosting;
pub mod forest;
pub mod mlp;
pub mod pipeline;
pub mod preprocess;
pub mod svm;
pub mod tree;

pub use pipeline::{CandidateSpec, EstimatorSpec, FittedEstimator, FittedPipeline, default_bank};

/// Shape and label checks shared by all estimators.
pub(crate) fn validate_training_set(
    x: &DMatrix<f64>,
    y: &[usize],
    n_classes: usize,
) -> Result<(), FitError> {
    if x.nrows() == 0 || y.is_empty() {
        return Err(FitError::EmptyTrainingSet);
    }
    if x.nrows() != y.len() {
        return Err(FitError::InvalidParams(format!(
            "{} feature rows but {} labels",
            x.nrows(),
            y.len()
        )));
    }
    if let Some(bad) = y.iter().find(|&&k| k >= n_classes) {
        return Err(FitError::InvalidParams(format!(
            "label {bad} outside 0..{n_classes}"
        )));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(FitError::Numerical("non-finite feature value".to_string()));
    }
    Ok(())
}

/// `n / (n_present_classes * count_k)` for present classes, 0 otherwise.
pub(crate) fn balanced_class_weights(y: &[usize], n_classes: usize) -> Vec<f64> {
    let mut counts = vec![0usize; n_classes];
    for &k in y {
        counts[k] += 1;
    }
    let present = counts.iter().filter(|&&c| c > 0).count().max(1) as f64;
    let n = y.len() as f64;
    counts
        .iter()
        .map(|&c| if c > 0 { n / (present * c as f64) } else { 0.0 })
        .collect()
}

/// Numerically stable softmax; `-inf` entries get probability 0.
pub(crate) fn softmax_in_place(scores: &mut [f64]) {
    let max = scores
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        let uniform = 1.0 / scores.len().max(1) as f64;
        scores.iter_mut().for_each(|v| *v = uniform);
        return;
    }
    let mut sum = 0.0;
    for v in scores.iter_mut() {
        *v = if v.is_finite() { (*v - max).exp() } else { 0.0 };
        sum += *v;
    }
    for v in scores.iter_mut() {
        *v /= sum;
    }
}

/// Index of the largest value; ties resolve to the lowest index.
pub fn argmax(values: impl IntoIterator<Item = f64>) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (k, v) in values.into_iter().enumerate() {
        if v > best_value {
            best = k;
            best_value = v;
        }
    }
    best
}

#[cfg(test)]
pub(crate) mod test_support {
    use nalgebra::DMatrix;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal};

    /// Well-separated Gaussian clusters with centers on a circle, so each
    /// class is linearly separable from the rest. The third column is noise.
    pub fn blobs(per_class: usize, n_classes: usize, seed: u64) -> (DMatrix<f64>, Vec<usize>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Normal::new(0.0, 0.5).unwrap();
        let n = per_class * n_classes;
        let mut data = Vec::with_capacity(n * 3);
        let mut y = Vec::with_capacity(n);
        for i in 0..n {
            let k = i % n_classes;
            let angle = std::f64::consts::TAU * k as f64 / n_classes as f64;
            data.push(4.0 * angle.cos() + noise.sample(&mut rng));
            data.push(4.0 * angle.sin() + noise.sample(&mut rng));
            data.push(noise.sample(&mut rng));
            y.push(k);
        }
        (DMatrix::from_row_slice(n, 3, &data), y)
    }

    /// [`blobs`] as a feature matrix with priority labels.
    pub fn blob_features(
        per_class: usize,
        n_classes: usize,
        seed: u64,
    ) -> (crate::features::FeatureMatrix, Vec<crate::domain::PriorityLabel>) {
        let (x, y) = blobs(per_class, n_classes, seed);
        let rows = (0..x.nrows())
            .map(|i| x.row(i).iter().map(|v| Some(*v)).collect())
            .collect();
        let labels = y
            .iter()
            .map(|&k| crate::domain::PriorityLabel::from_index(k).unwrap())
            .collect();
        (
            crate::features::FeatureMatrix::from_rows(x.ncols(), rows).unwrap(),
            labels,
        )
    }
}
