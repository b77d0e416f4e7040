//! Candidate specifications and fitted preprocessing + estimator pipelines.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::domain::{N_CLASSES, Prediction, PriorityLabel};
use crate::features::FeatureMatrix;
use crate::models::argmax;
use crate::models::boosting::{BoostingParams, GradientBoosting};
use crate::models::forest::{ForestParams, RandomForest};
use crate::models::mlp::{MlpParams, NeuralNetwork};
use crate::models::preprocess::{MedianImputer, StandardScaler};
use crate::models::svm::{LinearSvm, SvmParams};
use crate::train::budget::{Deadline, FitError};

/// Estimator family plus hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "params", rename_all = "snake_case")]
pub enum EstimatorSpec {
    RandomForest(ForestParams),
    GradientBoosting(BoostingParams),
    LinearSvm(SvmParams),
    NeuralNetwork(MlpParams),
}

/// One entry of the candidate bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name: String,
    /// Standardize (without centering) after imputation.
    pub scale: bool,
    pub estimator: EstimatorSpec,
}

/// The fixed candidate bank, in declaration order.
pub fn default_bank() -> Vec<CandidateSpec> {
    vec![
        CandidateSpec {
            name: "RandomForest".to_string(),
            scale: false,
            estimator: EstimatorSpec::RandomForest(ForestParams::default()),
        },
        CandidateSpec {
            name: "GradientBoosting".to_string(),
            scale: false,
            estimator: EstimatorSpec::GradientBoosting(BoostingParams::default()),
        },
        CandidateSpec {
            name: "LinearSvm".to_string(),
            scale: true,
            estimator: EstimatorSpec::LinearSvm(SvmParams::default()),
        },
        CandidateSpec {
            name: "NeuralNetwork".to_string(),
            scale: true,
            estimator: EstimatorSpec::NeuralNetwork(MlpParams::default()),
        },
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "model", rename_all = "snake_case")]
pub enum FittedEstimator {
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
    LinearSvm(LinearSvm),
    NeuralNetwork(NeuralNetwork),
}

impl FittedEstimator {
    pub fn predict_proba(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        match self {
            FittedEstimator::RandomForest(m) => m.predict_proba(x),
            FittedEstimator::GradientBoosting(m) => m.predict_proba(x),
            FittedEstimator::LinearSvm(m) => m.predict_proba(x),
            FittedEstimator::NeuralNetwork(m) => m.predict_proba(x),
        }
    }
}

/// Imputer + optional scaler + estimator, fitted together on one training set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    pub imputer: MedianImputer,
    pub scaler: Option<StandardScaler>,
    pub estimator: FittedEstimator,
}

impl CandidateSpec {
    /// Fit a fresh pipeline on `x` / `y` under `deadline`.
    pub fn fit(
        &self,
        x: &FeatureMatrix,
        y: &[PriorityLabel],
        seed: u64,
        deadline: &Deadline,
    ) -> Result<FittedPipeline, FitError> {
        if x.is_empty() || y.is_empty() {
            return Err(FitError::EmptyTrainingSet);
        }
        let imputer = MedianImputer::fit(x);
        let dense = imputer.transform(x)?;
        let (scaler, dense) = if self.scale {
            let scaler = StandardScaler::fit(&dense, false);
            let scaled = scaler.transform(&dense)?;
            (Some(scaler), scaled)
        } else {
            (None, dense)
        };
        let y: Vec<usize> = y.iter().map(|l| l.index()).collect();

        let estimator = match &self.estimator {
            EstimatorSpec::RandomForest(p) => FittedEstimator::RandomForest(RandomForest::fit(
                &dense, &y, N_CLASSES, p, seed, deadline,
            )?),
            EstimatorSpec::GradientBoosting(p) => FittedEstimator::GradientBoosting(
                GradientBoosting::fit(&dense, &y, N_CLASSES, p, seed, deadline)?,
            ),
            EstimatorSpec::LinearSvm(p) => FittedEstimator::LinearSvm(LinearSvm::fit(
                &dense, &y, N_CLASSES, p, seed, deadline,
            )?),
            EstimatorSpec::NeuralNetwork(p) => FittedEstimator::NeuralNetwork(
                NeuralNetwork::fit(&dense, &y, N_CLASSES, p, seed, deadline)?,
            ),
        };

        Ok(FittedPipeline {
            imputer,
            scaler,
            estimator,
        })
    }
}

impl FittedPipeline {
    /// Class probabilities (`n x N_CLASSES`).
    pub fn predict_proba(&self, x: &FeatureMatrix) -> Result<DMatrix<f64>, FitError> {
        let dense = self.imputer.transform(x)?;
        let dense = match &self.scaler {
            Some(scaler) => scaler.transform(&dense)?,
            None => dense,
        };
        Ok(self.estimator.predict_proba(&dense))
    }

    /// Most probable label and its probability, per row.
    pub fn predict(&self, x: &FeatureMatrix) -> Result<Vec<Prediction>, FitError> {
        let proba = self.predict_proba(x)?;
        (0..proba.nrows())
            .map(|i| {
                let k = argmax(proba.row(i).iter().copied());
                let label = PriorityLabel::from_index(k).ok_or_else(|| {
                    FitError::Numerical(format!("predicted class {k} outside label space"))
                })?;
                Ok(Prediction {
                    label,
                    confidence: proba[(i, k)].clamp(0.0, 1.0),
                })
            })
            .collect()
    }

    pub fn n_features(&self) -> usize {
        self.imputer.n_features()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::build_features;
    use crate::labels::encode_labels;
    use crate::domain::LabelingPolicy;
    use crate::scoring::{ScoringConfig, score_catalog};

    fn catalog_xy(n: usize, seed: u64) -> (FeatureMatrix, Vec<PriorityLabel>) {
        let records = crate::data::sample::generate_catalog(n, seed);
        let scores = score_catalog(&records, &ScoringConfig::default());
        let totals: Vec<f64> = scores.iter().map(|s| s.total).collect();
        (
            build_features(&records),
            encode_labels(&totals, LabelingPolicy::Thresholds),
        )
    }

    #[test]
    fn bank_order_is_fixed() {
        let names: Vec<String> = default_bank().into_iter().map(|c| c.name).collect();
        assert_eq!(
            names,
            ["RandomForest", "GradientBoosting", "LinearSvm", "NeuralNetwork"]
        );
    }

    #[test]
    fn pipeline_predicts_every_row_with_valid_confidence() {
        let (x, y) = catalog_xy(120, 5);
        let spec = CandidateSpec {
            name: "tiny-forest".to_string(),
            scale: true,
            estimator: EstimatorSpec::RandomForest(ForestParams {
                n_trees: 10,
                ..ForestParams::default()
            }),
        };
        let pipeline = spec.fit(&x, &y, 42, &Deadline::unbounded()).unwrap();
        assert_eq!(pipeline.n_features(), crate::features::N_FEATURES);

        let preds = pipeline.predict(&x).unwrap();
        assert_eq!(preds.len(), 120);
        assert!(preds.iter().all(|p| p.confidence > 0.0 && p.confidence <= 1.0));
    }

    #[test]
    fn width_mismatch_is_reported() {
        let (x, y) = catalog_xy(40, 1);
        let spec = CandidateSpec {
            name: "svm".to_string(),
            scale: true,
            estimator: EstimatorSpec::LinearSvm(SvmParams {
                epochs: 2,
                ..SvmParams::default()
            }),
        };
        let pipeline = spec.fit(&x, &y, 0, &Deadline::unbounded()).unwrap();
        let narrow = FeatureMatrix::from_rows(3, vec![vec![None; 3]]).unwrap();
        assert!(matches!(
            pipeline.predict(&narrow),
            Err(FitError::WidthMismatch { .. })
        ));
    }
}
