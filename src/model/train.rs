use std::path::PathBuf;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::config::TrainConfig;
use crate::error::{PipelineError, Result};
use crate::logging::StageLog;
use crate::model::logistic::{self, FitParams, LogisticRegression};
use crate::model::ModelArtifact;
use crate::record::Label;
use crate::vectorize::CsrMatrix;

#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub artifact: ModelArtifact,
    pub accuracy: f64,
    pub model_path: PathBuf,
}

/// Row indices for the held-out and training partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Seeded shuffle, then the first `ceil(n * test_fraction)` rows are held out.
/// Both partitions keep at least one row.
pub fn split_rows(n: usize, test_fraction: f64, seed: u64) -> Split {
    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let wanted = (n as f64 * test_fraction).ceil() as usize;
    let test_rows = wanted.clamp(1, n.saturating_sub(1).max(1));
    let train = order.split_off(test_rows.min(n));
    Split { train, test: order }
}

pub struct Trainer<'a> {
    settings: TrainConfig,
    model_path: PathBuf,
    config_hash: String,
    log: &'a dyn StageLog,
}

impl<'a> Trainer<'a> {
    pub fn new(
        settings: TrainConfig,
        model_path: impl Into<PathBuf>,
        config_hash: impl Into<String>,
        log: &'a dyn StageLog,
    ) -> Self {
        Self {
            settings,
            model_path: model_path.into(),
            config_hash: config_hash.into(),
            log,
        }
    }

    /// Fit on the training partition, score the held-out one, persist the
    /// model. Accuracy is reported, never used as a gate.
    pub fn train(&self, features: &CsrMatrix, labels: &[Label]) -> Result<TrainOutcome> {
        if features.rows != labels.len() {
            let err = PipelineError::Alignment {
                features: features.rows,
                labels: labels.len(),
            };
            self.log.error(&format!("training aborted: {err}"));
            return Err(err);
        }
        if features.rows < 2 {
            let err = PipelineError::NoInput(format!(
                "need at least 2 labeled rows to train, got {}",
                features.rows
            ));
            self.log.error(&err.to_string());
            return Err(err);
        }

        let split = split_rows(features.rows, self.settings.test_fraction, self.settings.seed);
        let x_train = features.select_rows(&split.train);
        let x_test = features.select_rows(&split.test);
        let y_train: Vec<Label> = split.train.iter().map(|&i| labels[i]).collect();
        let y_test: Vec<Label> = split.test.iter().map(|&i| labels[i]).collect();
        self.log.info(&format!(
            "split data into train ({} samples) and test ({} samples) with seed {}",
            split.train.len(),
            split.test.len(),
            self.settings.seed
        ));

        let params = FitParams {
            max_iter: self.settings.max_iter,
            learning_rate: self.settings.learning_rate,
        };
        let estimator = logistic::fit_estimator(&x_train, &y_train, params)
            .inspect_err(|err| self.log.error(&format!("training failed: {err}")))?;
        let model = LogisticRegression::from_estimator(&estimator, features.cols)?;
        self.log.info(&format!(
            "model training completed (max {} iterations, learning rate {})",
            params.max_iter, params.learning_rate
        ));

        let accuracy = logistic::accuracy(&logistic::estimator_labels(&estimator, &x_test)?, &y_test);
        self.log
            .info(&format!("model accuracy on test set: {accuracy:.2}"));

        let artifact = ModelArtifact {
            classes: [0, 1],
            columns: features.cols,
            model,
            accuracy,
            train_rows: split.train.len(),
            test_rows: split.test.len(),
            seed: self.settings.seed,
            max_iter: params.max_iter,
            config_hash: self.config_hash.clone(),
            trained_at: chrono::Utc::now().naive_utc(),
        };
        artifact.save(&self.model_path).inspect_err(|err| {
            self.log.error(&format!(
                "failed to save model to {}: {err}",
                self.model_path.display()
            ));
        })?;
        self.log
            .info(&format!("saved model to {}", self.model_path.display()));

        Ok(TrainOutcome {
            artifact,
            accuracy,
            model_path: self.model_path.clone(),
        })
    }
}
