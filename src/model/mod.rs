//! # Classifier
//!
//! Training, persistence, and prediction for the binary leaning model. The
//! model file is a single canonical artifact, overwritten by each training
//! run.

pub mod logistic;
pub mod predict;
pub mod train;

use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::artifacts;
use crate::error::{PipelineError, Result};

pub use logistic::{FitParams, LogisticRegression};
pub use predict::{Prediction, Predictor};
pub use train::{TrainOutcome, Trainer};

/// What gets written to `models/logistic_regression.pkl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub classes: [u8; 2],
    pub columns: usize,
    pub model: LogisticRegression,
    pub accuracy: f64,
    pub train_rows: usize,
    pub test_rows: usize,
    pub seed: u64,
    pub max_iter: usize,
    pub config_hash: String,
    pub trained_at: NaiveDateTime,
}

impl ModelArtifact {
    pub fn save(&self, path: &Path) -> Result<()> {
        artifacts::json::write_json(path, self)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PipelineError::not_found(
                "trained model (train the model first)",
                path,
            ));
        }
        let artifact: ModelArtifact = artifacts::json::read_json(path, "model")?;
        if artifact.model.weights.len() != artifact.columns {
            return Err(PipelineError::validation(
                path,
                format!(
                    "model has {} weights for {} columns",
                    artifact.model.weights.len(),
                    artifact.columns
                ),
            ));
        }
        if artifact.classes != [0, 1] {
            return Err(PipelineError::validation(
                path,
                format!("unexpected classes {:?}", artifact.classes),
            ));
        }
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn artifact(columns: usize, weights: usize) -> ModelArtifact {
        ModelArtifact {
            classes: [0, 1],
            columns,
            model: LogisticRegression::zeros(weights),
            accuracy: 0.5,
            train_rows: 8,
            test_rows: 2,
            seed: 42,
            max_iter: 10,
            config_hash: "hash".to_string(),
            trained_at: chrono::Utc::now().naive_utc(),
        }
    }

    #[test]
    fn missing_model_is_not_found() {
        let dir = tempdir().expect("tempdir");
        let err = ModelArtifact::load(&dir.path().join("models/logistic_regression.pkl"))
            .expect_err("missing");
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn weight_count_must_match_columns() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("model.pkl");
        artifact(3, 2).save(&path).expect("save");
        let err = ModelArtifact::load(&path).expect_err("invalid");
        assert_eq!(err.kind(), "validation");

        let good = artifact(3, 3);
        good.save(&path).expect("save");
        assert_eq!(ModelArtifact::load(&path).expect("load"), good);
    }
}
