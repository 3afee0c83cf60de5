use std::fmt;
use std::path::PathBuf;

use crate::config::LabelConfig;
use crate::error::{PipelineError, Result};
use crate::logging::StageLog;
use crate::model::ModelArtifact;
use crate::record::Label;
use crate::vectorize::{CsrMatrix, Vocabulary};

/// Result for the first row of the scored matrix, plus every row's output.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: Label,
    pub class_name: String,
    /// Larger of the two class probabilities; not a calibrated correctness measure.
    pub confidence: f64,
    pub rows: Vec<(Label, f64)>,
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Confidence: {:.2})", self.class_name, self.confidence)
    }
}

pub struct Predictor<'a> {
    model_path: PathBuf,
    class_a_name: String,
    class_b_name: String,
    log: &'a dyn StageLog,
}

impl<'a> Predictor<'a> {
    pub fn new(model_path: impl Into<PathBuf>, labels: &LabelConfig, log: &'a dyn StageLog) -> Self {
        Self {
            model_path: model_path.into(),
            class_a_name: labels.class_a_name.clone(),
            class_b_name: labels.class_b_name.clone(),
            log,
        }
    }

    fn class_name(&self, label: Label) -> &str {
        match label {
            Label::ClassA => &self.class_a_name,
            Label::ClassB => &self.class_b_name,
        }
    }

    pub fn load(&self) -> Result<ModelArtifact> {
        ModelArtifact::load(&self.model_path).inspect_err(|err| {
            self.log.error(&format!("cannot load model: {err}"));
        })
    }

    pub fn predict(&self, features: &CsrMatrix) -> Result<Prediction> {
        let artifact = self.load()?;
        self.predict_with(&artifact, features)
    }

    /// Score new text through the persisted vocabulary.
    pub fn predict_text<S: AsRef<str>>(&self, vocabulary: &Vocabulary, docs: &[S]) -> Result<Prediction> {
        self.predict(&vocabulary.transform(docs))
    }

    pub fn predict_with(&self, artifact: &ModelArtifact, features: &CsrMatrix) -> Result<Prediction> {
        if features.cols != artifact.columns {
            let err = PipelineError::DimensionMismatch {
                expected: artifact.columns,
                actual: features.cols,
            };
            self.log.error(&format!("prediction aborted: {err}"));
            return Err(err);
        }
        if features.rows == 0 {
            let err = PipelineError::NoInput("no rows to predict".to_string());
            self.log.error(&err.to_string());
            return Err(err);
        }

        let rows: Vec<(Label, f64)> = (0..features.rows)
            .map(|i| artifact.model.predict_row(features, i))
            .collect();
        let (label, confidence) = rows[0];
        let prediction = Prediction {
            label,
            class_name: self.class_name(label).to_string(),
            confidence,
            rows,
        };
        self.log.info(&format!(
            "scored {} rows; first row: {prediction}",
            prediction.rows.len()
        ));
        Ok(prediction)
    }
}
