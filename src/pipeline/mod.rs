//! # Pipeline Module
//!
//! Runs extraction, cleaning, labeling, vectorizing, training, and prediction
//! in sequence. Each stage finishes before the next starts; the first error
//! stops the run and leaves earlier artifacts where they are.

use std::path::PathBuf;
use std::sync::Arc;

use crate::artifacts;
use crate::clean::{CleanOutcome, Cleaner};
use crate::config::{ArtifactPaths, LoadedConfig};
use crate::error::{PipelineError, Result};
use crate::extract::{Browser, BrowserChoice, Extractor, HistoryFilter, Roots};
use crate::label::{KeywordRule, Labeler};
use crate::logging::{StageLog, TracingLog};
use crate::model::{Prediction, Predictor, TrainOutcome, Trainer};
use crate::record::{CleanedRecord, Label};
use crate::text;
use crate::vectorize::{FeatureMatrix, Vectorizer};

/// Where the cleaned table comes from. Resolved once by the caller instead of
/// each stage probing the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// Clean these raw tables (concatenated in order).
    RawPaths(Vec<PathBuf>),
    /// Reuse an existing cleaned table.
    CleanedPath(PathBuf),
}

impl InputSource {
    /// Prefer fresh raw tables; fall back to the canonical cleaned table.
    pub fn resolve(paths: &ArtifactPaths, raw: Vec<PathBuf>) -> Self {
        if raw.is_empty() {
            InputSource::CleanedPath(paths.cleaned.clone())
        } else {
            InputSource::RawPaths(raw)
        }
    }
}

/// One logging capability per stage.
pub struct StageLogs {
    pub extract: Arc<dyn StageLog>,
    pub clean: Arc<dyn StageLog>,
    pub label: Arc<dyn StageLog>,
    pub vectorize: Arc<dyn StageLog>,
    pub train: Arc<dyn StageLog>,
    pub predict: Arc<dyn StageLog>,
    pub pipeline: Arc<dyn StageLog>,
}

impl StageLogs {
    pub fn tracing() -> Self {
        Self {
            extract: Arc::new(TracingLog::new("extract")),
            clean: Arc::new(TracingLog::new("clean")),
            label: Arc::new(TracingLog::new("label")),
            vectorize: Arc::new(TracingLog::new("vectorize")),
            train: Arc::new(TracingLog::new("train")),
            predict: Arc::new(TracingLog::new("predict")),
            pipeline: Arc::new(TracingLog::new("pipeline")),
        }
    }

    /// Route every stage to the same sink.
    pub fn shared(log: Arc<dyn StageLog>) -> Self {
        Self {
            extract: log.clone(),
            clean: log.clone(),
            label: log.clone(),
            vectorize: log.clone(),
            train: log.clone(),
            predict: log.clone(),
            pipeline: log,
        }
    }
}

/// What a full run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub browser: Option<Browser>,
    pub raw_paths: Vec<PathBuf>,
    pub cleaned_path: PathBuf,
    pub cleaned_rows: usize,
    pub labels_path: PathBuf,
    pub class_a_rows: usize,
    pub features_path: PathBuf,
    pub feature_columns: usize,
    pub model_path: PathBuf,
    pub accuracy: f64,
    pub prediction: Prediction,
}

pub struct Pipeline<'a> {
    loaded: &'a LoadedConfig,
    paths: ArtifactPaths,
    logs: StageLogs,
    temp_dir: Option<PathBuf>,
}

impl<'a> Pipeline<'a> {
    pub fn new(loaded: &'a LoadedConfig, logs: StageLogs) -> Self {
        Self {
            loaded,
            paths: loaded.config.paths(),
            logs,
            temp_dir: None,
        }
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    pub fn extractor(&self) -> Extractor<'_> {
        let extractor = Extractor::new(&self.loaded.config, self.logs.extract.as_ref());
        match &self.temp_dir {
            Some(dir) => extractor.with_temp_dir(dir),
            None => extractor,
        }
    }

    pub fn cleaner(&self) -> Cleaner<'_> {
        Cleaner::new(&self.paths.cleaned, self.logs.clean.as_ref())
    }

    pub fn labeler(&self) -> Labeler<'_> {
        Labeler::new(
            KeywordRule::from_config(&self.loaded.config.labels),
            &self.paths.labels,
            self.logs.label.as_ref(),
        )
    }

    pub fn vectorizer(&self) -> Vectorizer<'_> {
        Vectorizer::new(
            self.loaded.config.vectorize.clone(),
            &self.paths.features,
            self.logs.vectorize.as_ref(),
        )
    }

    pub fn trainer(&self) -> Trainer<'_> {
        Trainer::new(
            self.loaded.config.train.clone(),
            &self.paths.model,
            &self.loaded.config_hash,
            self.logs.train.as_ref(),
        )
    }

    pub fn predictor(&self) -> Predictor<'_> {
        Predictor::new(
            &self.paths.model,
            &self.loaded.config.labels,
            self.logs.predict.as_ref(),
        )
    }

    /// Load or build the cleaned table for `source`.
    pub fn cleaned_records(&self, source: &InputSource) -> Result<Vec<CleanedRecord>> {
        match source {
            InputSource::RawPaths(raw) => Ok(self.cleaner().clean(raw)?.records),
            InputSource::CleanedPath(path) => {
                let records = artifacts::csv::read_cleaned(path).inspect_err(|err| {
                    self.logs.clean.error(&format!("cannot load cleaned history: {err}"));
                })?;
                self.logs.clean.info(&format!(
                    "loaded {} cleaned records from {}",
                    records.len(),
                    path.display()
                ));
                Ok(records)
            }
        }
    }

    /// Row filter from the configured extract settings.
    pub fn filter(&self) -> HistoryFilter {
        HistoryFilter::from_config(&self.loaded.config)
    }

    /// Extract `choice`'s history under `roots`, then run every later stage.
    pub fn run(&self, choice: BrowserChoice, roots: &Roots, filter: &HistoryFilter) -> Result<RunSummary> {
        self.logs.pipeline.info(&format!("extracting {choice:?} history"));
        let extracted = self.stage("extract", || self.extractor().extract(choice, roots, filter))?;
        let source = InputSource::resolve(&self.paths, vec![extracted.raw_path]);
        let mut summary = self.run_from(&source)?;
        summary.browser = Some(extracted.browser);
        Ok(summary)
    }

    /// Every stage after extraction.
    pub fn run_from(&self, source: &InputSource) -> Result<RunSummary> {
        let log = &self.logs.pipeline;

        log.info("preprocessing history");
        let records = self.stage("clean", || self.cleaned_records(source))?;

        log.info("generating labels");
        let labels = self.stage("label", || self.labeler().label(&records))?;

        log.info("vectorizing text");
        let features = self.stage("vectorize", || self.vectorizer().vectorize(&records))?;

        log.info("training logistic regression model");
        let trained = self.stage("train", || self.trainer().train(&features.matrix, &labels))?;
        log.info(&format!(
            "model trained with accuracy {:.2}, saved to {}",
            trained.accuracy,
            trained.model_path.display()
        ));

        log.info("making prediction");
        let prediction = self.stage("predict", || {
            self.predictor()
                .predict_with(&trained.artifact, &features.matrix)
        })?;
        log.info(&format!("leaning prediction: {prediction}"));

        let raw_paths = match source {
            InputSource::RawPaths(raw) => raw.clone(),
            InputSource::CleanedPath(_) => Vec::new(),
        };
        let summary = RunSummary {
            browser: None,
            raw_paths,
            cleaned_path: self.paths.cleaned.clone(),
            cleaned_rows: records.len(),
            labels_path: self.paths.labels.clone(),
            class_a_rows: labels.iter().filter(|l| **l == Label::ClassA).count(),
            features_path: self.paths.features.clone(),
            feature_columns: features.columns(),
            model_path: trained.model_path,
            accuracy: trained.accuracy,
            prediction,
        };
        log.info(&format!(
            "run finished: {} cleaned rows, {} labeled {}, {} feature columns, accuracy {:.2}",
            summary.cleaned_rows,
            summary.class_a_rows,
            self.loaded.config.labels.class_a_name,
            summary.feature_columns,
            summary.accuracy
        ));
        Ok(summary)
    }

    /// `user*_history.csv` files under the raw directory, sorted by name.
    pub fn discover_raw(&self) -> Result<Vec<PathBuf>> {
        let dir = &self.paths.raw_dir;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let entries =
            std::fs::read_dir(dir).map_err(|err| PipelineError::from_io(err, "raw directory", dir))?;
        let mut found = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_raw = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("user") && n.ends_with("_history.csv"));
            if is_raw {
                found.push(path);
            }
        }
        found.sort();
        Ok(found)
    }

    /// Clean `inputs`, or every discovered raw table when none are given.
    pub fn clean_only(&self, inputs: Vec<PathBuf>) -> Result<CleanOutcome> {
        let inputs = if inputs.is_empty() { self.discover_raw()? } else { inputs };
        self.cleaner().clean(&inputs)
    }

    pub fn label_only(&self) -> Result<Vec<Label>> {
        let records = self.cleaned_records(&InputSource::CleanedPath(self.paths.cleaned.clone()))?;
        self.labeler().label(&records)
    }

    pub fn vectorize_only(&self) -> Result<FeatureMatrix> {
        let records = self.cleaned_records(&InputSource::CleanedPath(self.paths.cleaned.clone()))?;
        self.vectorizer().vectorize(&records)
    }

    pub fn train_only(&self) -> Result<TrainOutcome> {
        let features = FeatureMatrix::load(&self.paths.features)?;
        let labels = artifacts::csv::read_labels(&self.paths.labels)?;
        self.trainer().train(&features.matrix, &labels)
    }

    /// Score `texts` through the saved vocabulary, or the saved feature rows
    /// when no text is given.
    pub fn predict_only(&self, texts: &[String]) -> Result<Prediction> {
        let features = FeatureMatrix::load(&self.paths.features)?;
        if texts.is_empty() {
            return self.predictor().predict(&features.matrix);
        }
        let docs: Vec<String> = texts.iter().map(|t| text::clean_text(Some(t))).collect();
        self.predictor().predict_text(&features.vocabulary, &docs)
    }

    fn stage<T>(&self, name: &str, run: impl FnOnce() -> Result<T>) -> Result<T> {
        run().inspect_err(|err| {
            self.logs
                .pipeline
                .error(&format!("pipeline stopped at {name} stage ({})", err.kind()));
        })
    }
}
