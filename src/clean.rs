//! # History Cleaning
//!
//! Concatenates raw tables in the order given, normalizes title and url, and
//! drops rows left without any text. The surviving order is the canonical row
//! order every later stage aligns against.

use std::path::{Path, PathBuf};

use crate::artifacts;
use crate::error::{PipelineError, Result};
use crate::logging::StageLog;
use crate::record::{CleanedRecord, HistoryRecord};
use crate::text::clean_text;

#[derive(Debug, Clone)]
pub struct CleanOutcome {
    pub records: Vec<CleanedRecord>,
    pub output: PathBuf,
    pub loaded: usize,
    pub dropped: usize,
}

pub struct Cleaner<'a> {
    output: PathBuf,
    log: &'a dyn StageLog,
}

pub fn clean_record(record: HistoryRecord) -> CleanedRecord {
    let cleaned_title = clean_text(record.title.as_deref());
    let cleaned_url = clean_text(Some(&record.url));
    CleanedRecord::from_history(record, cleaned_title, cleaned_url)
}

impl<'a> Cleaner<'a> {
    pub fn new(output: impl Into<PathBuf>, log: &'a dyn StageLog) -> Self {
        Self {
            output: output.into(),
            log,
        }
    }

    /// Load every readable input in order. Missing files are skipped with a
    /// warning; having none at all is fatal.
    fn load_inputs(&self, inputs: &[PathBuf]) -> Result<Vec<HistoryRecord>> {
        let mut all = Vec::new();
        let mut readable = 0usize;
        for path in inputs {
            match artifacts::csv::read_history(path) {
                Ok(records) => {
                    self.log
                        .info(&format!("loaded {} with {} records", path.display(), records.len()));
                    readable += 1;
                    all.extend(records);
                }
                Err(PipelineError::NotFound { .. }) => {
                    self.log
                        .warn(&format!("input file {} not found, skipping", path.display()));
                }
                Err(err) => {
                    self.log
                        .error(&format!("failed to load {}: {err}", path.display()));
                    return Err(err);
                }
            }
        }
        if readable == 0 {
            let err = PipelineError::NoInput(format!(
                "none of {} raw history file(s) could be read",
                inputs.len()
            ));
            self.log.error(&err.to_string());
            return Err(err);
        }
        Ok(all)
    }

    pub fn clean(&self, inputs: &[PathBuf]) -> Result<CleanOutcome> {
        let raw = self.load_inputs(inputs)?;
        let loaded = raw.len();
        let records: Vec<CleanedRecord> = raw
            .into_iter()
            .map(clean_record)
            .filter(CleanedRecord::has_signal)
            .collect();
        let dropped = loaded - records.len();
        if records.is_empty() {
            let err = PipelineError::NoInput(format!(
                "all {loaded} history record(s) were dropped without text"
            ));
            self.log.error(&err.to_string());
            return Err(err);
        }

        artifacts::csv::write_cleaned(&self.output, &records).inspect_err(|err| {
            self.log
                .error(&format!("failed to write {}: {err}", self.output.display()));
        })?;
        self.log.info(&format!(
            "saved cleaned history to {} with {} records ({} dropped without text)",
            self.output.display(),
            records.len(),
            dropped
        ));

        Ok(CleanOutcome {
            records,
            output: self.output.clone(),
            loaded,
            dropped,
        })
    }

    pub fn output(&self) -> &Path {
        &self.output
    }
}
