//! # Keyword Labeling
//!
//! A deliberately naive rule: class A keywords are checked first, then class B,
//! and anything else defaults to class B. It is a noisy proxy for the real
//! target and is kept as-is.

use std::path::PathBuf;

use crate::artifacts;
use crate::config::LabelConfig;
use crate::error::Result;
use crate::logging::StageLog;
use crate::record::{CleanedRecord, Label};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleMatch {
    ClassA,
    ClassB,
    /// Neither keyword set matched.
    Default,
}

impl RuleMatch {
    pub fn label(self) -> Label {
        match self {
            RuleMatch::ClassA => Label::ClassA,
            RuleMatch::ClassB | RuleMatch::Default => Label::ClassB,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordRule {
    class_a: Vec<String>,
    class_b: Vec<String>,
}

impl KeywordRule {
    pub fn new<I, S>(class_a: I, class_b: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let lower = |it: I| -> Vec<String> { it.into_iter().map(|s| s.as_ref().to_lowercase()).collect() };
        Self {
            class_a: lower(class_a),
            class_b: lower(class_b),
        }
    }

    pub fn from_config(cfg: &LabelConfig) -> Self {
        Self::new(&cfg.class_a_keywords, &cfg.class_b_keywords)
    }

    /// Which branch of the rule `text` falls into; first match wins.
    pub fn classify(&self, text: &str) -> RuleMatch {
        let text = text.to_lowercase();
        if self.class_a.iter().any(|k| text.contains(k.as_str())) {
            RuleMatch::ClassA
        } else if self.class_b.iter().any(|k| text.contains(k.as_str())) {
            RuleMatch::ClassB
        } else {
            RuleMatch::Default
        }
    }

    pub fn label_text(&self, text: &str) -> Label {
        self.classify(text).label()
    }

    /// Cleaned title, falling back to the raw title when cleaning emptied it.
    pub fn classify_record(&self, record: &CleanedRecord) -> RuleMatch {
        let text = if record.cleaned_title.is_empty() {
            record.title.as_deref().unwrap_or("")
        } else {
            record.cleaned_title.as_str()
        };
        self.classify(text)
    }

    pub fn label_record(&self, record: &CleanedRecord) -> Label {
        self.classify_record(record).label()
    }

    pub fn label_all(&self, records: &[CleanedRecord]) -> Vec<Label> {
        records.iter().map(|r| self.label_record(r)).collect()
    }
}

pub struct Labeler<'a> {
    rule: KeywordRule,
    output: PathBuf,
    log: &'a dyn StageLog,
}

impl<'a> Labeler<'a> {
    pub fn new(rule: KeywordRule, output: impl Into<PathBuf>, log: &'a dyn StageLog) -> Self {
        Self {
            rule,
            output: output.into(),
            log,
        }
    }

    /// Label every row and persist the single-column table, same order as `records`.
    pub fn label(&self, records: &[CleanedRecord]) -> Result<Vec<Label>> {
        let matches: Vec<RuleMatch> = records.iter().map(|r| self.rule.classify_record(r)).collect();
        let labels: Vec<Label> = matches.iter().map(|m| m.label()).collect();
        artifacts::csv::write_labels(&self.output, &labels).inspect_err(|err| {
            self.log
                .error(&format!("failed to write {}: {err}", self.output.display()));
        })?;
        let count = |kind: RuleMatch| matches.iter().filter(|m| **m == kind).count();
        self.log.info(&format!(
            "labeled {} rows ({} class A, {} class B, {} defaulted) into {}",
            labels.len(),
            count(RuleMatch::ClassA),
            count(RuleMatch::ClassB),
            count(RuleMatch::Default),
            self.output.display()
        ));
        Ok(labels)
    }
}
