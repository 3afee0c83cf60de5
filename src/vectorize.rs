//! # TF-IDF Features
//!
//! Fits a bounded vocabulary over the cleaned corpus and turns each row into
//! an L2-normalized TF-IDF vector. The fitted [`Vocabulary`] travels with the
//! matrix so new text can be projected into the same column space.
//!
//! Column identity is deterministic: the `max_features` most frequent terms
//! win, ties go to the lexicographically smaller term, and the kept terms are
//! laid out in lexicographic order.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::artifacts;
use crate::config::{TextField, VectorizeConfig};
use crate::error::{PipelineError, Result};
use crate::logging::StageLog;
use crate::record::CleanedRecord;
use crate::text::is_stopword;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("token regex"));

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    TOKEN_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|t| !is_stopword(t))
}

/// Compressed sparse row matrix of `f64`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsrMatrix {
    pub rows: usize,
    pub cols: usize,
    pub indptr: Vec<usize>,
    pub indices: Vec<usize>,
    pub values: Vec<f64>,
}

impl CsrMatrix {
    pub fn empty(cols: usize) -> Self {
        Self {
            rows: 0,
            cols,
            indptr: vec![0],
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Append one row given as `(column, value)` pairs sorted by column.
    pub fn push_row(&mut self, entries: &[(usize, f64)]) {
        for &(col, value) in entries {
            self.indices.push(col);
            self.values.push(value);
        }
        self.indptr.push(self.indices.len());
        self.rows += 1;
    }

    pub fn row(&self, i: usize) -> (&[usize], &[f64]) {
        let (start, end) = (self.indptr[i], self.indptr[i + 1]);
        (&self.indices[start..end], &self.values[start..end])
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// New matrix holding `order`'s rows, in that order.
    pub fn select_rows(&self, order: &[usize]) -> Self {
        let mut out = Self::empty(self.cols);
        for &i in order {
            let (cols, vals) = self.row(i);
            let entries: Vec<(usize, f64)> = cols.iter().copied().zip(vals.iter().copied()).collect();
            out.push_row(&entries);
        }
        out
    }

    pub fn to_dense_row(&self, i: usize) -> Vec<f64> {
        let mut dense = vec![0.0; self.cols];
        let (cols, vals) = self.row(i);
        for (&c, &v) in cols.iter().zip(vals) {
            dense[c] = v;
        }
        dense
    }

    /// Structural consistency check, used after loading from disk.
    pub fn check(&self) -> std::result::Result<(), String> {
        if self.indptr.len() != self.rows + 1 {
            return Err(format!(
                "indptr has {} entries for {} rows",
                self.indptr.len(),
                self.rows
            ));
        }
        if self.indptr.first() != Some(&0) || self.indptr.windows(2).any(|w| w[0] > w[1]) {
            return Err("indptr is not a non-decreasing offset list from 0".to_string());
        }
        if self.indptr.last() != Some(&self.indices.len()) || self.indices.len() != self.values.len() {
            return Err("indices, values and indptr disagree on the number of entries".to_string());
        }
        if let Some(bad) = self.indices.iter().find(|&&c| c >= self.cols) {
            return Err(format!("column index {bad} out of range for {} columns", self.cols));
        }
        Ok(())
    }
}

/// Fitted column space: one term and one IDF weight per column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    pub terms: Vec<String>,
    pub idf: Vec<f64>,
}

impl Vocabulary {
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Project documents into this column space. Unknown terms are ignored.
    pub fn transform<S: AsRef<str>>(&self, docs: &[S]) -> CsrMatrix {
        let index: HashMap<&str, usize> = self
            .terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.as_str(), i))
            .collect();

        let mut matrix = CsrMatrix::empty(self.len());
        for doc in docs {
            let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
            for token in tokenize(doc.as_ref()) {
                if let Some(&col) = index.get(token.as_str()) {
                    *counts.entry(col).or_insert(0.0) += 1.0;
                }
            }
            let mut entries: Vec<(usize, f64)> = counts
                .into_iter()
                .map(|(col, tf)| (col, tf * self.idf[col]))
                .collect();
            let norm = entries.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
            if norm > 0.0 {
                for (_, v) in entries.iter_mut() {
                    *v /= norm;
                }
            }
            matrix.push_row(&entries);
        }
        matrix
    }
}

/// The persisted feature artifact: matrix rows in cleaned-table order plus
/// the vocabulary that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    pub text_field: TextFieldName,
    pub vocabulary: Vocabulary,
    pub matrix: CsrMatrix,
}

/// Serialized form of [`TextField`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextFieldName {
    CleanedTitle,
    CleanedUrl,
    Combined,
}

impl From<TextField> for TextFieldName {
    fn from(field: TextField) -> Self {
        match field {
            TextField::CleanedTitle => TextFieldName::CleanedTitle,
            TextField::CleanedUrl => TextFieldName::CleanedUrl,
            TextField::Combined => TextFieldName::Combined,
        }
    }
}

impl FeatureMatrix {
    pub fn rows(&self) -> usize {
        self.matrix.rows
    }

    pub fn columns(&self) -> usize {
        self.matrix.cols
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        artifacts::json::write_json(path, self)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let features: FeatureMatrix = artifacts::json::read_json(path, "feature matrix")?;
        features
            .matrix
            .check()
            .map_err(|reason| PipelineError::validation(path, reason))?;
        if features.vocabulary.terms.len() != features.matrix.cols
            || features.vocabulary.idf.len() != features.matrix.cols
        {
            return Err(PipelineError::validation(
                path,
                format!(
                    "vocabulary has {} terms and {} weights for {} columns",
                    features.vocabulary.terms.len(),
                    features.vocabulary.idf.len(),
                    features.matrix.cols
                ),
            ));
        }
        Ok(features)
    }
}

pub fn document_text(record: &CleanedRecord, field: TextField) -> String {
    match field {
        TextField::CleanedTitle => record.cleaned_title.clone(),
        TextField::CleanedUrl => record.cleaned_url.clone(),
        TextField::Combined => {
            let mut text = record.cleaned_title.clone();
            if !record.cleaned_url.is_empty() {
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(&record.cleaned_url);
            }
            text
        }
    }
}

#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    max_features: usize,
}

impl TfidfVectorizer {
    pub fn new(max_features: usize) -> Self {
        Self { max_features }
    }

    pub fn fit<S: AsRef<str>>(&self, docs: &[S]) -> Result<Vocabulary> {
        if docs.is_empty() {
            return Err(PipelineError::NoInput("no documents to vectorize".to_string()));
        }

        let mut term_counts: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for doc in docs {
            let mut seen: HashSet<String> = HashSet::new();
            for token in tokenize(doc.as_ref()) {
                *term_counts.entry(token.clone()).or_insert(0) += 1;
                seen.insert(token);
            }
            for token in seen {
                *doc_freq.entry(token).or_insert(0) += 1;
            }
        }
        if term_counts.is_empty() {
            return Err(PipelineError::NoInput(format!(
                "all {} documents are empty after tokenization",
                docs.len()
            )));
        }

        let mut ranked: Vec<(String, usize)> = term_counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(self.max_features.max(1));

        let mut terms: Vec<String> = ranked.into_iter().map(|(t, _)| t).collect();
        terms.sort();

        let n = docs.len() as f64;
        let idf = terms
            .iter()
            .map(|t| {
                let df = doc_freq.get(t).copied().unwrap_or(0) as f64;
                ((1.0 + n) / (1.0 + df)).ln() + 1.0
            })
            .collect();

        Ok(Vocabulary { terms, idf })
    }

    pub fn fit_transform<S: AsRef<str>>(&self, docs: &[S]) -> Result<(Vocabulary, CsrMatrix)> {
        let vocabulary = self.fit(docs)?;
        let matrix = vocabulary.transform(docs);
        Ok((vocabulary, matrix))
    }
}

pub struct Vectorizer<'a> {
    settings: VectorizeConfig,
    output: PathBuf,
    log: &'a dyn StageLog,
}

impl<'a> Vectorizer<'a> {
    pub fn new(settings: VectorizeConfig, output: impl Into<PathBuf>, log: &'a dyn StageLog) -> Self {
        Self {
            settings,
            output: output.into(),
            log,
        }
    }

    /// Fit over `records` and persist the result. Row `i` of the matrix is
    /// record `i`.
    pub fn vectorize(&self, records: &[CleanedRecord]) -> Result<FeatureMatrix> {
        let docs: Vec<String> = records
            .iter()
            .map(|r| document_text(r, self.settings.text_field))
            .collect();
        let (vocabulary, matrix) = TfidfVectorizer::new(self.settings.max_features)
            .fit_transform(&docs)
            .inspect_err(|err| self.log.error(&format!("vectorization failed: {err}")))?;

        let features = FeatureMatrix {
            text_field: self.settings.text_field.into(),
            vocabulary,
            matrix,
        };
        features
            .save(&self.output)
            .inspect_err(|err| self.log.error(&format!("failed to save features: {err}")))?;
        self.log.info(&format!(
            "vectorized {} documents with {} features ({} non-zero) and saved to {}",
            features.rows(),
            features.columns(),
            features.matrix.nnz(),
            self.output.display()
        ));
        Ok(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemoryLog;
    use tempfile::tempdir;

    fn settings(max_features: usize) -> VectorizeConfig {
        VectorizeConfig {
            max_features,
            text_field: TextField::CleanedTitle,
        }
    }

    #[test]
    fn vocabulary_is_sorted_and_bounded_with_stable_ties() {
        let docs = ["zeta alpha beta", "beta gamma", "delta"];
        let vocab = TfidfVectorizer::new(2).fit(&docs).expect("fit");
        // beta appears twice; alpha wins the tie among single-count terms.
        assert_eq!(vocab.terms, vec!["alpha".to_string(), "beta".to_string()]);
    }

    #[test]
    fn rows_are_l2_normalized_and_empty_rows_stay_zero() {
        let docs = ["senate vote senate", "", "bread recipe"];
        let (vocab, matrix) = TfidfVectorizer::new(10).fit_transform(&docs).expect("fit");
        assert_eq!(matrix.rows, 3);
        assert_eq!(matrix.cols, vocab.len());
        for i in [0, 2] {
            let (_, vals) = matrix.row(i);
            let norm: f64 = vals.iter().map(|v| v * v).sum::<f64>().sqrt();
            assert!((norm - 1.0).abs() < 1e-9);
        }
        assert!(matrix.row(1).0.is_empty());
    }

    #[test]
    fn idf_is_smoothed() {
        let docs = ["common rare", "common"];
        let vocab = TfidfVectorizer::new(10).fit(&docs).expect("fit");
        let common = vocab.terms.iter().position(|t| t == "common").expect("common");
        let rare = vocab.terms.iter().position(|t| t == "rare").expect("rare");
        assert!((vocab.idf[common] - 1.0).abs() < 1e-12);
        assert!((vocab.idf[rare] - ((3.0f64 / 2.0).ln() + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn repeated_tokens_count_once_per_document() {
        let docs = ["vote vote vote", "vote recipe"];
        let vocab = TfidfVectorizer::new(10).fit(&docs).expect("fit");
        let vote = vocab.terms.iter().position(|t| t == "vote").expect("vote");
        assert!((vocab.idf[vote] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_corpus_is_rejected() {
        let none: [&str; 0] = [];
        let err = TfidfVectorizer::new(10).fit(&none).expect_err("empty");
        assert_eq!(err.kind(), "no_input");
        let err = TfidfVectorizer::new(10).fit(&["", "  ", "a"]).expect_err("blank");
        assert_eq!(err.kind(), "no_input");
    }

    #[test]
    fn transform_reuses_fitted_columns() {
        let (vocab, _) = TfidfVectorizer::new(10)
            .fit_transform(&["climate policy", "banana bread"])
            .expect("fit");
        let fresh = vocab.transform(&["climate unknownword"]);
        assert_eq!(fresh.cols, vocab.len());
        let climate = vocab.terms.iter().position(|t| t == "climate").expect("climate");
        assert_eq!(fresh.row(0).0, &[climate]);
    }

    #[test]
    fn persisted_features_reload_and_validate() {
        let dir = tempdir().expect("tempdir");
        let output = dir.path().join("tfidf_features.pkl");
        let log = MemoryLog::new();
        let records: Vec<CleanedRecord> = ["senate vote", "bread recipe"]
            .iter()
            .map(|t| {
                CleanedRecord::from_history(
                    crate::record::HistoryRecord {
                        url: "https://example.com".to_string(),
                        title: None,
                        visit_time: None,
                    },
                    t.to_string(),
                    String::new(),
                )
            })
            .collect();
        let features = Vectorizer::new(settings(500), &output, &log)
            .vectorize(&records)
            .expect("vectorize");
        assert_eq!(FeatureMatrix::load(&output).expect("load"), features);

        let mut broken = features.clone();
        broken.matrix.indices[0] = 99;
        artifacts::json::write_json(&output, &broken).expect("write");
        let err = FeatureMatrix::load(&output).expect_err("invalid");
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn combined_field_joins_title_and_url() {
        let record = CleanedRecord::from_history(
            crate::record::HistoryRecord {
                url: "x".to_string(),
                title: None,
                visit_time: None,
            },
            "senate".to_string(),
            "vote".to_string(),
        );
        assert_eq!(document_text(&record, TextField::Combined), "senate vote");
        assert_eq!(document_text(&record, TextField::CleanedUrl), "vote");
    }
}
