use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::Result;

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractConfig {
    pub limit: usize,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub end_date: Option<NaiveDateTime>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LabelConfig {
    pub class_a_name: String,
    pub class_b_name: String,
    pub class_a_keywords: Vec<String>,
    pub class_b_keywords: Vec<String>,
}

/// Which cleaned column feeds the vectorizer.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TextField {
    CleanedTitle,
    CleanedUrl,
    Combined,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorizeConfig {
    pub max_features: usize,
    pub text_field: TextField,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrainConfig {
    pub test_fraction: f64,
    pub seed: u64,
    pub max_iter: usize,
    pub learning_rate: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub models_dir: PathBuf,
    pub logs_dir: PathBuf,
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
    pub extract: ExtractConfig,
    pub labels: LabelConfig,
    pub vectorize: VectorizeConfig,
    pub train: TrainConfig,
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub config_hash: String,
}

/// Canonical artifact locations, derived once from the configured roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub raw_dir: PathBuf,
    pub cleaned: PathBuf,
    pub labels: PathBuf,
    pub features: PathBuf,
    pub model: PathBuf,
    pub log_file: PathBuf,
}

impl ArtifactPaths {
    /// `data/raw/user<tag>_history.csv`
    pub fn raw_history(&self, tag: &str) -> PathBuf {
        self.raw_dir.join(format!("user{tag}_history.csv"))
    }
}

impl Config {
    pub fn paths(&self) -> ArtifactPaths {
        let processed = self.data_dir.join("processed");
        ArtifactPaths {
            raw_dir: self.data_dir.join("raw"),
            cleaned: processed.join("cleaned_history.csv"),
            labels: self.data_dir.join("labels.csv"),
            features: processed.join("tfidf_features.pkl"),
            model: self.models_dir.join("logistic_regression.pkl"),
            log_file: self.logs_dir.join("scrape_history.log"),
        }
    }

    /// Re-root every artifact directory under `root`. Used by tests and `--workdir`.
    pub fn rooted_at(mut self, root: &Path) -> Self {
        self.data_dir = root.join(&self.data_dir);
        self.models_dir = root.join(&self.models_dir);
        self.logs_dir = root.join(&self.logs_dir);
        self.temp_dir = self.temp_dir.map(|t| root.join(t));
        self
    }
}

pub fn load_config(path: Option<&Path>) -> Result<LoadedConfig> {
    let bytes: Vec<u8> = if let Some(p) = path {
        std::fs::read(p)
            .map_err(|err| crate::error::PipelineError::from_io(err, "config file", p))?
    } else {
        include_bytes!("../config/default.yml").to_vec()
    };

    let config: Config = serde_yaml::from_slice(&bytes)?;
    if !(0.0..1.0).contains(&config.train.test_fraction) {
        return Err(crate::error::PipelineError::validation(
            path.unwrap_or(Path::new("config/default.yml")),
            format!(
                "train.test_fraction must be in [0, 1), got {}",
                config.train.test_fraction
            ),
        ));
    }

    let config_hash = hash_bytes(&bytes);

    Ok(LoadedConfig { config, config_hash })
}

fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_matches_canonical_layout() {
        let loaded = load_config(None).expect("config");
        let paths = loaded.config.paths();
        assert_eq!(paths.cleaned, PathBuf::from("data/processed/cleaned_history.csv"));
        assert_eq!(paths.labels, PathBuf::from("data/labels.csv"));
        assert_eq!(paths.features, PathBuf::from("data/processed/tfidf_features.pkl"));
        assert_eq!(paths.model, PathBuf::from("models/logistic_regression.pkl"));
        assert_eq!(paths.log_file, PathBuf::from("logs/scrape_history.log"));
        assert_eq!(paths.raw_history("c"), PathBuf::from("data/raw/userc_history.csv"));
        assert_eq!(loaded.config_hash.len(), 64);
    }

    #[test]
    fn default_config_values() {
        let cfg = load_config(None).expect("config").config;
        assert_eq!(cfg.extract.limit, 300);
        assert_eq!(cfg.vectorize.max_features, 500);
        assert_eq!(cfg.vectorize.text_field, TextField::CleanedTitle);
        assert_eq!(cfg.train.seed, 42);
        assert!(cfg.labels.class_a_keywords.contains(&"trump".to_string()));
    }

    #[test]
    fn rejects_out_of_range_test_fraction() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("bad.yml");
        let text = String::from_utf8(include_bytes!("../config/default.yml").to_vec())
            .expect("utf8")
            .replace("test_fraction: 0.2", "test_fraction: 1.5");
        std::fs::write(&path, text).expect("write");
        let err = load_config(Some(&path)).expect_err("must fail");
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn missing_config_file_is_not_found() {
        let err = load_config(Some(Path::new("/definitely/not/here.yml"))).expect_err("missing");
        assert_eq!(err.kind(), "not_found");
    }
}
