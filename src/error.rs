//! # Error Taxonomy
//!
//! Every stage returns [`PipelineError`]. The variant tells the orchestrator
//! which class of failure stopped the run; none of them are retried.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("not found: {what} ({})", .path.display())]
    NotFound { what: String, path: PathBuf },
    #[error("permission denied: {}", .path.display())]
    Permission { path: PathBuf },
    #[error("alignment error: {features} feature rows but {labels} labels")]
    Alignment { features: usize, labels: usize },
    #[error("no input: {0}")]
    NoInput(String),
    #[error("validation error in {}: {reason}", .path.display())]
    Validation { path: PathBuf, reason: String },
    #[error("dimension mismatch: model expects {expected} columns, input has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("training failed: {0}")]
    Training(String),
    #[error("consent not provided")]
    ConsentDeclined,
    #[error("unsupported browser: {0} (expected chrome, brave or firefox)")]
    UnsupportedBrowser(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

impl PipelineError {
    /// Stable tag for the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::NotFound { .. } => "not_found",
            PipelineError::Permission { .. } => "permission",
            PipelineError::Alignment { .. } => "alignment",
            PipelineError::NoInput(_) => "no_input",
            PipelineError::Validation { .. } => "validation",
            PipelineError::DimensionMismatch { .. } => "dimension_mismatch",
            PipelineError::Training(_) => "training",
            PipelineError::ConsentDeclined => "consent_declined",
            PipelineError::UnsupportedBrowser(_) => "unsupported_browser",
            PipelineError::Io(_) => "io",
            PipelineError::Sqlite(_) => "sqlite",
            PipelineError::Csv(_) => "csv",
            PipelineError::Json(_) => "json",
            PipelineError::Yaml(_) => "yaml",
        }
    }

    pub fn not_found(what: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        PipelineError::NotFound {
            what: what.into(),
            path: path.into(),
        }
    }

    pub fn validation(path: &Path, reason: impl Into<String>) -> Self {
        PipelineError::Validation {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Classify an io error raised while touching `path`.
    pub fn from_io(err: std::io::Error, what: &str, path: &Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => PipelineError::not_found(what, path),
            std::io::ErrorKind::PermissionDenied => PipelineError::Permission {
                path: path.to_path_buf(),
            },
            _ => PipelineError::Io(err),
        }
    }
}
