//! # History Extraction
//!
//! Copies a browser's history database into a private temporary directory,
//! reads the filtered rows from the copy, and writes them to the raw table.
//! The directory is a [`TempDir`], so the copy and any SQLite sidecar files
//! are removed on every exit path.

pub mod locate;
pub mod sqlite_db;

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use rusqlite::{Connection, OpenFlags};
use tempfile::TempDir;

use crate::artifacts;
use crate::config::{ArtifactPaths, Config};
use crate::error::{PipelineError, Result};
use crate::logging::StageLog;
use crate::record::HistoryRecord;

pub use locate::{LocatedStore, Roots};

const COPY_NAME: &str = "history.db";

/// Browser the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserChoice {
    Chrome,
    Brave,
    Firefox,
}

impl std::str::FromStr for BrowserChoice {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chrome" => Ok(BrowserChoice::Chrome),
            "brave" => Ok(BrowserChoice::Brave),
            "firefox" => Ok(BrowserChoice::Firefox),
            other => Err(PipelineError::UnsupportedBrowser(other.to_string())),
        }
    }
}

/// Browser whose store was actually found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Browser {
    Chrome,
    Brave,
    Firefox,
}

/// Storage schema and timestamp epoch shared by a group of browsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserFamily {
    /// `urls`/`visits`, microseconds since 1601-01-01.
    Chromium,
    /// `moz_places`, microseconds since 1970-01-01.
    Firefox,
}

impl Browser {
    pub fn family(self) -> BrowserFamily {
        match self {
            Browser::Chrome | Browser::Brave => BrowserFamily::Chromium,
            Browser::Firefox => BrowserFamily::Firefox,
        }
    }

    /// Tag used in `data/raw/user<tag>_history.csv`.
    pub fn raw_tag(self) -> &'static str {
        match self {
            Browser::Chrome => "c",
            Browser::Brave => "b",
            Browser::Firefox => "2",
        }
    }
}

impl fmt::Display for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Browser::Chrome => "chrome",
            Browser::Brave => "brave",
            Browser::Firefox => "firefox",
        };
        f.write_str(name)
    }
}

/// Row predicates applied inside the read query.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryFilter {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    /// ORed across url and title; ANDed with the date range.
    pub keywords: Vec<String>,
    pub limit: usize,
}

impl HistoryFilter {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            start: cfg.extract.start_date,
            end: cfg.extract.end_date,
            keywords: cfg.extract.keywords.clone(),
            limit: cfg.extract.limit,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractOutcome {
    pub browser: Browser,
    pub raw_path: PathBuf,
    pub rows: usize,
}

pub struct Extractor<'a> {
    paths: ArtifactPaths,
    temp_dir: PathBuf,
    log: &'a dyn StageLog,
}

impl<'a> Extractor<'a> {
    pub fn new(cfg: &Config, log: &'a dyn StageLog) -> Self {
        Self {
            paths: cfg.paths(),
            temp_dir: cfg.temp_dir.clone().unwrap_or_else(std::env::temp_dir),
            log,
        }
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Locate the store for `choice` under `roots` and extract it.
    pub fn extract(
        &self,
        choice: BrowserChoice,
        roots: &Roots,
        filter: &HistoryFilter,
    ) -> Result<ExtractOutcome> {
        let located = locate::locate(choice, roots).inspect_err(|err| {
            self.log.error(&format!("no history store for {choice:?}: {err}"));
        })?;
        self.log.info(&format!(
            "found {} history file at {}",
            located.browser,
            located.path.display()
        ));
        self.extract_store(&located, filter)
    }

    /// Extract from an already located store.
    pub fn extract_store(&self, store: &LocatedStore, filter: &HistoryFilter) -> Result<ExtractOutcome> {
        let records = self.read_copy(&store.path, store.browser.family(), filter)?;
        let raw_path = self.paths.raw_history(store.browser.raw_tag());
        artifacts::csv::write_history(&raw_path, &records).inspect_err(|err| {
            self.log
                .error(&format!("failed to write {}: {err}", raw_path.display()));
        })?;
        self.log.info(&format!(
            "saved {} recent history records to {}",
            records.len(),
            raw_path.display()
        ));
        Ok(ExtractOutcome {
            browser: store.browser,
            raw_path,
            rows: records.len(),
        })
    }

    fn read_copy(
        &self,
        source: &Path,
        family: BrowserFamily,
        filter: &HistoryFilter,
    ) -> Result<Vec<HistoryRecord>> {
        let scratch = self.copy_to_temp(source)?;
        let result = read_store(&scratch.path().join(COPY_NAME), family, filter);
        let scratch_path = scratch.path().to_path_buf();
        match scratch.close() {
            Ok(()) => self.log.info(&format!(
                "removed temporary copy {}",
                scratch_path.display()
            )),
            Err(err) => self.log.warn(&format!(
                "could not remove temporary copy {}: {err}",
                scratch_path.display()
            )),
        }
        result.inspect_err(|err| {
            self.log
                .error(&format!("reading {} failed: {err}", source.display()));
        })
    }

    /// Copy `source` into a fresh private directory. SQLite may add `-wal`
    /// and `-shm` files next to the copy; they go when the directory does.
    fn copy_to_temp(&self, source: &Path) -> Result<TempDir> {
        std::fs::create_dir_all(&self.temp_dir)
            .map_err(|err| PipelineError::from_io(err, "temporary directory", &self.temp_dir))?;
        let mut source_file = std::fs::File::open(source).map_err(|err| {
            let err = PipelineError::from_io(err, "history file", source);
            self.log.error(&format!("cannot open history file: {err}"));
            err
        })?;
        let scratch = tempfile::Builder::new()
            .prefix("histlean-")
            .tempdir_in(&self.temp_dir)
            .map_err(|err| PipelineError::from_io(err, "temporary directory", &self.temp_dir))?;
        let copy_path = scratch.path().join(COPY_NAME);
        let mut copy = std::fs::File::create(&copy_path)
            .map_err(|err| PipelineError::from_io(err, "temporary copy", &copy_path))?;
        std::io::copy(&mut source_file, &mut copy)
            .map_err(|err| PipelineError::from_io(err, "history file", source))?;
        drop(copy);
        self.log
            .info(&format!("copied history file to {}", copy_path.display()));
        Ok(scratch)
    }
}

/// Open `path` read-only and run the filtered query. The connection is
/// closed before returning so the file can be deleted afterwards.
fn read_store(path: &Path, family: BrowserFamily, filter: &HistoryFilter) -> Result<Vec<HistoryRecord>> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    match sqlite_db::detect_family(&conn)? {
        Some(found) if found == family => {}
        Some(found) => {
            return Err(PipelineError::validation(
                path,
                format!("expected {family:?} history schema, found {found:?}"),
            ));
        }
        None => {
            return Err(PipelineError::validation(path, "no browser history tables"));
        }
    }
    let records = sqlite_db::query_history(&conn, family, filter)?;
    drop(conn);
    Ok(records)
}
