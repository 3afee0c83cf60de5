//! Shared fixtures for the pipeline integration tests.
//!
//! Each test gets its own temporary workspace with the default config
//! re-rooted into it, so artifacts never land in the source tree.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::Connection;
use tempfile::TempDir;

use histlean::config::{self, LoadedConfig};
use histlean::extract::Roots;
use histlean::logging::MemoryLog;
use histlean::pipeline::StageLogs;

/// 2022-07-26 00:00:00 UTC in microseconds since 1601-01-01.
pub const WEBKIT_BASE: i64 = 13_303_267_200_000_000;

pub struct Workspace {
    pub dir: TempDir,
    pub loaded: LoadedConfig,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut loaded = config::load_config(None).expect("default config");
        loaded.config = loaded.config.rooted_at(dir.path());
        let scratch = dir.path().join("scratch");
        std::fs::create_dir_all(&scratch).expect("scratch dir");
        loaded.config.temp_dir = Some(scratch);
        Self { dir, loaded }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn scratch(&self) -> PathBuf {
        self.dir.path().join("scratch")
    }

    /// Home-rooted layout matching the Linux conventions.
    pub fn roots(&self) -> Roots {
        let home = self.dir.path().join("home");
        Roots {
            local_data: home.join(".local").join("share"),
            config: home.join(".config"),
            home,
        }
    }

    pub fn chrome_history_path(&self) -> PathBuf {
        self.roots()
            .home
            .join(".config")
            .join("google-chrome")
            .join("Default")
            .join("History")
    }
}

pub fn memory_logs() -> (Arc<MemoryLog>, StageLogs) {
    let log = Arc::new(MemoryLog::new());
    (log.clone(), StageLogs::shared(log))
}

/// Titles alternating between the two keyword classes. Visit times increase
/// with the index, so extraction returns them in reverse order.
pub fn political_titles() -> Vec<(String, String)> {
    let class_a = [
        "Trump rally draws crowds",
        "Republican senators block bill",
        "Conservative think tank report",
        "GOP primary debate recap",
        "Trump tariffs explained",
        "Republican governors meet",
    ];
    let class_b = [
        "Democrat leaders unveil plan",
        "Liberal arts college rankings",
        "Biden signs climate order",
        "Newsom budget proposal",
        "Climate summit opens",
        "Democrat mayors gather",
    ];
    class_a
        .iter()
        .zip(class_b.iter())
        .enumerate()
        .flat_map(|(i, (a, b))| {
            [
                (format!("https://news.example/a/{i}"), a.to_string()),
                (format!("https://news.example/b/{i}"), b.to_string()),
            ]
        })
        .collect()
}

/// Write a Chromium-shaped `History` database with one visit per url.
pub fn write_chrome_history(path: &Path, rows: &[(String, String)]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("history dir");
    }
    let conn = Connection::open(path).expect("open history");
    conn.execute_batch(
        "CREATE TABLE urls (id INTEGER PRIMARY KEY, url TEXT, title TEXT, last_visit_time INTEGER);
         CREATE TABLE visits (id INTEGER PRIMARY KEY, url INTEGER, visit_time INTEGER);",
    )
    .expect("schema");
    for (i, (url, title)) in rows.iter().enumerate() {
        let id = i as i64 + 1;
        let when = WEBKIT_BASE + id * 60_000_000;
        conn.execute(
            "INSERT INTO urls (id, url, title, last_visit_time) VALUES (?1, ?2, ?3, ?4)",
            (id, url, title, when),
        )
        .expect("insert url");
        conn.execute(
            "INSERT INTO visits (url, visit_time) VALUES (?1, ?2)",
            (id, when),
        )
        .expect("insert visit");
    }
}

pub fn dir_is_empty(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(true)
}
