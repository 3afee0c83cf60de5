mod common;

use common::{Workspace, dir_is_empty, memory_logs, political_titles, write_chrome_history};

use rusqlite::Connection;

use histlean::artifacts;
use histlean::extract::{Browser, BrowserChoice, LocatedStore};
use histlean::logging::LogLevel;
use histlean::pipeline::{InputSource, Pipeline};
use histlean::record::{CleanedRecord, Label};

#[test]
fn missing_browser_store_is_not_found() {
    let ws = Workspace::new();
    let (_log, logs) = memory_logs();
    let pipeline = Pipeline::new(&ws.loaded, logs);
    let err = pipeline
        .run(BrowserChoice::Firefox, &ws.roots(), &pipeline.filter())
        .expect_err("no firefox profile");
    assert_eq!(err.kind(), "not_found");
    assert!(!pipeline.paths().cleaned.exists());
}

#[test]
fn corrupt_store_leaves_no_temporary_copy() {
    let ws = Workspace::new();
    let history = ws.chrome_history_path();
    std::fs::create_dir_all(history.parent().expect("parent")).expect("dir");
    std::fs::write(&history, vec![0x42u8; 8192]).expect("write");
    let (log, logs) = memory_logs();
    let pipeline = Pipeline::new(&ws.loaded, logs);

    let store = LocatedStore {
        browser: Browser::Chrome,
        path: history,
    };
    let err = pipeline
        .extractor()
        .extract_store(&store, &pipeline.filter())
        .expect_err("corrupt");
    assert_eq!(err.kind(), "sqlite");
    assert!(dir_is_empty(&ws.scratch()));
    assert!(!pipeline.paths().raw_history("c").exists());
    assert!(log.count(LogLevel::Error) >= 1);
}

#[test]
fn wal_mode_firefox_store_leaves_no_sidecar_files() {
    let ws = Workspace::new();
    let places = ws.root().join("home/.mozilla/firefox/abc.default/places.sqlite");
    std::fs::create_dir_all(places.parent().expect("parent")).expect("profile dir");
    let conn = Connection::open(&places).expect("open");
    let mode: String = conn
        .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
        .expect("wal");
    assert_eq!(mode, "wal");
    conn.execute_batch(
        "CREATE TABLE moz_places (id INTEGER PRIMARY KEY, url TEXT, title TEXT, last_visit_date INTEGER);",
    )
    .expect("schema");
    conn.execute(
        "INSERT INTO moz_places (url, title, last_visit_date) VALUES (?1, ?2, ?3)",
        ("https://news.example/gop", "GOP convention", 1_658_793_600_000_000i64),
    )
    .expect("insert");
    drop(conn);

    let (log, logs) = memory_logs();
    let pipeline = Pipeline::new(&ws.loaded, logs);
    let store = LocatedStore {
        browser: Browser::Firefox,
        path: places,
    };
    let outcome = pipeline
        .extractor()
        .extract_store(&store, &pipeline.filter())
        .expect("extract");

    assert_eq!(outcome.rows, 1);
    assert_eq!(outcome.raw_path, pipeline.paths().raw_history("2"));
    assert!(outcome.raw_path.exists());
    assert!(dir_is_empty(&ws.scratch()));
    assert_eq!(log.count(LogLevel::Error), 0);
}

#[test]
fn empty_corpus_stops_at_vectorize() {
    let ws = Workspace::new();
    let (log, logs) = memory_logs();
    let pipeline = Pipeline::new(&ws.loaded, logs);
    let cleaned = pipeline.paths().cleaned.clone();
    artifacts::csv::write_cleaned(&cleaned, &[]).expect("empty cleaned");

    let err = pipeline
        .run_from(&InputSource::CleanedPath(cleaned))
        .expect_err("nothing to fit");
    assert_eq!(err.kind(), "no_input");
    assert!(!pipeline.paths().model.exists());
    assert!(
        log.lines()
            .iter()
            .any(|(_, line)| line.contains("pipeline stopped at vectorize stage"))
    );
}

#[test]
fn label_count_mismatch_is_an_alignment_error() {
    let ws = Workspace::new();
    let (_log, logs) = memory_logs();
    let pipeline = Pipeline::new(&ws.loaded, logs);
    let history = ws.chrome_history_path();
    let rows: Vec<(String, String)> = political_titles().into_iter().take(10).collect();
    write_chrome_history(&history, &rows);
    let store = LocatedStore {
        browser: Browser::Chrome,
        path: history,
    };
    let raw = pipeline
        .extractor()
        .extract_store(&store, &pipeline.filter())
        .expect("extract")
        .raw_path;
    pipeline.clean_only(vec![raw]).expect("clean");
    pipeline.vectorize_only().expect("vectorize");

    let labels = vec![Label::ClassA; 9];
    artifacts::csv::write_labels(&pipeline.paths().labels, &labels).expect("labels");
    let err = pipeline.train_only().expect_err("misaligned");
    assert_eq!(err.kind(), "alignment");
    assert!(!pipeline.paths().model.exists());
}

#[test]
fn predicting_before_training_is_not_found() {
    let ws = Workspace::new();
    let (_log, logs) = memory_logs();
    let pipeline = Pipeline::new(&ws.loaded, logs);
    let err = pipeline.predict_only(&[]).expect_err("no artifacts");
    assert_eq!(err.kind(), "not_found");
}

#[test]
fn cleaning_without_raw_tables_is_no_input() {
    let ws = Workspace::new();
    let (log, logs) = memory_logs();
    let pipeline = Pipeline::new(&ws.loaded, logs);
    let missing = ws.root().join("data/raw/userc_history.csv");
    let err = pipeline.clean_only(vec![missing]).expect_err("nothing readable");
    assert_eq!(err.kind(), "no_input");
    assert_eq!(log.count(LogLevel::Warn), 1);
}

#[test]
fn malformed_label_file_is_a_validation_error() {
    let ws = Workspace::new();
    let (_log, logs) = memory_logs();
    let pipeline = Pipeline::new(&ws.loaded, logs);
    let record = CleanedRecord {
        url: "https://news.example/a".to_string(),
        title: Some("Trump rally".to_string()),
        visit_time: None,
        cleaned_title: "trump rally".to_string(),
        cleaned_url: "news example".to_string(),
    };
    artifacts::csv::write_cleaned(&pipeline.paths().cleaned, &[record.clone(), record])
        .expect("cleaned");
    pipeline.vectorize_only().expect("vectorize");
    std::fs::write(&pipeline.paths().labels, "label\n1\n7\n").expect("labels");

    let err = pipeline.train_only().expect_err("bad label");
    assert_eq!(err.kind(), "validation");
}
