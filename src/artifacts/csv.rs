use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::artifacts::{require_file, write_atomic};
use crate::error::{PipelineError, Result};
use crate::record::{CleanedRecord, HistoryRecord, Label};

pub const RAW_HEADERS: &[&str] = &["url", "title", "last_visit_time"];
pub const CLEANED_HEADERS: &[&str] = &[
    "url",
    "title",
    "last_visit_time",
    "cleaned_title",
    "cleaned_url",
];
pub const LABEL_HEADERS: &[&str] = &["label"];

#[derive(Serialize, serde::Deserialize)]
struct LabelRow {
    label: Label,
}

fn write_rows<T: Serialize>(path: &Path, headers: &[&str], rows: &[T]) -> Result<()> {
    write_atomic(path, |out| {
        let mut writer = ::csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(out);
        writer.write_record(headers)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    })
}

fn read_rows<T: DeserializeOwned>(path: &Path, what: &str, headers: &[&str]) -> Result<Vec<T>> {
    require_file(path, what)?;
    let mut reader = ::csv::Reader::from_path(path)?;
    let present = reader.headers()?.clone();
    for expected in headers {
        if !present.iter().any(|h| h == *expected) {
            return Err(PipelineError::validation(
                path,
                format!("missing expected column '{expected}'"),
            ));
        }
    }

    let mut out = Vec::new();
    for (idx, row) in reader.deserialize::<T>().enumerate() {
        let row = row.map_err(|err| {
            PipelineError::validation(path, format!("row {}: {err}", idx + 1))
        })?;
        out.push(row);
    }
    Ok(out)
}

pub fn write_history(path: &Path, records: &[HistoryRecord]) -> Result<()> {
    write_rows(path, RAW_HEADERS, records)
}

pub fn read_history(path: &Path) -> Result<Vec<HistoryRecord>> {
    read_rows(path, "raw history", RAW_HEADERS)
}

pub fn write_cleaned(path: &Path, records: &[CleanedRecord]) -> Result<()> {
    write_rows(path, CLEANED_HEADERS, records)
}

pub fn read_cleaned(path: &Path) -> Result<Vec<CleanedRecord>> {
    read_rows(path, "cleaned history", CLEANED_HEADERS)
}

pub fn write_labels(path: &Path, labels: &[Label]) -> Result<()> {
    let rows: Vec<LabelRow> = labels.iter().map(|&label| LabelRow { label }).collect();
    write_rows(path, LABEL_HEADERS, &rows)
}

pub fn read_labels(path: &Path) -> Result<Vec<Label>> {
    let rows: Vec<LabelRow> = read_rows(path, "labels", LABEL_HEADERS)?;
    Ok(rows.into_iter().map(|r| r.label).collect())
}
