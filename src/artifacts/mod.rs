//! # Artifact Storage
//!
//! Reading and writing the files that connect one stage to the next. Every
//! write lands in a temporary sibling first and is renamed over the target,
//! so a failed stage never leaves half a file behind.

pub mod csv;
pub mod json;

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{PipelineError, Result};

/// Replace `path` with whatever `write` produces.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)
        .map_err(|err| PipelineError::from_io(err, "artifact directory", parent))?;

    let mut tmp = NamedTempFile::new_in(parent)
        .map_err(|err| PipelineError::from_io(err, "artifact directory", parent))?;
    write(tmp.as_file_mut())?;
    tmp.as_file_mut().flush()?;
    tmp.persist(path)
        .map_err(|err| PipelineError::from_io(err.error, "artifact", path))?;
    Ok(())
}

pub(crate) fn require_file(path: &Path, what: &str) -> Result<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(PipelineError::validation(path, format!("{what} is not a file"))),
        Err(err) => Err(PipelineError::from_io(err, what, path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn failed_write_keeps_previous_contents() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("artifact.txt");
        write_atomic(&path, |w| {
            w.write_all(b"first")?;
            Ok(())
        })
        .expect("first write");

        let err = write_atomic(&path, |w| {
            w.write_all(b"partial")?;
            Err(PipelineError::NoInput("simulated".to_string()))
        })
        .expect_err("second write fails");
        assert_eq!(err.kind(), "no_input");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "first");

        let leftovers = std::fs::read_dir(path.parent().expect("parent"))
            .expect("read dir")
            .count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn require_file_reports_missing() {
        let dir = tempdir().expect("tempdir");
        let err = require_file(&dir.path().join("nope.csv"), "labels").expect_err("missing");
        assert_eq!(err.kind(), "not_found");
        let err = require_file(dir.path(), "labels").expect_err("dir");
        assert_eq!(err.kind(), "validation");
    }
}
