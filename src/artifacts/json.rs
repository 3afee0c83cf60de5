use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::artifacts::{require_file, write_atomic};
use crate::error::{PipelineError, Result};

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    write_atomic(path, |out| {
        let mut writer = BufWriter::new(out);
        serde_json::to_writer(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    })
}

/// Structural problems in the document surface as `Validation`, not `Json`.
pub fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    require_file(path, what)?;
    let file = std::fs::File::open(path).map_err(|err| PipelineError::from_io(err, what, path))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|err| PipelineError::validation(path, format!("malformed {what}: {err}")))
}
