use crate::pipeline::{IoError, Pipeline, PipelineError, PipelineOperation};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Operation for writing an encoded module to disk.
pub struct WriteOperation;

impl<'a> PipelineOperation<(&'a Path, &'a [u8]), ()> for WriteOperation {
    fn execute(_: &Pipeline, (path, bytes): (&'a Path, &'a [u8])) -> Result<(), PipelineError> {
        let fail = |action: &'static str, source: std::io::Error| IoError {
            action,
            path: path.display().to_string(),
            source,
        };
        let file = File::create(path).map_err(|e| fail("create", e))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(bytes).map_err(|e| fail("write", e))?;
        // Flush explicitly, dropping the writer would swallow the error.
        writer.flush().map_err(|e| fail("flush", e))?;
        log::debug!("wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }
}
