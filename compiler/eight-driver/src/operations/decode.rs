use crate::pipeline::{IoError, Pipeline, PipelineError, PipelineOperation};
use eight_mir::{deserialize, MirModule};
use std::path::Path;

/// Operation for reading a module file back into memory.
///
/// The decoded module still has to go through verification.
pub struct DecodeOperation;

impl<'a> PipelineOperation<&'a Path, MirModule> for DecodeOperation {
    fn execute(_: &Pipeline, input: &'a Path) -> Result<MirModule, PipelineError> {
        let bytes = std::fs::read(input).map_err(|source| IoError {
            action: "read",
            path: input.display().to_string(),
            source,
        })?;
        log::debug!("read {} bytes from {}", bytes.len(), input.display());
        Ok(deserialize(&bytes)?)
    }
}
