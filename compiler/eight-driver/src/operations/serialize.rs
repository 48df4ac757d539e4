use crate::pipeline::{Pipeline, PipelineError, PipelineOperation};
use eight_mir::{serialize, MirModule};

/// Operation for encoding a verified module into bytes.
pub struct SerializeOperation;

impl<'m> PipelineOperation<&'m MirModule, Vec<u8>> for SerializeOperation {
    fn execute(_: &Pipeline, input: &'m MirModule) -> Result<Vec<u8>, PipelineError> {
        Ok(serialize(input)?)
    }
}
