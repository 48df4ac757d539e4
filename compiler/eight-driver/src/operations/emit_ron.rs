use crate::pipeline::{Pipeline, PipelineError, PipelineOperation, RonError};
use eight_mir::MirModule;
use ron::ser::PrettyConfig;

/// Operation for dumping the module as RON.
pub struct RonEmitOperation;

impl PipelineOperation<MirModule, MirModule> for RonEmitOperation {
    fn execute(pipeline: &Pipeline, input: MirModule) -> Result<MirModule, PipelineError> {
        if !pipeline.options().emit_ron {
            return Ok(input);
        }
        let syntax = ron::ser::to_string_pretty(&input, PrettyConfig::default()).map_err(|source| {
            RonError {
                module: input.name().to_owned(),
                source,
            }
        })?;
        println!("{}", syntax);
        Ok(input)
    }
}
