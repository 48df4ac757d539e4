use crate::pipeline::{Pipeline, PipelineError, PipelineOperation};
use eight_mir::min_function::build_min_module;
use eight_mir::MirModule;

/// Operation for constructing the `min` module for the configured target.
pub struct BuildOperation;

impl PipelineOperation<(), MirModule> for BuildOperation {
    fn execute(pipeline: &Pipeline, _: ()) -> Result<MirModule, PipelineError> {
        let opts = pipeline.options();
        log::debug!(
            "building module for layout {} and triple {}",
            opts.target_layout,
            opts.target_triple
        );
        let module = build_min_module(opts.target_layout, &opts.target_triple)?;
        Ok(module)
    }
}
