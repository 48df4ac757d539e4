use crate::pipeline::{Pipeline, PipelineError, PipelineOperation};
use eight_diagnostics::report_warnings;
use eight_mir::{verify, MirModule};

/// Operation for verifying a module before it is emitted or written.
///
/// Warnings are reported on stderr, failures abort the pipeline.
pub struct VerifyOperation;

impl PipelineOperation<MirModule, MirModule> for VerifyOperation {
    fn execute(_: &Pipeline, input: MirModule) -> Result<MirModule, PipelineError> {
        let warnings = verify(&input).into_result(&input)?;
        let reported = report_warnings(warnings);
        log::debug!(
            "module {} verified with {} warning(s)",
            input.name(),
            reported
        );
        Ok(input)
    }
}
