use crate::operations::build::BuildOperation;
use crate::operations::decode::DecodeOperation;
use crate::operations::emit_mir::MirEmitOperation;
use crate::operations::emit_ron::RonEmitOperation;
use crate::operations::serialize::SerializeOperation;
use crate::operations::verify::VerifyOperation;
use crate::operations::write::WriteOperation;
use crate::query::{EmitQuery, QueryError};
use eight_macros::declare_error_type;
use eight_mir::error::MirError;
use eight_mir::min_function::DEFAULT_TARGET_TRIPLE;
use eight_mir::verify::ModuleVerificationError;
use eight_mir::MirTargetLayout;
use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Build the exemplar module, verify it, and write its binary encoding to `output`.
///
/// Nothing is written when verification fails.
pub fn execute_build_pipeline(opts: PipelineOptions, output: &Path) -> Result<(), PipelineError> {
    let pipeline = Pipeline::new(opts);
    let module = BuildOperation::execute(&pipeline, ())?;
    let module = VerifyOperation::execute(&pipeline, module)?;
    let module = MirEmitOperation::execute(&pipeline, module)?;
    let module = RonEmitOperation::execute(&pipeline, module)?;
    let bytes = SerializeOperation::execute(&pipeline, &module)?;
    WriteOperation::execute(&pipeline, (output, bytes.as_slice()))?;
    Ok(())
}

/// Decode a module file and verify it, emitting whatever the options ask for.
pub fn execute_inspect_pipeline(opts: PipelineOptions, input: &Path) -> Result<(), PipelineError> {
    let pipeline = Pipeline::new(opts);
    let module = DecodeOperation::execute(&pipeline, input)?;
    let module = VerifyOperation::execute(&pipeline, module)?;
    let module = MirEmitOperation::execute(&pipeline, module)?;
    let _ = RonEmitOperation::execute(&pipeline, module)?;
    Ok(())
}

declare_error_type! {
    #[error("pipeline error: {0}")]
    pub enum PipelineError {
        Mir(MirError),
        Verification(ModuleVerificationError),
        Query(QueryError),
        Io(IoError),
        Ron(RonError),
    }
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(driver::io))]
#[error("failed to {action} {path}")]
pub struct IoError {
    pub action: &'static str,
    pub path: String,
    #[source]
    pub source: std::io::Error,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(driver::ron))]
#[error("failed to serialize module {module} to ron")]
pub struct RonError {
    pub module: String,
    #[source]
    pub source: ron::Error,
}

/// Options for the compilation pipeline.
///
/// Most of these are derived from the command line arguments.
pub struct PipelineOptions {
    pub emit_mir: bool,
    pub emit_ron: bool,
    pub queries: Vec<EmitQuery>,
    pub target_layout: MirTargetLayout,
    pub target_triple: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            emit_mir: false,
            emit_ron: false,
            queries: Vec::new(),
            target_layout: MirTargetLayout::default(),
            target_triple: DEFAULT_TARGET_TRIPLE.to_owned(),
        }
    }
}

/// A compilation pipeline for the compiler.
pub struct Pipeline {
    pub(crate) opts: PipelineOptions,
}

impl Pipeline {
    pub fn new(opts: PipelineOptions) -> Self {
        Self { opts }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.opts
    }
}

pub trait PipelineOperation<I, O> {
    fn execute(pipeline: &Pipeline, input: I) -> Result<O, PipelineError>;
}
