//! Error types for the MIR.
//!
//! Construction errors are returned by the [`MirBuilder`](crate::builder::MirBuilder) the moment a
//! misuse is detected, so no half-typed instruction ever enters a module. Serialization errors
//! are returned by the [`binary`](crate::binary) codec, and never leave a partially decoded module
//! behind.
//!
//! Verification failures are not part of this enum. They are reported as a structured list by the
//! [`verify`](crate::verify) pass instead.

use eight_macros::declare_error_type;
use miette::Diagnostic;
use thiserror::Error;

declare_error_type! {
    #[error("mir error: {0}")]
    pub enum MirError {
        DuplicateName(DuplicateNameError),
        BlockAlreadyTerminated(BlockAlreadyTerminatedError),
        TypeMismatch(TypeMismatchError),
        ForeignBlock(ForeignBlockError),
        UnknownEntity(UnknownEntityError),
        UnverifiedModule(UnverifiedModuleError),
        MalformedModule(MalformedModuleError),
        InvalidTargetLayout(InvalidTargetLayoutError),
        Evaluation(EvaluationError),
    }
}

/// Handy type alias for all MIR-related errors.
pub type MirResult<T> = Result<T, MirError>;

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(mir::duplicate_name), help("pick a name that is not in use yet"))]
#[error("{kind} {name} is already defined in {scope}")]
pub struct DuplicateNameError {
    pub kind: &'static str,
    pub name: String,
    pub scope: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(
    code(mir::block_already_terminated),
    help("a basic block ends at its first br or ret instruction")
)]
#[error("cannot append {opcode} to block {block}, it already ends in a terminator")]
pub struct BlockAlreadyTerminatedError {
    pub opcode: &'static str,
    pub block: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(mir::type_mismatch))]
#[error("type mismatch in {opcode}: expected {expected_type}, found {actual_type}")]
pub struct TypeMismatchError {
    pub opcode: &'static str,
    pub expected_type: String,
    pub actual_type: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(mir::foreign_block))]
#[error("block {block} does not belong to function {function}")]
pub struct ForeignBlockError {
    pub block: String,
    pub function: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(mir::unknown_entity))]
#[error("{kind} {reference} does not exist in module {module}")]
pub struct UnknownEntityError {
    pub kind: &'static str,
    pub reference: String,
    pub module: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(
    code(mir::unverified_module),
    help("run the verifier on the module after the last change, and fix any failures it reports")
)]
#[error("refusing to serialize module {module}, it has not been verified in its current state")]
pub struct UnverifiedModuleError {
    pub module: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(mir::malformed_module))]
#[error("malformed module at byte offset {offset}: {reason}")]
pub struct MalformedModuleError {
    pub offset: usize,
    pub reason: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(
    code(mir::invalid_target_layout),
    help("a layout looks like e-p:64:64-S128")
)]
#[error("invalid target layout {descriptor:?}: {reason}")]
pub struct InvalidTargetLayoutError {
    pub descriptor: String,
    pub reason: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(mir::evaluation))]
#[error("failed to evaluate function {function}: {reason}")]
pub struct EvaluationError {
    pub function: String,
    pub reason: String,
}
