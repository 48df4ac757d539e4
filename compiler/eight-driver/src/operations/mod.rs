//! The operations a pipeline is assembled from.
//!
//! Each operation is a unit struct implementing
//! [`PipelineOperation`](crate::pipeline::PipelineOperation) for the input it consumes and the
//! output it hands to the next operation.

pub mod build;
pub mod decode;
pub mod emit_mir;
pub mod emit_ron;
pub mod serialize;
pub mod verify;
pub mod write;
