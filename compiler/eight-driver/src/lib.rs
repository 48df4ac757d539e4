//! The `eightc` compiler driver.
//!
//! The driver strings the MIR operations together into the two pipelines exposed on the command
//! line: `build` produces a module and writes it to disk, and `inspect` reads one back.

pub mod operations;
pub mod pipeline;
pub mod query;
