//! Mid-level Intermediate Representation.
//!
//! The MIR is a typed, low-level representation of a program as a control flow graph of basic
//! blocks. Every instruction that produces a result is a value that later instructions may use,
//! but locals live in explicit stack slots that are accessed with loads and stores. It is the form
//! a code generator or an interpreter consumes.
//!
//! ```text
//! fn @min(%a: i32, %b: i32) -> i32 external ccc dso_local #[noinline, nounwind, optnone] {
//! entry:
//!   %retval = mem.alloca i32, align 4
//!   %a.addr = mem.alloca i32, align 4
//!   %b.addr = mem.alloca i32, align 4
//!   mem.store %a, %a.addr, align 4
//!   mem.store %b, %b.addr, align 4
//!   %0 = mem.load i32, %a.addr, align 4
//!   %1 = mem.load i32, %b.addr, align 4
//!   %cmp = cmp.lt.i32 %0, %1
//!   branch.cond %cmp, if.then, if.else
//! ...
//! }
//! ```
//!
//! A module owns every entity in it through flat tables, and entities refer to each other by
//! index. Modules are constructed with the [`MirBuilder`], checked with [`verify`], and written to
//! disk with [`serialize`].

pub mod arena;
pub mod binary;
pub mod builder;
pub mod cfg;
pub mod error;
pub mod fun;
pub mod instr;
pub mod interpret;
pub mod layout;
pub mod min_function;
pub mod module;
pub mod textual_pass;
pub mod ty;
pub mod value;
pub mod verify;

pub use crate::binary::{deserialize, serialize};
pub use crate::builder::MirBuilder;
pub use crate::error::{MirError, MirResult};
pub use crate::interpret::MirInterpreter;
pub use crate::layout::{MirEndianness, MirTargetLayout};
pub use crate::module::MirModule;
pub use crate::verify::{verify, VerificationResult};
