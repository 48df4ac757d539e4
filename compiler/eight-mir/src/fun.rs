use crate::instr::MirInstructionId;
use crate::ty::MirTyId;
use crate::value::MirArgument;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MirFunctionId(pub(crate) u32);

impl MirFunctionId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MirBlockId(pub(crate) u32);

impl MirBlockId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// How a function is visible to other modules.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MirLinkage {
    External,
    Internal,
    Private,
}

impl Display for MirLinkage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MirLinkage::External => write!(f, "external"),
            MirLinkage::Internal => write!(f, "internal"),
            MirLinkage::Private => write!(f, "private"),
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MirCallingConvention {
    C,
    Fast,
}

impl Display for MirCallingConvention {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MirCallingConvention::C => write!(f, "ccc"),
            MirCallingConvention::Fast => write!(f, "fastcc"),
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MirFunctionAttribute {
    NoInline,
    NoUnwind,
    OptimizeNone,
}

impl Display for MirFunctionAttribute {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MirFunctionAttribute::NoInline => write!(f, "noinline"),
            MirFunctionAttribute::NoUnwind => write!(f, "nounwind"),
            MirFunctionAttribute::OptimizeNone => write!(f, "optnone"),
        }
    }
}

/// A basic block.
///
/// The block does not own its instructions directly. They live in the instruction table of the
/// module, and the block lists their ids in program order.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct MirBasicBlock {
    pub name: String,
    pub parent: MirFunctionId,
    pub instructions: Vec<MirInstructionId>,
}

impl MirBasicBlock {
    pub fn last_instruction(&self) -> Option<MirInstructionId> {
        self.instructions.last().copied()
    }
}

/// A function definition.
///
/// The first block in `blocks` is the entry block.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct MirFunction {
    pub name: String,
    /// The signature of the function, always a function type.
    pub ty: MirTyId,
    pub arguments: Vec<MirArgument>,
    pub blocks: Vec<MirBlockId>,
    pub linkage: MirLinkage,
    pub calling_convention: MirCallingConvention,
    pub dso_local: bool,
    pub attributes: BTreeSet<MirFunctionAttribute>,
}

impl MirFunction {
    pub fn entry_block(&self) -> Option<MirBlockId> {
        self.blocks.first().copied()
    }
}
