use crate::fun::MirBlockId;
use crate::instr::MirInstructionId;
use crate::ty::MirTyId;
use std::fmt::{Display, Formatter};

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MirConstantId(pub(crate) u32);

impl MirConstantId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// An integer constant, interned in the module arena.
///
/// The value is always stored truncated to the width of its type and sign-extended to 64 bits.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MirConstantInt {
    pub ty: MirTyId,
    pub value: i64,
}

/// A formal parameter of a function, bound to the parameter at the same position in the
/// function's signature.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct MirArgument {
    pub name: String,
    pub ty: MirTyId,
}

/// Anything that can be used as an instruction operand.
///
/// Arguments are referenced by their position in the function that owns the using instruction.
/// Every instruction is a value, but only instructions with a non-void type can be used as one.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MirValue {
    Argument(u32),
    Constant(MirConstantId),
    Instruction(MirInstructionId),
}

impl Display for MirValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MirValue::Argument(index) => write!(f, "argument {}", index),
            MirValue::Constant(id) => write!(f, "constant {}", id.0),
            MirValue::Instruction(id) => write!(f, "instruction {}", id.0),
        }
    }
}

/// A single entry in the uniform operand list of an instruction.
///
/// Besides values, instructions refer to blocks (branch targets) and types (the allocated type of
/// a stack slot).
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MirOperand {
    Value(MirValue),
    Block(MirBlockId),
    Type(MirTyId),
}

impl MirOperand {
    pub fn as_value(&self) -> Option<MirValue> {
        match self {
            MirOperand::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<MirBlockId> {
        match self {
            MirOperand::Block(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<MirTyId> {
        match self {
            MirOperand::Type(t) => Some(*t),
            _ => None,
        }
    }
}

impl From<MirValue> for MirOperand {
    fn from(value: MirValue) -> Self {
        MirOperand::Value(value)
    }
}
