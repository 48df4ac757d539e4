//! Instructions of the MIR.
//!
//! An instruction is a single tagged record: an opcode, a uniform list of operands, and a result
//! type. There is no type per instruction kind. Code that needs the operands of one specific kind
//! asks for a projection such as [`MirInstruction::as_store`], which checks that the operand list
//! has the shape that opcode requires and hands back named fields.
//!
//! The operand layout for each opcode is:
//!
//! | opcode   | operands                                      | result type       |
//! |----------|-----------------------------------------------|-------------------|
//! | `alloca` | `[type]`                                      | pointer to `type` |
//! | `store`  | `[value, pointer]`                            | void              |
//! | `load`   | `[pointer]`                                   | the loaded type   |
//! | `icmp`   | `[lhs, rhs]`                                  | `i1`              |
//! | `br`     | `[target]` or `[condition, then, else]`       | void              |
//! | `ret`    | `[]` or `[value]`                             | void              |

use crate::fun::MirBlockId;
use crate::ty::MirTyId;
use crate::value::{MirOperand, MirValue};
use std::fmt::{Display, Formatter};

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MirInstructionId(pub(crate) u32);

impl MirInstructionId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Signed integer comparison predicates.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MirIntPredicate {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl MirIntPredicate {
    pub fn evaluate(&self, lhs: i64, rhs: i64) -> bool {
        match self {
            MirIntPredicate::Lt => lhs < rhs,
            MirIntPredicate::Le => lhs <= rhs,
            MirIntPredicate::Gt => lhs > rhs,
            MirIntPredicate::Ge => lhs >= rhs,
            MirIntPredicate::Eq => lhs == rhs,
            MirIntPredicate::Ne => lhs != rhs,
        }
    }
}

impl Display for MirIntPredicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mnemonic = match self {
            MirIntPredicate::Lt => "lt",
            MirIntPredicate::Le => "le",
            MirIntPredicate::Gt => "gt",
            MirIntPredicate::Ge => "ge",
            MirIntPredicate::Eq => "eq",
            MirIntPredicate::Ne => "ne",
        };
        write!(f, "{}", mnemonic)
    }
}

/// The opcode of an instruction, together with its immediate attributes.
///
/// Alignments are in bytes.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MirOpcode {
    Alloca { align: u32 },
    Store { align: u32 },
    Load { align: u32 },
    ICmp(MirIntPredicate),
    Br,
    Ret,
}

impl MirOpcode {
    /// Does this opcode end a basic block?
    pub fn is_terminator(&self) -> bool {
        matches!(self, MirOpcode::Br | MirOpcode::Ret)
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            MirOpcode::Alloca { .. } => "alloca",
            MirOpcode::Store { .. } => "store",
            MirOpcode::Load { .. } => "load",
            MirOpcode::ICmp(_) => "icmp",
            MirOpcode::Br => "br",
            MirOpcode::Ret => "ret",
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct MirInstruction {
    pub opcode: MirOpcode,
    pub operands: Vec<MirOperand>,
    /// The type of the value this instruction produces.
    pub ty: MirTyId,
    pub name: Option<String>,
    /// The block this instruction is placed in.
    pub parent: MirBlockId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirAlloca {
    pub allocated_ty: MirTyId,
    pub align: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirStore {
    pub value: MirValue,
    pub pointer: MirValue,
    pub align: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirLoad {
    pub pointer: MirValue,
    pub align: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirICmp {
    pub predicate: MirIntPredicate,
    pub lhs: MirValue,
    pub rhs: MirValue,
}

/// A branch. Unconditional branches have neither a condition nor a false target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirBr {
    pub condition: Option<MirValue>,
    pub true_target: MirBlockId,
    pub false_target: Option<MirBlockId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirRet {
    pub value: Option<MirValue>,
}

impl MirInstruction {
    pub fn is_terminator(&self) -> bool {
        self.opcode.is_terminator()
    }

    /// Iterate over the value operands of the instruction, in operand order.
    pub fn values(&self) -> impl Iterator<Item = MirValue> + '_ {
        self.operands.iter().filter_map(MirOperand::as_value)
    }

    /// Iterate over the blocks this instruction may transfer control to.
    pub fn successors(&self) -> impl Iterator<Item = MirBlockId> + '_ {
        self.operands.iter().filter_map(MirOperand::as_block)
    }

    pub fn as_alloca(&self) -> Option<MirAlloca> {
        let MirOpcode::Alloca { align } = self.opcode else {
            return None;
        };
        match self.operands.as_slice() {
            [MirOperand::Type(allocated_ty)] => Some(MirAlloca {
                allocated_ty: *allocated_ty,
                align,
            }),
            _ => None,
        }
    }

    pub fn as_store(&self) -> Option<MirStore> {
        let MirOpcode::Store { align } = self.opcode else {
            return None;
        };
        match self.operands.as_slice() {
            [MirOperand::Value(value), MirOperand::Value(pointer)] => Some(MirStore {
                value: *value,
                pointer: *pointer,
                align,
            }),
            _ => None,
        }
    }

    pub fn as_load(&self) -> Option<MirLoad> {
        let MirOpcode::Load { align } = self.opcode else {
            return None;
        };
        match self.operands.as_slice() {
            [MirOperand::Value(pointer)] => Some(MirLoad {
                pointer: *pointer,
                align,
            }),
            _ => None,
        }
    }

    pub fn as_icmp(&self) -> Option<MirICmp> {
        let MirOpcode::ICmp(predicate) = self.opcode else {
            return None;
        };
        match self.operands.as_slice() {
            [MirOperand::Value(lhs), MirOperand::Value(rhs)] => Some(MirICmp {
                predicate,
                lhs: *lhs,
                rhs: *rhs,
            }),
            _ => None,
        }
    }

    pub fn as_br(&self) -> Option<MirBr> {
        if self.opcode != MirOpcode::Br {
            return None;
        }
        match self.operands.as_slice() {
            [MirOperand::Block(target)] => Some(MirBr {
                condition: None,
                true_target: *target,
                false_target: None,
            }),
            [
                MirOperand::Value(condition),
                MirOperand::Block(then),
                MirOperand::Block(otherwise),
            ] => Some(MirBr {
                condition: Some(*condition),
                true_target: *then,
                false_target: Some(*otherwise),
            }),
            _ => None,
        }
    }

    pub fn as_ret(&self) -> Option<MirRet> {
        if self.opcode != MirOpcode::Ret {
            return None;
        }
        match self.operands.as_slice() {
            [] => Some(MirRet { value: None }),
            [MirOperand::Value(value)] => Some(MirRet {
                value: Some(*value),
            }),
            _ => None,
        }
    }
}
