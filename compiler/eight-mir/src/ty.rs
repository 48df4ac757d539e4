use std::fmt::{Display, Formatter};

/// An interned identifier for a type.
///
/// Types are owned by the [`MirArena`](crate::arena::MirArena) of a module, and referenced
/// everywhere else through this index. Two ids from the same arena are equal if and only if the
/// types they refer to are equal.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MirTyId(pub(crate) u32);

impl MirTyId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl Display for MirTyId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single type in the MIR.
///
/// Compound types refer to their component types by [`MirTyId`], which means a type is only
/// meaningful together with the arena that interned it.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MirTy {
    /// The type of instructions that do not produce a value, and of functions that do not return
    /// one.
    Void,
    /// An integer of the given bit width. `i1` doubles as the boolean type.
    Integer(MirIntegerTy),
    /// A pointer to a value of the pointee type.
    Pointer(MirPointerTy),
    /// A function signature.
    Function(MirFunctionTy),
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MirIntegerTy {
    pub width: u32,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MirPointerTy {
    pub pointee: MirTyId,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MirFunctionTy {
    pub return_type: MirTyId,
    pub parameters: Vec<MirTyId>,
    pub is_var_arg: bool,
}

impl MirTy {
    pub const MAX_INTEGER_WIDTH: u32 = 64;

    /// Integer types range from `i1` to `i64`.
    pub fn is_supported_integer_width(width: u32) -> bool {
        (1..=Self::MAX_INTEGER_WIDTH).contains(&width)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, MirTy::Void)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, MirTy::Integer(_))
    }

    /// Is this the one-bit integer used for branch conditions?
    pub fn is_boolean(&self) -> bool {
        matches!(self, MirTy::Integer(MirIntegerTy { width: 1 }))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, MirTy::Pointer(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, MirTy::Function(_))
    }

    /// Can values of this type be placed in memory?
    pub fn is_sized(&self) -> bool {
        matches!(self, MirTy::Integer(_) | MirTy::Pointer(_))
    }

    pub fn integer_width(&self) -> Option<u32> {
        match self {
            MirTy::Integer(i) => Some(i.width),
            _ => None,
        }
    }

    pub fn pointee(&self) -> Option<MirTyId> {
        match self {
            MirTy::Pointer(p) => Some(p.pointee),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&MirFunctionTy> {
        match self {
            MirTy::Function(f) => Some(f),
            _ => None,
        }
    }
}
