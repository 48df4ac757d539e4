use crate::ty::{MirFunctionTy, MirIntegerTy, MirPointerTy, MirTy, MirTyId};
use crate::value::{MirConstantId, MirConstantInt};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// The interning tables of a single MIR module.
///
/// In order to avoid duplication of types, every type is interned into this arena exactly once
/// and referred to by its [`MirTyId`] from then on. This makes comparison of types an integer
/// comparison, which the verifier relies on for its operand checks.
///
/// Integer constants are interned the same way, keyed by their type and value.
///
/// Slots are handed out in insertion order, so building the same module twice yields the same ids.
/// The lookup maps are only caches over the slot vectors.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MirArena {
    types: Vec<MirTy>,
    #[cfg_attr(feature = "serde", serde(skip))]
    type_ids: HashMap<MirTy, MirTyId>,
    constants: Vec<MirConstantInt>,
    #[cfg_attr(feature = "serde", serde(skip))]
    constant_ids: HashMap<MirConstantInt, MirConstantId>,
}

impl MirArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a type from the arena.
    pub fn get_type(&self, id: MirTyId) -> Option<&MirTy> {
        self.types.get(id.index())
    }

    /// Find the id of an already interned type without interning it.
    pub fn find_type(&self, ty: &MirTy) -> Option<MirTyId> {
        self.type_ids.get(ty).copied()
    }

    pub fn types(&self) -> impl Iterator<Item = (MirTyId, &MirTy)> {
        self.types
            .iter()
            .enumerate()
            .map(|(i, ty)| (MirTyId(i as u32), ty))
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn get_constant(&self, id: MirConstantId) -> Option<&MirConstantInt> {
        self.constants.get(id.index())
    }

    pub fn constants(&self) -> impl Iterator<Item = (MirConstantId, &MirConstantInt)> {
        self.constants
            .iter()
            .enumerate()
            .map(|(i, c)| (MirConstantId(i as u32), c))
    }

    pub fn constant_count(&self) -> usize {
        self.constants.len()
    }

    /// Intern a type, returning the id of the existing slot if an equal type is already present.
    ///
    /// The caller is responsible for the component ids of compound types referring to existing
    /// slots.
    pub(crate) fn intern_type(&mut self, ty: MirTy) -> MirTyId {
        if let Some(id) = self.type_ids.get(&ty) {
            return *id;
        }
        let id = MirTyId(self.types.len() as u32);
        self.types.push(ty.clone());
        self.type_ids.insert(ty, id);
        id
    }

    pub(crate) fn get_void_ty(&mut self) -> MirTyId {
        self.intern_type(MirTy::Void)
    }

    pub(crate) fn get_integer_ty(&mut self, width: u32) -> MirTyId {
        self.intern_type(MirTy::Integer(MirIntegerTy { width }))
    }

    pub(crate) fn get_pointer_ty(&mut self, pointee: MirTyId) -> MirTyId {
        self.intern_type(MirTy::Pointer(MirPointerTy { pointee }))
    }

    pub(crate) fn get_function_ty(
        &mut self,
        return_type: MirTyId,
        parameters: Vec<MirTyId>,
        is_var_arg: bool,
    ) -> MirTyId {
        self.intern_type(MirTy::Function(MirFunctionTy {
            return_type,
            parameters,
            is_var_arg,
        }))
    }

    /// Intern an integer constant of the given integer type.
    ///
    /// The value is truncated to the width of the type and sign-extended back, so that `i1 -1` and
    /// `i1 1` are the same constant.
    pub(crate) fn intern_constant(&mut self, ty: MirTyId, width: u32, value: i64) -> MirConstantId {
        let constant = MirConstantInt {
            ty,
            value: truncate_to_width(value, width),
        };
        if let Some(id) = self.constant_ids.get(&constant) {
            return *id;
        }
        let id = MirConstantId(self.constants.len() as u32);
        self.constants.push(constant);
        self.constant_ids.insert(constant, id);
        id
    }

    /// Render a type by following its component ids through this arena.
    pub fn display_ty(&self, id: MirTyId) -> MirTyDisplay<'_> {
        MirTyDisplay { arena: self, id }
    }
}

/// Truncate a value to the given bit width, sign-extending the result back to 64 bits.
pub fn truncate_to_width(value: i64, width: u32) -> i64 {
    if width == 0 || width >= 64 {
        return value;
    }
    let shift = 64 - width;
    (value << shift) >> shift
}

pub struct MirTyDisplay<'a> {
    arena: &'a MirArena,
    id: MirTyId,
}

impl Display for MirTyDisplay<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let Some(ty) = self.arena.get_type(self.id) else {
            return write!(f, "<unknown type {}>", self.id);
        };
        match ty {
            MirTy::Void => write!(f, "void"),
            MirTy::Integer(i) => write!(f, "i{}", i.width),
            MirTy::Pointer(p) => write!(f, "*{}", self.arena.display_ty(p.pointee)),
            MirTy::Function(func) => {
                let mut params = func
                    .parameters
                    .iter()
                    .map(|p| self.arena.display_ty(*p).to_string())
                    .collect::<Vec<_>>();
                if func.is_var_arg {
                    params.push("...".to_owned());
                }
                write!(
                    f,
                    "fn({}) -> {}",
                    params.join(", "),
                    self.arena.display_ty(func.return_type)
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{truncate_to_width, MirArena};
    use crate::ty::MirTy;
    use eight_macros::assert_some;

    #[test]
    fn test_types_are_interned_once() {
        let mut arena = MirArena::new();
        let a = arena.get_integer_ty(32);
        let b = arena.get_integer_ty(32);
        let c = arena.get_integer_ty(8);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(arena.type_count(), 2);

        let p = arena.get_pointer_ty(a);
        assert_eq!(p, arena.get_pointer_ty(b));
        assert_eq!(assert_some!(arena.get_type(p)).pointee(), Some(a));
    }

    #[test]
    fn test_function_types_compare_structurally() {
        let mut arena = MirArena::new();
        let i32_ty = arena.get_integer_ty(32);
        let f = arena.get_function_ty(i32_ty, vec![i32_ty, i32_ty], false);
        let g = arena.get_function_ty(i32_ty, vec![i32_ty, i32_ty], false);
        let h = arena.get_function_ty(i32_ty, vec![i32_ty, i32_ty], true);
        assert_eq!(f, g);
        assert_ne!(f, h);
        assert_eq!(arena.find_type(&MirTy::Void), None);
    }

    #[test]
    fn test_display_types() {
        let mut arena = MirArena::new();
        let i32_ty = arena.get_integer_ty(32);
        let ptr = arena.get_pointer_ty(i32_ty);
        let void = arena.get_void_ty();
        let f = arena.get_function_ty(void, vec![ptr, i32_ty], true);
        assert_eq!(arena.display_ty(ptr).to_string(), "*i32");
        assert_eq!(arena.display_ty(f).to_string(), "fn(*i32, i32, ...) -> void");
    }

    #[test]
    fn test_constants_are_truncated_and_interned() {
        let mut arena = MirArena::new();
        let i1 = arena.get_integer_ty(1);
        let a = arena.intern_constant(i1, 1, 1);
        let b = arena.intern_constant(i1, 1, -1);
        assert_eq!(a, b);
        assert_eq!(assert_some!(arena.get_constant(a)).value, -1);
        assert_eq!(truncate_to_width(300, 8), 44);
        assert_eq!(truncate_to_width(i64::MIN, 64), i64::MIN);
    }
}
