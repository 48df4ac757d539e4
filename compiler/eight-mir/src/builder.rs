//! Checked construction of MIR functions.
//!
//! The [`MirBuilder`] is the only way to construct instructions that is guaranteed to keep a
//! module well-typed. Every `append_*` method checks the operands against the typing rule of the
//! opcode before anything is written to the module, so a failing call leaves the module exactly as
//! it was.

use crate::error::{
    BlockAlreadyTerminatedError, ForeignBlockError, MirResult, TypeMismatchError,
    UnknownEntityError,
};
use crate::fun::{MirBlockId, MirFunctionId};
use crate::instr::{MirInstructionId, MirIntPredicate, MirOpcode};
use crate::module::{MirFunctionOptions, MirModule};
use crate::ty::{MirTy, MirTyId};
use crate::value::{MirArgument, MirOperand, MirValue};

pub struct MirBuilder<'m> {
    module: &'m mut MirModule,
}

impl<'m> MirBuilder<'m> {
    pub fn new(module: &'m mut MirModule) -> Self {
        Self { module }
    }

    pub fn module(&self) -> &MirModule {
        self.module
    }

    /// Access the module for interning types and constants.
    pub fn module_mut(&mut self) -> &mut MirModule {
        self.module
    }

    pub fn const_int(&mut self, ty: MirTyId, value: i64) -> MirResult<MirValue> {
        self.module.const_int(ty, value)
    }

    /// Get the argument at the given position of a function as a value.
    pub fn argument(&self, function: MirFunctionId, index: u32) -> MirResult<MirValue> {
        let f = self.function(function)?;
        if index as usize >= f.arguments.len() {
            return Err(self.unknown("argument", format!("{} of @{}", index, f.name)).into());
        }
        Ok(MirValue::Argument(index))
    }

    /// Create a function without a body.
    ///
    /// The signature must be a function type, and there must be exactly one argument name for
    /// each of its parameters.
    pub fn create_function(
        &mut self,
        name: &str,
        signature: MirTyId,
        argument_names: &[&str],
        options: MirFunctionOptions,
    ) -> MirResult<MirFunctionId> {
        let parameters = match self.module.arena().get_type(signature) {
            Some(MirTy::Function(f)) => f.parameters.clone(),
            Some(_) => {
                return Err(self.mismatch("function", "a function type", signature).into());
            }
            None => return Err(self.unknown("type", signature).into()),
        };
        if parameters.len() != argument_names.len() {
            return Err(TypeMismatchError {
                opcode: "function",
                expected_type: format!("{} argument names", parameters.len()),
                actual_type: format!("{} argument names", argument_names.len()),
            }
            .into());
        }
        let arguments = argument_names
            .iter()
            .zip(parameters)
            .map(|(name, ty)| MirArgument {
                name: (*name).to_owned(),
                ty,
            })
            .collect();
        let id = self
            .module
            .push_function(name, signature, arguments, options)?;
        log::debug!("created function @{}", name);
        Ok(id)
    }

    /// Append a new, empty block to a function. The first block created becomes the entry block.
    pub fn create_block(&mut self, function: MirFunctionId, name: &str) -> MirResult<MirBlockId> {
        let id = self.module.push_block(function, name)?;
        log::debug!("created block {}", self.module.describe_block(id));
        Ok(id)
    }

    /// Allocate a stack slot for a value of the given type.
    pub fn append_alloca(
        &mut self,
        block: MirBlockId,
        ty: MirTyId,
        align: Option<u32>,
        name: &str,
    ) -> MirResult<MirValue> {
        self.check_appendable(block, "alloca")?;
        let align = self.resolve_alignment("alloca", ty, align)?;
        let result_ty = self.module.get_pointer_ty(ty)?;
        let id = self.push(
            block,
            MirOpcode::Alloca { align },
            vec![MirOperand::Type(ty)],
            result_ty,
            name,
        )?;
        Ok(MirValue::Instruction(id))
    }

    /// Store a value through a pointer to a value of the same type.
    pub fn append_store(
        &mut self,
        block: MirBlockId,
        value: MirValue,
        pointer: MirValue,
        align: Option<u32>,
    ) -> MirResult<MirInstructionId> {
        let function = self.check_appendable(block, "store")?;
        let value_ty = self.resolve_value(function, value, "store")?;
        let pointee = self.resolve_pointee(function, pointer, "store")?;
        if value_ty != pointee {
            return Err(TypeMismatchError {
                opcode: "store",
                expected_type: self.module.display_ty(pointee),
                actual_type: self.module.display_ty(value_ty),
            }
            .into());
        }
        let align = self.resolve_alignment("store", value_ty, align)?;
        let void = self.module.get_void_ty();
        self.push(
            block,
            MirOpcode::Store { align },
            vec![value.into(), pointer.into()],
            void,
            "",
        )
    }

    /// Load a value of the given type from a pointer to that type.
    pub fn append_load(
        &mut self,
        block: MirBlockId,
        ty: MirTyId,
        pointer: MirValue,
        align: Option<u32>,
        name: &str,
    ) -> MirResult<MirValue> {
        let function = self.check_appendable(block, "load")?;
        let pointee = self.resolve_pointee(function, pointer, "load")?;
        if pointee != ty {
            return Err(TypeMismatchError {
                opcode: "load",
                expected_type: self.module.display_ty(pointee),
                actual_type: self.module.display_ty(ty),
            }
            .into());
        }
        let align = self.resolve_alignment("load", ty, align)?;
        let id = self.push(
            block,
            MirOpcode::Load { align },
            vec![pointer.into()],
            ty,
            name,
        )?;
        Ok(MirValue::Instruction(id))
    }

    /// Compare two integers of the same type, producing an `i1`.
    pub fn append_icmp(
        &mut self,
        block: MirBlockId,
        predicate: MirIntPredicate,
        lhs: MirValue,
        rhs: MirValue,
        name: &str,
    ) -> MirResult<MirValue> {
        let function = self.check_appendable(block, "icmp")?;
        let lhs_ty = self.resolve_value(function, lhs, "icmp")?;
        let rhs_ty = self.resolve_value(function, rhs, "icmp")?;
        if !self.is_integer(lhs_ty) {
            return Err(self.mismatch("icmp", "an integer type", lhs_ty).into());
        }
        if lhs_ty != rhs_ty {
            return Err(TypeMismatchError {
                opcode: "icmp",
                expected_type: self.module.display_ty(lhs_ty),
                actual_type: self.module.display_ty(rhs_ty),
            }
            .into());
        }
        let bool_ty = self.module.get_boolean_ty()?;
        let id = self.push(
            block,
            MirOpcode::ICmp(predicate),
            vec![lhs.into(), rhs.into()],
            bool_ty,
            name,
        )?;
        Ok(MirValue::Instruction(id))
    }

    /// Unconditionally jump to another block of the same function.
    pub fn append_br(
        &mut self,
        block: MirBlockId,
        target: MirBlockId,
    ) -> MirResult<MirInstructionId> {
        let function = self.check_appendable(block, "br")?;
        self.check_target(function, target)?;
        let void = self.module.get_void_ty();
        self.push(block, MirOpcode::Br, vec![MirOperand::Block(target)], void, "")
    }

    /// Jump to one of two blocks of the same function depending on an `i1` condition.
    pub fn append_cond_br(
        &mut self,
        block: MirBlockId,
        condition: MirValue,
        true_target: MirBlockId,
        false_target: MirBlockId,
    ) -> MirResult<MirInstructionId> {
        let function = self.check_appendable(block, "br")?;
        let condition_ty = self.resolve_value(function, condition, "br")?;
        let is_boolean = self
            .module
            .arena()
            .get_type(condition_ty)
            .is_some_and(MirTy::is_boolean);
        if !is_boolean {
            return Err(self.mismatch("br", "i1", condition_ty).into());
        }
        self.check_target(function, true_target)?;
        self.check_target(function, false_target)?;
        let void = self.module.get_void_ty();
        self.push(
            block,
            MirOpcode::Br,
            vec![
                condition.into(),
                MirOperand::Block(true_target),
                MirOperand::Block(false_target),
            ],
            void,
            "",
        )
    }

    /// Return from the function. The value must match the return type, and must be absent for
    /// functions returning void.
    pub fn append_ret(
        &mut self,
        block: MirBlockId,
        value: Option<MirValue>,
    ) -> MirResult<MirInstructionId> {
        let function = self.check_appendable(block, "ret")?;
        let signature = self.function(function)?.ty;
        let return_type = match self.module.arena().get_type(signature) {
            Some(MirTy::Function(f)) => f.return_type,
            _ => return Err(self.mismatch("ret", "a function type", signature).into()),
        };
        let returns_void = self
            .module
            .arena()
            .get_type(return_type)
            .is_some_and(MirTy::is_void);
        let operands = match value {
            Some(value) => {
                let value_ty = self.resolve_value(function, value, "ret")?;
                if value_ty != return_type {
                    return Err(TypeMismatchError {
                        opcode: "ret",
                        expected_type: self.module.display_ty(return_type),
                        actual_type: self.module.display_ty(value_ty),
                    }
                    .into());
                }
                vec![value.into()]
            }
            None if returns_void => vec![],
            None => {
                return Err(TypeMismatchError {
                    opcode: "ret",
                    expected_type: self.module.display_ty(return_type),
                    actual_type: "void".to_owned(),
                }
                .into());
            }
        };
        let void = self.module.get_void_ty();
        self.push(block, MirOpcode::Ret, operands, void, "")
    }

    fn push(
        &mut self,
        block: MirBlockId,
        opcode: MirOpcode,
        operands: Vec<MirOperand>,
        ty: MirTyId,
        name: &str,
    ) -> MirResult<MirInstructionId> {
        let name = (!name.is_empty()).then(|| name.to_owned());
        let id = self
            .module
            .push_instruction(block, opcode, operands, ty, name)?;
        log::debug!("appended {}", self.module.describe_instruction(id));
        Ok(id)
    }

    fn function(&self, id: MirFunctionId) -> MirResult<&crate::fun::MirFunction> {
        self.module
            .function(id)
            .ok_or_else(|| self.unknown("function", id.index()).into())
    }

    fn unknown(&self, kind: &'static str, reference: impl ToString) -> UnknownEntityError {
        UnknownEntityError {
            kind,
            reference: reference.to_string(),
            module: self.module.name().to_owned(),
        }
    }

    fn mismatch(&self, opcode: &'static str, expected: &str, actual: MirTyId) -> TypeMismatchError {
        TypeMismatchError {
            opcode,
            expected_type: expected.to_owned(),
            actual_type: self.module.display_ty(actual),
        }
    }

    fn is_integer(&self, ty: MirTyId) -> bool {
        self.module
            .arena()
            .get_type(ty)
            .is_some_and(MirTy::is_integer)
    }

    /// Ensure the block exists and has no terminator yet, returning the function that owns it.
    fn check_appendable(
        &self,
        block: MirBlockId,
        opcode: &'static str,
    ) -> MirResult<MirFunctionId> {
        let Some(b) = self.module.block(block) else {
            return Err(self.unknown("block", block.index()).into());
        };
        let terminated = b
            .last_instruction()
            .and_then(|i| self.module.instruction(i))
            .is_some_and(|i| i.is_terminator());
        if terminated {
            return Err(BlockAlreadyTerminatedError {
                opcode,
                block: self.module.describe_block(block),
            }
            .into());
        }
        Ok(b.parent)
    }

    fn check_target(&self, function: MirFunctionId, target: MirBlockId) -> MirResult<()> {
        let Some(b) = self.module.block(target) else {
            return Err(self.unknown("block", target.index()).into());
        };
        if b.parent != function {
            return Err(ForeignBlockError {
                block: self.module.describe_block(target),
                function: self.module.describe_function(function),
            }
            .into());
        }
        Ok(())
    }

    /// Find the type of a value used inside the given function.
    ///
    /// Instructions must belong to the same function, and must produce a value.
    fn resolve_value(
        &self,
        function: MirFunctionId,
        value: MirValue,
        opcode: &'static str,
    ) -> MirResult<MirTyId> {
        if let MirValue::Instruction(id) = value {
            let owner = self
                .module
                .instruction(id)
                .and_then(|i| self.module.block(i.parent))
                .map(|b| b.parent);
            if owner != Some(function) {
                return Err(self.unknown("value", value).into());
            }
        }
        let Some(ty) = self.module.value_ty(function, value) else {
            return Err(self.unknown("value", value).into());
        };
        let is_void = self
            .module
            .arena()
            .get_type(ty)
            .map_or(true, MirTy::is_void);
        if is_void {
            return Err(self.mismatch(opcode, "a value", ty).into());
        }
        Ok(ty)
    }

    fn resolve_pointee(
        &self,
        function: MirFunctionId,
        pointer: MirValue,
        opcode: &'static str,
    ) -> MirResult<MirTyId> {
        let ty = self.resolve_value(function, pointer, opcode)?;
        self.module
            .arena()
            .get_type(ty)
            .and_then(MirTy::pointee)
            .ok_or_else(|| self.mismatch(opcode, "a pointer type", ty).into())
    }

    /// Use the explicit alignment if one is given, otherwise the ABI alignment of the type.
    fn resolve_alignment(
        &self,
        opcode: &'static str,
        ty: MirTyId,
        align: Option<u32>,
    ) -> MirResult<u32> {
        match align {
            Some(align) if align.is_power_of_two() => Ok(align),
            Some(align) => Err(TypeMismatchError {
                opcode,
                expected_type: "a power of two alignment".to_owned(),
                actual_type: format!("align {}", align),
            }
            .into()),
            None => self
                .module
                .layout()
                .abi_alignment(self.module.arena(), ty)
                .ok_or_else(|| self.mismatch(opcode, "a sized type", ty).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MirBuilder;
    use crate::error::MirError;
    use crate::fun::{MirBlockId, MirFunctionId};
    use crate::instr::MirIntPredicate;
    use crate::layout::MirTargetLayout;
    use crate::module::{MirFunctionOptions, MirModule};
    use crate::ty::MirTyId;
    use eight_macros::{assert_err, assert_matches, assert_ok, assert_some};

    fn function(
        module: &mut MirModule,
        name: &str,
        ret: MirTyId,
        params: &[(&str, MirTyId)],
    ) -> (MirFunctionId, MirBlockId) {
        let ty = assert_ok!(module.get_function_ty(
            ret,
            params.iter().map(|(_, ty)| *ty).collect(),
            false
        ));
        let names = params.iter().map(|(name, _)| *name).collect::<Vec<_>>();
        let mut builder = MirBuilder::new(module);
        let f = assert_ok!(builder.create_function(
            name,
            ty,
            &names,
            MirFunctionOptions::default()
        ));
        let entry = assert_ok!(builder.create_block(f, "entry"));
        (f, entry)
    }

    #[test]
    fn test_store_into_narrower_pointer_is_rejected() {
        let mut module = MirModule::new("test", MirTargetLayout::default());
        let i32_ty = assert_ok!(module.get_integer_ty(32));
        let i8_ty = assert_ok!(module.get_integer_ty(8));
        let void = module.get_void_ty();
        let (f, entry) = function(&mut module, "f", void, &[("x", i32_ty)]);
        let mut builder = MirBuilder::new(&mut module);
        let slot = assert_ok!(builder.append_alloca(entry, i8_ty, None, "slot"));
        let x = assert_ok!(builder.argument(f, 0));
        let count = builder.module().instruction_count();
        let err = assert_err!(builder.append_store(entry, x, slot, None));
        assert_matches!(err, MirError::TypeMismatch(e) => {
            assert_eq!(e.expected_type, "i8");
            assert_eq!(e.actual_type, "i32");
        });
        assert_eq!(builder.module().instruction_count(), count);
    }

    #[test]
    fn test_append_after_terminator_is_rejected() {
        let mut module = MirModule::new("test", MirTargetLayout::default());
        let void = module.get_void_ty();
        let (_, entry) = function(&mut module, "f", void, &[]);
        let mut builder = MirBuilder::new(&mut module);
        assert_ok!(builder.append_ret(entry, None));
        let err = assert_err!(builder.append_ret(entry, None));
        assert_matches!(err, MirError::BlockAlreadyTerminated(e) => {
            assert_eq!(e.block, "@f/entry");
        });
    }

    #[test]
    fn test_branch_targets_must_share_the_function() {
        let mut module = MirModule::new("test", MirTargetLayout::default());
        let void = module.get_void_ty();
        let (_, f_entry) = function(&mut module, "f", void, &[]);
        let (_, g_entry) = function(&mut module, "g", void, &[]);
        let mut builder = MirBuilder::new(&mut module);
        let err = assert_err!(builder.append_br(f_entry, g_entry));
        assert_matches!(err, MirError::ForeignBlock(_) => ());
    }

    #[test]
    fn test_condition_must_be_boolean() {
        let mut module = MirModule::new("test", MirTargetLayout::default());
        let i32_ty = assert_ok!(module.get_integer_ty(32));
        let void = module.get_void_ty();
        let (f, entry) = function(&mut module, "f", void, &[("x", i32_ty)]);
        let mut builder = MirBuilder::new(&mut module);
        let exit = assert_ok!(builder.create_block(f, "exit"));
        let x = assert_ok!(builder.argument(f, 0));
        let err = assert_err!(builder.append_cond_br(entry, x, exit, exit));
        assert_matches!(err, MirError::TypeMismatch(_) => ());

        let zero = assert_ok!(builder.const_int(i32_ty, 0));
        let cmp = assert_ok!(builder.append_icmp(entry, MirIntPredicate::Eq, x, zero, "cmp"));
        assert_ok!(builder.append_cond_br(entry, cmp, exit, exit));
    }

    #[test]
    fn test_icmp_operands_must_share_an_integer_type() {
        let mut module = MirModule::new("test", MirTargetLayout::default());
        let i32_ty = assert_ok!(module.get_integer_ty(32));
        let i64_ty = assert_ok!(module.get_integer_ty(64));
        let void = module.get_void_ty();
        let (f, entry) = function(&mut module, "f", void, &[("x", i32_ty), ("y", i64_ty)]);
        let mut builder = MirBuilder::new(&mut module);
        let x = assert_ok!(builder.argument(f, 0));
        let y = assert_ok!(builder.argument(f, 1));
        let err = assert_err!(builder.append_icmp(entry, MirIntPredicate::Lt, x, y, ""));
        assert_matches!(err, MirError::TypeMismatch(_) => ());
        let slot = assert_ok!(builder.append_alloca(entry, i32_ty, None, "slot"));
        let err = assert_err!(builder.append_icmp(entry, MirIntPredicate::Lt, slot, slot, ""));
        assert_matches!(err, MirError::TypeMismatch(_) => ());
    }

    #[test]
    fn test_default_alignment_follows_target_layout() {
        let layout = assert_ok!(MirTargetLayout::parse("e-p:32:32"));
        let mut module = MirModule::new("test", layout);
        let i8_ty = assert_ok!(module.get_integer_ty(8));
        let ptr = assert_ok!(module.get_pointer_ty(i8_ty));
        let void = module.get_void_ty();
        let (_, entry) = function(&mut module, "f", void, &[]);
        let mut builder = MirBuilder::new(&mut module);
        let a = assert_ok!(builder.append_alloca(entry, i8_ty, None, "a"));
        let p = assert_ok!(builder.append_alloca(entry, ptr, None, "p"));
        let err = assert_err!(builder.append_alloca(entry, i8_ty, Some(3), "b"));
        assert_matches!(err, MirError::TypeMismatch(_) => ());
        let err = assert_err!(builder.append_alloca(entry, void, None, "v"));
        assert_matches!(err, MirError::TypeMismatch(_) => ());

        let alloca = |value| match value {
            crate::value::MirValue::Instruction(id) => {
                assert_some!(assert_some!(builder.module().instruction(id)).as_alloca())
            }
            _ => panic!("expected an instruction"),
        };
        assert_eq!(alloca(a).align, 1);
        assert_eq!(alloca(p).align, 4);
    }

    #[test]
    fn test_ret_must_match_return_type() {
        let mut module = MirModule::new("test", MirTargetLayout::default());
        let i32_ty = assert_ok!(module.get_integer_ty(32));
        let i1 = assert_ok!(module.get_boolean_ty());
        let (_, entry) = function(&mut module, "f", i32_ty, &[]);
        let mut builder = MirBuilder::new(&mut module);
        let err = assert_err!(builder.append_ret(entry, None));
        assert_matches!(err, MirError::TypeMismatch(_) => ());
        let t = assert_ok!(builder.const_int(i1, 1));
        let err = assert_err!(builder.append_ret(entry, Some(t)));
        assert_matches!(err, MirError::TypeMismatch(_) => ());
        let one = assert_ok!(builder.const_int(i32_ty, 1));
        assert_ok!(builder.append_ret(entry, Some(one)));
    }

    #[test]
    fn test_values_from_other_functions_are_rejected() {
        let mut module = MirModule::new("test", MirTargetLayout::default());
        let i32_ty = assert_ok!(module.get_integer_ty(32));
        let void = module.get_void_ty();
        let (_, f_entry) = function(&mut module, "f", void, &[]);
        let (_, g_entry) = function(&mut module, "g", i32_ty, &[]);
        let mut builder = MirBuilder::new(&mut module);
        let slot = assert_ok!(builder.append_alloca(f_entry, i32_ty, None, "slot"));
        let err = assert_err!(builder.append_load(g_entry, i32_ty, slot, None, ""));
        assert_matches!(err, MirError::UnknownEntity(_) => ());
    }

    #[test]
    fn test_create_function_checks_signature() {
        let mut module = MirModule::new("test", MirTargetLayout::default());
        let i32_ty = assert_ok!(module.get_integer_ty(32));
        let ty = assert_ok!(module.get_function_ty(i32_ty, vec![i32_ty], false));
        let mut builder = MirBuilder::new(&mut module);
        let err = assert_err!(builder.create_function(
            "f",
            i32_ty,
            &[],
            MirFunctionOptions::default()
        ));
        assert_matches!(err, MirError::TypeMismatch(_) => ());
        let err = assert_err!(builder.create_function("f", ty, &[], MirFunctionOptions::default()));
        assert_matches!(err, MirError::TypeMismatch(_) => ());
        assert_ok!(builder.create_function("f", ty, &["x"], MirFunctionOptions::default()));
        let err = assert_err!(builder.create_function(
            "f",
            ty,
            &["y"],
            MirFunctionOptions::default()
        ));
        assert_matches!(err, MirError::DuplicateName(_) => ());
    }
}
