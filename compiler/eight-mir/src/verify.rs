//! Structural verification of MIR modules.
//!
//! The verifier checks a module in a fixed order of categories. All failures within a category are
//! collected, but the verifier stops after the first category that reports any, since the later
//! categories assume the earlier ones hold. For example, the dominance check follows branch
//! targets, so it only runs once every branch is known to point at a block of its own function.
//!
//! 1. Every function has at least one block.
//! 2. Every block ends in exactly one terminator.
//! 3. Every branch target is a block of the same function.
//! 4. Every operand refers to an existing entity, and instruction operands are defined before
//!    their use: earlier in the same block, or in a block dominating the using block.
//! 5. Every instruction has the operand shape and types its opcode requires.
//!
//! Blocks that are unreachable from the entry block are reported as warnings and do not make the
//! module invalid.
//!
//! Verifying a module stamps it with its current state. Only a module whose latest verification
//! succeeded, and which has not been changed since, can be serialized.

use crate::cfg::{reachable_blocks, MirDominators};
use crate::fun::{MirBlockId, MirFunctionId};
use crate::instr::{MirInstruction, MirInstructionId, MirOpcode};
use crate::module::MirModule;
use crate::ty::{MirPointerTy, MirTy, MirTyId};
use crate::value::{MirOperand, MirValue};
use miette::Diagnostic;
use std::fmt::{Display, Formatter};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VerificationCategory {
    Entry,
    Terminator,
    BranchTarget,
    Dominance,
    TypeRule,
}

impl Display for VerificationCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationCategory::Entry => write!(f, "entry"),
            VerificationCategory::Terminator => write!(f, "terminator"),
            VerificationCategory::BranchTarget => write!(f, "branch target"),
            VerificationCategory::Dominance => write!(f, "dominance"),
            VerificationCategory::TypeRule => write!(f, "type rule"),
        }
    }
}

/// The entity a verification failure is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirEntityRef {
    Function(MirFunctionId),
    Block(MirBlockId),
    Instruction(MirInstructionId),
}

#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
#[diagnostic(code(mir::verification_failure))]
#[error("{category} check failed at {location}: {message}")]
pub struct VerificationFailure {
    pub category: VerificationCategory,
    pub message: String,
    pub entity: MirEntityRef,
    /// Human-readable description of the entity.
    pub location: String,
}

#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
#[diagnostic(
    code(mir::unreachable_block),
    severity(Warning),
    help("no branch leads to this block, so it can never execute")
)]
#[error("block {location} is unreachable from the entry block of its function")]
pub struct UnreachableBlockWarning {
    pub block: MirBlockId,
    pub location: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(mir::verification))]
#[error("module {module} failed verification with {} failure(s)", failures.len())]
pub struct ModuleVerificationError {
    pub module: String,
    #[related]
    pub failures: Vec<VerificationFailure>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VerificationResult {
    Valid {
        warnings: Vec<UnreachableBlockWarning>,
    },
    Invalid(Vec<VerificationFailure>),
}

impl VerificationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerificationResult::Valid { .. })
    }

    pub fn warnings(&self) -> &[UnreachableBlockWarning] {
        match self {
            VerificationResult::Valid { warnings } => warnings,
            VerificationResult::Invalid(_) => &[],
        }
    }

    pub fn failures(&self) -> &[VerificationFailure] {
        match self {
            VerificationResult::Valid { .. } => &[],
            VerificationResult::Invalid(failures) => failures,
        }
    }

    /// Turn an invalid result into an error that can be reported as a single diagnostic.
    pub fn into_result(
        self,
        module: &MirModule,
    ) -> Result<Vec<UnreachableBlockWarning>, ModuleVerificationError> {
        match self {
            VerificationResult::Valid { warnings } => Ok(warnings),
            VerificationResult::Invalid(failures) => Err(ModuleVerificationError {
                module: module.name().to_owned(),
                failures,
            }),
        }
    }
}

/// Verify a module, recording the outcome on the module for the serializer.
pub fn verify(module: &MirModule) -> VerificationResult {
    let mut verifier = Verifier {
        module,
        category: VerificationCategory::Entry,
        failures: Vec::new(),
    };
    let categories = [
        VerificationCategory::Entry,
        VerificationCategory::Terminator,
        VerificationCategory::BranchTarget,
        VerificationCategory::Dominance,
        VerificationCategory::TypeRule,
    ];
    for category in categories {
        verifier.category = category;
        match category {
            VerificationCategory::Entry => verifier.check_entries(),
            VerificationCategory::Terminator => verifier.check_terminators(),
            VerificationCategory::BranchTarget => verifier.check_branch_targets(),
            VerificationCategory::Dominance => verifier.check_dominance(),
            VerificationCategory::TypeRule => verifier.check_type_rules(),
        }
        if !verifier.failures.is_empty() {
            log::debug!(
                "module {} failed {} checks with {} failure(s)",
                module.name(),
                category,
                verifier.failures.len()
            );
            module.record_verification(false);
            return VerificationResult::Invalid(verifier.failures);
        }
        log::trace!("module {} passed {} checks", module.name(), category);
    }
    let warnings = verifier.unreachable_blocks();
    module.record_verification(true);
    VerificationResult::Valid { warnings }
}

struct Verifier<'a> {
    module: &'a MirModule,
    category: VerificationCategory,
    failures: Vec<VerificationFailure>,
}

impl<'a> Verifier<'a> {
    fn fail(&mut self, entity: MirEntityRef, message: impl Into<String>) {
        let location = match entity {
            MirEntityRef::Function(id) => self.module.describe_function(id),
            MirEntityRef::Block(id) => self.module.describe_block(id),
            MirEntityRef::Instruction(id) => self.module.describe_instruction(id),
        };
        self.failures.push(VerificationFailure {
            category: self.category,
            message: message.into(),
            entity,
            location,
        });
    }

    fn function_ids(&self) -> Vec<MirFunctionId> {
        self.module.functions().map(|(id, _)| id).collect()
    }

    fn blocks_of(&self, function: MirFunctionId) -> Vec<MirBlockId> {
        self.module
            .function(function)
            .map(|f| f.blocks.clone())
            .unwrap_or_default()
    }

    fn instructions_of(&self, block: MirBlockId) -> Vec<MirInstructionId> {
        self.module
            .block(block)
            .map(|b| b.instructions.clone())
            .unwrap_or_default()
    }

    fn instruction(&self, id: MirInstructionId) -> Option<&'a MirInstruction> {
        self.module.instruction(id)
    }

    fn ty(&self, id: MirTyId) -> Option<&'a MirTy> {
        self.module.arena().get_type(id)
    }

    fn display(&self, id: MirTyId) -> String {
        self.module.display_ty(id)
    }

    fn check_entries(&mut self) {
        for function in self.function_ids() {
            if self.blocks_of(function).is_empty() {
                self.fail(
                    MirEntityRef::Function(function),
                    "function has no blocks, so it has no entry block",
                );
            }
        }
    }

    fn check_terminators(&mut self) {
        for function in self.function_ids() {
            for block in self.blocks_of(function) {
                let instructions = self.instructions_of(block);
                let Some((last, rest)) = instructions.split_last() else {
                    self.fail(MirEntityRef::Block(block), "block is empty");
                    continue;
                };
                for id in rest {
                    if self.instruction(*id).is_some_and(MirInstruction::is_terminator) {
                        self.fail(
                            MirEntityRef::Block(block),
                            "terminator appears before the end of the block",
                        );
                    }
                }
                if !self.instruction(*last).is_some_and(MirInstruction::is_terminator) {
                    self.fail(
                        MirEntityRef::Block(block),
                        "block does not end in a br or ret instruction",
                    );
                }
            }
        }
    }

    fn check_branch_targets(&mut self) {
        let module = self.module;
        for function in self.function_ids() {
            for (id, instr) in module.function_instructions(function) {
                for target in instr.successors() {
                    match module.block(target) {
                        None => self.fail(
                            MirEntityRef::Instruction(id),
                            format!("target block {} does not exist", target.index()),
                        ),
                        Some(b) if b.parent != function => self.fail(
                            MirEntityRef::Instruction(id),
                            format!(
                                "target block {} belongs to another function",
                                self.module.describe_block(target)
                            ),
                        ),
                        Some(_) => {}
                    }
                }
            }
        }
    }

    fn check_dominance(&mut self) {
        for function in self.function_ids() {
            let dominators = MirDominators::compute(self.module, function);
            let argument_count = self
                .module
                .function(function)
                .map_or(0, |f| f.arguments.len());
            for block in self.blocks_of(function) {
                let instructions = self.instructions_of(block);
                for (position, id) in instructions.iter().enumerate() {
                    let Some(instr) = self.instruction(*id) else {
                        continue;
                    };
                    let entity = MirEntityRef::Instruction(*id);
                    if self.ty(instr.ty).is_none() {
                        self.fail(entity, format!("result type {} does not exist", instr.ty));
                    }
                    for operand in &instr.operands {
                        match *operand {
                            MirOperand::Type(ty) if self.ty(ty).is_none() => {
                                self.fail(entity, format!("type operand {} does not exist", ty));
                            }
                            MirOperand::Value(MirValue::Argument(index))
                                if index as usize >= argument_count =>
                            {
                                self.fail(entity, format!("argument {} does not exist", index));
                            }
                            MirOperand::Value(MirValue::Constant(constant))
                                if self.module.arena().get_constant(constant).is_none() =>
                            {
                                self.fail(
                                    entity,
                                    format!("constant {} does not exist", constant.index()),
                                );
                            }
                            MirOperand::Value(MirValue::Instruction(def)) => {
                                self.check_definition(
                                    &dominators,
                                    function,
                                    block,
                                    &instructions[..position],
                                    entity,
                                    def,
                                );
                            }
                            _ => {}
                        }
                    }
                }
            }
        }
    }

    /// Check that the definition of an instruction operand is available at its use.
    fn check_definition(
        &mut self,
        dominators: &MirDominators,
        function: MirFunctionId,
        block: MirBlockId,
        preceding: &[MirInstructionId],
        entity: MirEntityRef,
        def: MirInstructionId,
    ) {
        let Some(def_block) = self.instruction(def).map(|i| i.parent) else {
            self.fail(entity, format!("operand instruction {} does not exist", def.index()));
            return;
        };
        if self.module.block(def_block).map(|b| b.parent) != Some(function) {
            self.fail(
                entity,
                format!(
                    "operand {} is defined in another function",
                    self.module.describe_instruction(def)
                ),
            );
            return;
        }
        // Uses in unreachable blocks are reported by the reachability warnings instead.
        if !dominators.is_reachable(block) {
            return;
        }
        let available = if def_block == block {
            preceding.contains(&def)
        } else {
            dominators.dominates(def_block, block)
        };
        if !available {
            self.fail(
                entity,
                format!(
                    "operand {} does not dominate this use",
                    self.module.describe_instruction(def)
                ),
            );
        }
    }

    fn check_type_rules(&mut self) {
        for function in self.function_ids() {
            let Some(return_type) = self.check_signature(function) else {
                continue;
            };
            let instructions = self
                .module
                .function_instructions(function)
                .map(|(id, _)| id)
                .collect::<Vec<_>>();
            for id in instructions {
                if let Some(instr) = self.instruction(id) {
                    if let Err(message) = self.check_instruction(function, return_type, instr) {
                        self.fail(MirEntityRef::Instruction(id), message);
                    }
                }
            }
        }
    }

    /// Check that a function has a function type matching its arguments, returning the return
    /// type.
    fn check_signature(&mut self, function: MirFunctionId) -> Option<MirTyId> {
        let f = self.module.function(function)?;
        let entity = MirEntityRef::Function(function);
        let Some(signature) = self.ty(f.ty).and_then(MirTy::as_function) else {
            self.fail(entity, format!("{} is not a function type", self.display(f.ty)));
            return None;
        };
        let argument_types = f.arguments.iter().map(|a| a.ty).collect::<Vec<_>>();
        if argument_types != signature.parameters {
            self.fail(entity, "argument types do not match the function type");
        }
        if let Err(message) = self.check_widths(f.ty) {
            self.fail(entity, message);
        }
        Some(signature.return_type)
    }

    fn value_ty(&self, function: MirFunctionId, value: MirValue) -> Result<MirTyId, String> {
        let ty = self
            .module
            .value_ty(function, value)
            .ok_or_else(|| format!("{} does not exist", value))?;
        if self.ty(ty).map_or(true, MirTy::is_void) {
            return Err(format!("{} does not produce a value", value));
        }
        self.check_widths(ty)?;
        Ok(ty)
    }

    /// Every integer type reachable from `ty` must be between `i1` and `i64` wide.
    fn check_widths(&self, ty: MirTyId) -> Result<(), String> {
        let mut pending = vec![ty];
        while let Some(id) = pending.pop() {
            match self.ty(id) {
                Some(MirTy::Integer(i)) if !MirTy::is_supported_integer_width(i.width) => {
                    return Err(format!("integer width {} is not supported", i.width));
                }
                Some(MirTy::Pointer(p)) => pending.push(p.pointee),
                Some(MirTy::Function(f)) => {
                    pending.push(f.return_type);
                    pending.extend(f.parameters.iter().copied());
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn expect_void(&self, instr: &MirInstruction) -> Result<(), String> {
        if self.ty(instr.ty).is_some_and(MirTy::is_void) {
            Ok(())
        } else {
            Err(format!(
                "{} must produce void, not {}",
                instr.opcode.mnemonic(),
                self.display(instr.ty)
            ))
        }
    }

    fn expect_alignment(align: u32) -> Result<(), String> {
        if align.is_power_of_two() {
            Ok(())
        } else {
            Err(format!("alignment {} is not a power of two", align))
        }
    }

    fn check_instruction(
        &self,
        function: MirFunctionId,
        return_type: MirTyId,
        instr: &MirInstruction,
    ) -> Result<(), String> {
        let malformed = || format!("malformed operands for {}", instr.opcode.mnemonic());
        let mismatch = |expected: String, actual: MirTyId| {
            format!(
                "{} expects {}, found {}",
                instr.opcode.mnemonic(),
                expected,
                self.display(actual)
            )
        };
        self.check_widths(instr.ty)?;
        match instr.opcode {
            MirOpcode::Alloca { .. } => {
                let alloca = instr.as_alloca().ok_or_else(malformed)?;
                Self::expect_alignment(alloca.align)?;
                self.check_widths(alloca.allocated_ty)?;
                if !self.ty(alloca.allocated_ty).is_some_and(MirTy::is_sized) {
                    return Err(mismatch("a sized type".to_owned(), alloca.allocated_ty));
                }
                let pointer = self.module.arena().find_type(&MirTy::Pointer(MirPointerTy {
                    pointee: alloca.allocated_ty,
                }));
                if pointer != Some(instr.ty) {
                    return Err(format!(
                        "alloca of {} must produce a pointer to it, not {}",
                        self.display(alloca.allocated_ty),
                        self.display(instr.ty)
                    ));
                }
            }
            MirOpcode::Store { .. } => {
                let store = instr.as_store().ok_or_else(malformed)?;
                Self::expect_alignment(store.align)?;
                let value_ty = self.value_ty(function, store.value)?;
                let pointer_ty = self.value_ty(function, store.pointer)?;
                let pointee = self
                    .ty(pointer_ty)
                    .and_then(MirTy::pointee)
                    .ok_or_else(|| mismatch("a pointer".to_owned(), pointer_ty))?;
                if pointee != value_ty {
                    return Err(mismatch(self.display(pointee), value_ty));
                }
                self.expect_void(instr)?;
            }
            MirOpcode::Load { .. } => {
                let load = instr.as_load().ok_or_else(malformed)?;
                Self::expect_alignment(load.align)?;
                let pointer_ty = self.value_ty(function, load.pointer)?;
                let pointee = self
                    .ty(pointer_ty)
                    .and_then(MirTy::pointee)
                    .ok_or_else(|| mismatch("a pointer".to_owned(), pointer_ty))?;
                if pointee != instr.ty {
                    return Err(mismatch(self.display(pointee), instr.ty));
                }
            }
            MirOpcode::ICmp(_) => {
                let icmp = instr.as_icmp().ok_or_else(malformed)?;
                let lhs = self.value_ty(function, icmp.lhs)?;
                let rhs = self.value_ty(function, icmp.rhs)?;
                if !self.ty(lhs).is_some_and(MirTy::is_integer) {
                    return Err(mismatch("an integer".to_owned(), lhs));
                }
                if lhs != rhs {
                    return Err(mismatch(self.display(lhs), rhs));
                }
                if !self.ty(instr.ty).is_some_and(MirTy::is_boolean) {
                    return Err(format!("icmp must produce i1, not {}", self.display(instr.ty)));
                }
            }
            MirOpcode::Br => {
                let br = instr.as_br().ok_or_else(malformed)?;
                if let Some(condition) = br.condition {
                    let ty = self.value_ty(function, condition)?;
                    if !self.ty(ty).is_some_and(MirTy::is_boolean) {
                        return Err(mismatch("an i1 condition".to_owned(), ty));
                    }
                }
                self.expect_void(instr)?;
            }
            MirOpcode::Ret => {
                let ret = instr.as_ret().ok_or_else(malformed)?;
                match ret.value {
                    Some(value) => {
                        let ty = self.value_ty(function, value)?;
                        if ty != return_type {
                            return Err(mismatch(self.display(return_type), ty));
                        }
                    }
                    None if self.ty(return_type).is_some_and(MirTy::is_void) => {}
                    None => {
                        return Err(format!(
                            "ret without a value in a function returning {}",
                            self.display(return_type)
                        ));
                    }
                }
                self.expect_void(instr)?;
            }
        }
        Ok(())
    }

    fn unreachable_blocks(&self) -> Vec<UnreachableBlockWarning> {
        let mut warnings = Vec::new();
        for function in self.function_ids() {
            let reachable = reachable_blocks(self.module, function);
            for block in self.blocks_of(function) {
                if !reachable.contains(&block) {
                    log::warn!(
                        "block {} is unreachable",
                        self.module.describe_block(block)
                    );
                    warnings.push(UnreachableBlockWarning {
                        block,
                        location: self.module.describe_block(block),
                    });
                }
            }
        }
        warnings
    }
}
