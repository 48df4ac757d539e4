use crate::arena::MirArena;
use crate::error::{DuplicateNameError, MirResult, TypeMismatchError, UnknownEntityError};
use crate::fun::{
    MirBasicBlock, MirBlockId, MirCallingConvention, MirFunction, MirFunctionAttribute,
    MirFunctionId, MirLinkage,
};
use crate::instr::{MirInstruction, MirInstructionId, MirOpcode};
use crate::layout::MirTargetLayout;
use crate::ty::{MirTy, MirTyId};
use crate::value::{MirArgument, MirConstantId, MirOperand, MirValue};
use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::{Display, Formatter};

/// A single record attached to a named metadata kind.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirMetadata {
    String(String),
    Function(MirFunctionId),
}

/// What a linker should do when two modules disagree on a module flag.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MirModuleFlagBehavior {
    Error,
    Warning,
    Override,
}

impl Display for MirModuleFlagBehavior {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MirModuleFlagBehavior::Error => write!(f, "error"),
            MirModuleFlagBehavior::Warning => write!(f, "warning"),
            MirModuleFlagBehavior::Override => write!(f, "override"),
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirModuleFlag {
    pub behavior: MirModuleFlagBehavior,
    pub key: String,
    pub value: u32,
}

/// Everything about a function that is not its body.
#[derive(Debug, Clone)]
pub struct MirFunctionOptions {
    pub linkage: MirLinkage,
    pub calling_convention: MirCallingConvention,
    pub dso_local: bool,
    pub attributes: BTreeSet<MirFunctionAttribute>,
}

impl Default for MirFunctionOptions {
    fn default() -> Self {
        Self {
            linkage: MirLinkage::External,
            calling_convention: MirCallingConvention::C,
            dso_local: false,
            attributes: BTreeSet::new(),
        }
    }
}

/// A module containing a set of functions, and every entity those functions are built from.
///
/// The module owns flat tables of types, constants, functions, blocks and instructions. Entities
/// refer to each other through the ids of those tables, never through references, so a module can
/// be freely moved and cloned.
///
/// The mutation methods on the module only maintain the integrity of the tables (ids point at
/// existing slots, names are unique). They do not check the typing or control flow rules of the
/// MIR. That is the job of the [`MirBuilder`](crate::builder::MirBuilder) at construction time,
/// and of [`verify`](crate::verify::verify) afterwards.
///
/// Every mutation bumps a generation counter. The verifier stamps the generation it found valid,
/// and the binary writer refuses to encode a module whose stamp is out of date.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone)]
pub struct MirModule {
    name: String,
    layout: MirTargetLayout,
    target_triple: Option<String>,
    arena: MirArena,
    functions: Vec<MirFunction>,
    #[cfg_attr(feature = "serde", serde(skip))]
    function_names: BTreeMap<String, MirFunctionId>,
    blocks: Vec<MirBasicBlock>,
    instructions: Vec<MirInstruction>,
    metadata: BTreeMap<String, Vec<MirMetadata>>,
    flags: Vec<MirModuleFlag>,
    #[cfg_attr(feature = "serde", serde(skip))]
    generation: u64,
    #[cfg_attr(feature = "serde", serde(skip))]
    verified_generation: Cell<Option<u64>>,
}

/// Modules compare structurally. Blocks and instructions are matched by their position within
/// their function, so two modules holding the same bodies are equal regardless of the order in
/// which those bodies were built.
impl PartialEq for MirModule {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.layout == other.layout
            && self.target_triple == other.target_triple
            && self.arena == other.arena
            && self.metadata == other.metadata
            && self.flags == other.flags
            && self.functions.len() == other.functions.len()
            && self
                .functions()
                .zip(other.functions())
                .all(|((a, f), (b, g))| {
                    f.name == g.name
                        && f.ty == g.ty
                        && f.arguments == g.arguments
                        && f.linkage == g.linkage
                        && f.calling_convention == g.calling_convention
                        && f.dso_local == g.dso_local
                        && f.attributes == g.attributes
                        && self.local_body(a) == other.local_body(b)
                })
    }
}

/// A block with every reference rewritten to a position within its function.
#[derive(PartialEq)]
struct LocalBlock<'m> {
    name: &'m str,
    instructions: Vec<LocalInstruction<'m>>,
}

#[derive(PartialEq)]
struct LocalInstruction<'m> {
    opcode: MirOpcode,
    operands: Vec<LocalOperand>,
    ty: MirTyId,
    name: Option<&'m str>,
}

#[derive(PartialEq)]
enum LocalOperand {
    Argument(u32),
    Constant(MirConstantId),
    Instruction(usize),
    Block(usize),
    Type(MirTyId),
    ForeignInstruction(MirInstructionId),
    ForeignBlock(MirBlockId),
}

impl MirModule {
    /// Create an empty module.
    pub fn new(name: impl Into<String>, layout: MirTargetLayout) -> Self {
        Self {
            name: name.into(),
            layout,
            target_triple: None,
            arena: MirArena::new(),
            functions: Vec::new(),
            function_names: BTreeMap::new(),
            blocks: Vec::new(),
            instructions: Vec::new(),
            metadata: BTreeMap::new(),
            flags: Vec::new(),
            generation: 0,
            verified_generation: Cell::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> &MirTargetLayout {
        &self.layout
    }

    pub fn target_triple(&self) -> Option<&str> {
        self.target_triple.as_deref()
    }

    pub fn arena(&self) -> &MirArena {
        &self.arena
    }

    pub fn metadata(&self) -> &BTreeMap<String, Vec<MirMetadata>> {
        &self.metadata
    }

    pub fn flags(&self) -> &[MirModuleFlag] {
        &self.flags
    }

    pub fn functions(&self) -> impl Iterator<Item = (MirFunctionId, &MirFunction)> {
        self.functions
            .iter()
            .enumerate()
            .map(|(i, f)| (MirFunctionId(i as u32), f))
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    pub fn function(&self, id: MirFunctionId) -> Option<&MirFunction> {
        self.functions.get(id.index())
    }

    pub fn function_by_name(&self, name: &str) -> Option<(MirFunctionId, &MirFunction)> {
        let id = *self.function_names.get(name)?;
        self.function(id).map(|f| (id, f))
    }

    pub fn block(&self, id: MirBlockId) -> Option<&MirBasicBlock> {
        self.blocks.get(id.index())
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn instruction(&self, id: MirInstructionId) -> Option<&MirInstruction> {
        self.instructions.get(id.index())
    }

    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    /// Find a block of a function by its name.
    pub fn find_block(&self, function: MirFunctionId, name: &str) -> Option<MirBlockId> {
        self.function(function)?
            .blocks
            .iter()
            .copied()
            .find(|id| self.block(*id).is_some_and(|b| b.name == name))
    }

    /// Iterate over the instructions of a function in program order.
    pub fn function_instructions(
        &self,
        function: MirFunctionId,
    ) -> impl Iterator<Item = (MirInstructionId, &MirInstruction)> {
        self.function(function)
            .into_iter()
            .flat_map(|f| f.blocks.iter())
            .filter_map(|b| self.block(*b))
            .flat_map(|b| b.instructions.iter())
            .filter_map(|i| self.instruction(*i).map(|instr| (*i, instr)))
    }

    /// The type of a value as seen from inside the given function.
    pub fn value_ty(&self, function: MirFunctionId, value: MirValue) -> Option<MirTyId> {
        match value {
            MirValue::Argument(index) => self
                .function(function)?
                .arguments
                .get(index as usize)
                .map(|a| a.ty),
            MirValue::Constant(id) => self.arena.get_constant(id).map(|c| c.ty),
            MirValue::Instruction(id) => self.instruction(id).map(|i| i.ty),
        }
    }

    pub fn display_ty(&self, ty: MirTyId) -> String {
        self.arena.display_ty(ty).to_string()
    }

    pub fn describe_function(&self, id: MirFunctionId) -> String {
        match self.function(id) {
            Some(f) => format!("@{}", f.name),
            None => format!("<unknown function {}>", id.0),
        }
    }

    pub fn describe_block(&self, id: MirBlockId) -> String {
        match self.block(id) {
            Some(b) => format!("{}/{}", self.describe_function(b.parent), b.name),
            None => format!("<unknown block {}>", id.0),
        }
    }

    pub fn describe_instruction(&self, id: MirInstructionId) -> String {
        let Some(instr) = self.instruction(id) else {
            return format!("<unknown instruction {}>", id.0);
        };
        let position = self
            .block(instr.parent)
            .and_then(|b| b.instructions.iter().position(|i| *i == id))
            .map(|p| p.to_string())
            .unwrap_or_else(|| "?".to_owned());
        match &instr.name {
            Some(name) => format!(
                "{} {} #{} (%{})",
                self.describe_block(instr.parent),
                instr.opcode.mnemonic(),
                position,
                name
            ),
            None => format!(
                "{} {} #{}",
                self.describe_block(instr.parent),
                instr.opcode.mnemonic(),
                position
            ),
        }
    }

    fn local_body(&self, function: MirFunctionId) -> Vec<LocalBlock<'_>> {
        let blocks = self
            .function(function)
            .into_iter()
            .flat_map(|f| f.blocks.iter())
            .filter_map(|id| self.block(*id).map(|b| (*id, b)))
            .collect::<Vec<_>>();
        let block_index = blocks
            .iter()
            .enumerate()
            .map(|(i, (id, _))| (*id, i))
            .collect::<HashMap<_, _>>();
        let instruction_index = blocks
            .iter()
            .flat_map(|(_, b)| b.instructions.iter())
            .enumerate()
            .map(|(i, id)| (*id, i))
            .collect::<HashMap<_, _>>();
        let local = |operand: &MirOperand| match *operand {
            MirOperand::Value(MirValue::Argument(i)) => LocalOperand::Argument(i),
            MirOperand::Value(MirValue::Constant(c)) => LocalOperand::Constant(c),
            MirOperand::Value(MirValue::Instruction(i)) => match instruction_index.get(&i) {
                Some(local) => LocalOperand::Instruction(*local),
                None => LocalOperand::ForeignInstruction(i),
            },
            MirOperand::Block(b) => match block_index.get(&b) {
                Some(local) => LocalOperand::Block(*local),
                None => LocalOperand::ForeignBlock(b),
            },
            MirOperand::Type(ty) => LocalOperand::Type(ty),
        };
        blocks
            .iter()
            .map(|(_, block)| LocalBlock {
                name: &block.name,
                instructions: block
                    .instructions
                    .iter()
                    .filter_map(|id| self.instruction(*id))
                    .map(|instr| LocalInstruction {
                        opcode: instr.opcode,
                        operands: instr.operands.iter().map(&local).collect(),
                        ty: instr.ty,
                        name: instr.name.as_deref(),
                    })
                    .collect(),
            })
            .collect()
    }

    fn touch(&mut self) {
        self.generation += 1;
    }

    fn unknown(&self, kind: &'static str, reference: impl Display) -> UnknownEntityError {
        UnknownEntityError {
            kind,
            reference: reference.to_string(),
            module: self.name.clone(),
        }
    }

    /// Has the module been found valid by the verifier, and not been changed since?
    pub fn is_verified(&self) -> bool {
        self.verified_generation.get() == Some(self.generation)
    }

    pub(crate) fn record_verification(&self, valid: bool) {
        self.verified_generation
            .set(valid.then_some(self.generation));
    }

    pub fn set_target_triple(&mut self, triple: impl Into<String>) {
        self.touch();
        self.target_triple = Some(triple.into());
    }

    pub fn get_void_ty(&mut self) -> MirTyId {
        self.touch();
        self.arena.get_void_ty()
    }

    /// Get an integer type. Widths range from 1 to 64 bits.
    pub fn get_integer_ty(&mut self, width: u32) -> MirResult<MirTyId> {
        if !MirTy::is_supported_integer_width(width) {
            return Err(TypeMismatchError {
                opcode: "type",
                expected_type: "an integer width between 1 and 64".to_owned(),
                actual_type: format!("i{}", width),
            }
            .into());
        }
        self.touch();
        Ok(self.arena.get_integer_ty(width))
    }

    pub fn get_boolean_ty(&mut self) -> MirResult<MirTyId> {
        self.get_integer_ty(1)
    }

    pub fn get_pointer_ty(&mut self, pointee: MirTyId) -> MirResult<MirTyId> {
        if self.arena.get_type(pointee).is_none() {
            return Err(self.unknown("type", pointee).into());
        }
        self.touch();
        Ok(self.arena.get_pointer_ty(pointee))
    }

    pub fn get_function_ty(
        &mut self,
        return_type: MirTyId,
        parameters: Vec<MirTyId>,
        is_var_arg: bool,
    ) -> MirResult<MirTyId> {
        if let Some(missing) = std::iter::once(&return_type)
            .chain(parameters.iter())
            .find(|ty| self.arena.get_type(**ty).is_none())
        {
            return Err(self.unknown("type", missing).into());
        }
        self.touch();
        Ok(self.arena.get_function_ty(return_type, parameters, is_var_arg))
    }

    /// Intern a type whose component ids have already been checked by the caller.
    pub(crate) fn intern_type(&mut self, ty: MirTy) -> MirTyId {
        self.touch();
        self.arena.intern_type(ty)
    }

    /// Get an integer constant of the given integer type.
    pub fn const_int(&mut self, ty: MirTyId, value: i64) -> MirResult<MirValue> {
        let Some(target) = self.arena.get_type(ty) else {
            return Err(self.unknown("type", ty).into());
        };
        let Some(width) = target.integer_width() else {
            return Err(TypeMismatchError {
                opcode: "constant",
                expected_type: "an integer type".to_owned(),
                actual_type: self.display_ty(ty),
            }
            .into());
        };
        self.touch();
        Ok(MirValue::Constant(self.arena.intern_constant(ty, width, value)))
    }

    /// Add a function without any blocks to the module.
    pub fn push_function(
        &mut self,
        name: impl Into<String>,
        ty: MirTyId,
        arguments: Vec<MirArgument>,
        options: MirFunctionOptions,
    ) -> MirResult<MirFunctionId> {
        let name = name.into();
        if self.function_names.contains_key(&name) {
            return Err(DuplicateNameError {
                kind: "function",
                name,
                scope: format!("module {}", self.name),
            }
            .into());
        }
        self.touch();
        let id = MirFunctionId(self.functions.len() as u32);
        self.function_names.insert(name.clone(), id);
        self.functions.push(MirFunction {
            name,
            ty,
            arguments,
            blocks: Vec::new(),
            linkage: options.linkage,
            calling_convention: options.calling_convention,
            dso_local: options.dso_local,
            attributes: options.attributes,
        });
        Ok(id)
    }

    /// Append an empty block to the end of a function.
    pub fn push_block(
        &mut self,
        function: MirFunctionId,
        name: impl Into<String>,
    ) -> MirResult<MirBlockId> {
        let name = name.into();
        if self.function(function).is_none() {
            return Err(self.unknown("function", function.0).into());
        }
        if self.find_block(function, &name).is_some() {
            return Err(DuplicateNameError {
                kind: "block",
                name,
                scope: format!("function {}", self.describe_function(function)),
            }
            .into());
        }
        self.touch();
        let id = MirBlockId(self.blocks.len() as u32);
        self.blocks.push(MirBasicBlock {
            name,
            parent: function,
            instructions: Vec::new(),
        });
        self.functions[function.index()].blocks.push(id);
        Ok(id)
    }

    /// Append an instruction to the end of a block, without checking any MIR rules.
    pub fn push_instruction(
        &mut self,
        block: MirBlockId,
        opcode: MirOpcode,
        operands: Vec<MirOperand>,
        ty: MirTyId,
        name: Option<String>,
    ) -> MirResult<MirInstructionId> {
        if self.block(block).is_none() {
            return Err(self.unknown("block", block.0).into());
        }
        self.touch();
        let id = MirInstructionId(self.instructions.len() as u32);
        self.instructions.push(MirInstruction {
            opcode,
            operands,
            ty,
            name,
            parent: block,
        });
        self.blocks[block.index()].instructions.push(id);
        Ok(id)
    }

    pub fn add_metadata(&mut self, kind: impl Into<String>, record: MirMetadata) {
        self.touch();
        self.metadata.entry(kind.into()).or_default().push(record);
    }

    pub fn add_flag(
        &mut self,
        behavior: MirModuleFlagBehavior,
        key: impl Into<String>,
        value: u32,
    ) {
        self.touch();
        self.flags.push(MirModuleFlag {
            behavior,
            key: key.into(),
            value,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::{MirFunctionOptions, MirModule};
    use crate::error::MirError;
    use crate::instr::MirOpcode;
    use crate::layout::MirTargetLayout;
    use eight_macros::{assert_err, assert_matches, assert_ok, assert_some};

    #[test]
    fn test_function_and_block_names_are_unique() {
        let mut module = MirModule::new("test", MirTargetLayout::default());
        let void = module.get_void_ty();
        let ty = assert_ok!(module.get_function_ty(void, vec![], false));
        let f = assert_ok!(module.push_function("f", ty, vec![], MirFunctionOptions::default()));
        let err = assert_err!(module.push_function("f", ty, vec![], MirFunctionOptions::default()));
        assert_matches!(err, MirError::DuplicateName(_) => ());

        let entry = assert_ok!(module.push_block(f, "entry"));
        let err = assert_err!(module.push_block(f, "entry"));
        assert_matches!(err, MirError::DuplicateName(_) => ());
        assert_eq!(module.find_block(f, "entry"), Some(entry));
        assert_eq!(module.describe_block(entry), "@f/entry");
    }

    #[test]
    fn test_every_mutation_invalidates_the_verification_stamp() {
        let mut module = MirModule::new("test", MirTargetLayout::default());
        module.record_verification(true);
        assert!(module.is_verified());
        assert_ok!(module.get_integer_ty(32));
        assert!(!module.is_verified());
        module.record_verification(true);
        module.set_target_triple("x86_64-pc-linux-gnu");
        assert!(!module.is_verified());
    }

    #[test]
    fn test_push_instruction_requires_existing_block() {
        let mut module = MirModule::new("test", MirTargetLayout::default());
        let void = module.get_void_ty();
        let ty = assert_ok!(module.get_function_ty(void, vec![], false));
        let f = assert_ok!(module.push_function("f", ty, vec![], MirFunctionOptions::default()));
        let entry = assert_ok!(module.push_block(f, "entry"));
        let ret = assert_ok!(module.push_instruction(entry, MirOpcode::Ret, vec![], void, None));
        assert_eq!(assert_some!(module.block(entry)).instructions, vec![ret]);

        let mut other = MirModule::new("other", MirTargetLayout::default());
        let void = other.get_void_ty();
        let err = assert_err!(other.push_instruction(entry, MirOpcode::Ret, vec![], void, None));
        assert_matches!(err, MirError::UnknownEntity(_) => ());
    }

    #[test]
    fn test_integer_widths_are_bounded() {
        let mut module = MirModule::new("test", MirTargetLayout::default());
        for width in [0, 65, 128] {
            let err = assert_err!(module.get_integer_ty(width));
            assert_matches!(err, MirError::TypeMismatch(e) => {
                assert_eq!(e.actual_type, format!("i{}", width));
            });
        }
        assert_eq!(module.arena().type_count(), 0);
        let i64_ty = assert_ok!(module.get_integer_ty(64));
        assert_eq!(module.display_ty(i64_ty), "i64");
    }

    #[test]
    fn test_const_int_requires_integer_type() {
        let mut module = MirModule::new("test", MirTargetLayout::default());
        let void = module.get_void_ty();
        let err = assert_err!(module.const_int(void, 1));
        assert_matches!(err, MirError::TypeMismatch(_) => ());
        let i8_ty = assert_ok!(module.get_integer_ty(8));
        let a = assert_ok!(module.const_int(i8_ty, 256));
        let b = assert_ok!(module.const_int(i8_ty, 0));
        assert_eq!(a, b);
    }
}
