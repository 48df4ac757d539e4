use super::*;
use crate::error::{MalformedModuleError, MirError};
use crate::fun::{MirCallingConvention, MirFunctionAttribute, MirFunctionId, MirLinkage};
use crate::instr::{MirInstructionId, MirIntPredicate, MirOpcode};
use crate::layout::{MirEndianness, MirTargetLayout};
use crate::module::{MirFunctionOptions, MirMetadata, MirModule, MirModuleFlagBehavior};
use crate::ty::{MirFunctionTy, MirIntegerTy, MirPointerTy, MirTy, MirTyId};
use crate::value::{MirArgument, MirConstantId, MirOperand, MirValue};
use std::collections::BTreeSet;

/// A cursor over a byte slice that remembers where the slice sits in the whole input, so that
/// errors point at absolute offsets.
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
    endianness: MirEndianness,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            base: 0,
            endianness: MirEndianness::Little,
        }
    }

    pub(crate) fn offset(&self) -> usize {
        self.base + self.pos
    }

    pub(crate) fn malformed(&self, reason: impl Into<String>) -> MirError {
        MalformedModuleError {
            offset: self.offset(),
            reason: reason.into(),
        }
        .into()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn take(&mut self, n: usize, what: &str) -> MirResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                self.malformed(format!("unexpected end of input while reading {}", what))
            })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub(crate) fn u8(&mut self, what: &str) -> MirResult<u8> {
        Ok(self.take(1, what)?[0])
    }

    pub(crate) fn bool(&mut self, what: &str) -> MirResult<bool> {
        match self.u8(what)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(self.malformed(format!("invalid {} flag {}", what, other))),
        }
    }

    pub(crate) fn u32(&mut self, what: &str) -> MirResult<u32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4, what)?);
        Ok(match self.endianness {
            MirEndianness::Little => u32::from_le_bytes(raw),
            MirEndianness::Big => u32::from_be_bytes(raw),
        })
    }

    pub(crate) fn i64(&mut self, what: &str) -> MirResult<i64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8, what)?);
        Ok(match self.endianness {
            MirEndianness::Little => i64::from_le_bytes(raw),
            MirEndianness::Big => i64::from_be_bytes(raw),
        })
    }

    pub(crate) fn count(&mut self, what: &str) -> MirResult<usize> {
        Ok(self.u32(what)? as usize)
    }

    pub(crate) fn str(&mut self, what: &str) -> MirResult<String> {
        let len = self.count(what)?;
        let start = self.offset();
        let bytes = self.take(len, what)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| {
            MalformedModuleError {
                offset: start,
                reason: format!("{} is not valid UTF-8", what),
            }
            .into()
        })
    }

    pub(crate) fn opt_str(&mut self, what: &str) -> MirResult<Option<String>> {
        if self.bool(what)? {
            self.str(what).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Read the next record, returning its tag and a reader over its payload.
    pub(crate) fn record(&mut self) -> MirResult<(u8, ByteReader<'a>)> {
        let tag = self.u8("record tag")?;
        let len = self.count("record length")?;
        let base = self.offset();
        let payload = self.take(len, "record payload")?;
        Ok((
            tag,
            ByteReader {
                data: payload,
                pos: 0,
                base,
                endianness: self.endianness,
            },
        ))
    }

    /// Fail if any bytes are left.
    pub(crate) fn finish(&self, what: &str) -> MirResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self.malformed(format!("trailing bytes after {}", what)))
        }
    }
}

struct FunctionRecord {
    name: String,
    ty: MirTyId,
    options: MirFunctionOptions,
    arguments: Vec<MirArgument>,
    blocks: Vec<BlockRecord>,
}

struct BlockRecord {
    name: String,
    instructions: Vec<InstructionRecord>,
}

struct InstructionRecord {
    opcode: MirOpcode,
    ty: MirTyId,
    name: Option<String>,
    operands: Vec<LocalOperand>,
}

/// An operand as it appears in the file, before function-local indices are turned into ids.
#[derive(Clone, Copy)]
enum LocalOperand {
    Value(MirValue),
    Instruction(u32),
    Block(u32),
    Type(MirTyId),
}

pub(crate) fn decode_module(bytes: &[u8]) -> MirResult<MirModule> {
    let mut r = ByteReader::new(bytes);
    if r.take(MAGIC.len(), "magic")? != MAGIC {
        return Err(MalformedModuleError {
            offset: 0,
            reason: "not a MIR module, bad magic".to_owned(),
        }
        .into());
    }
    let tag = r.u8("endianness")?;
    r.endianness = endianness(&r, tag)?;
    let file_endianness = r.endianness;
    let version = r.u32("format version")?;
    if version != FORMAT_VERSION {
        return Err(r.malformed(format!("unsupported format version {}", version)));
    }

    let mut module = expect_record(&mut r, RECORD_MODULE, "module", |p| {
        decode_header(p, file_endianness)
    })?;
    expect_record(&mut r, RECORD_TYPES, "type table", |p| decode_types(p, &mut module))?;
    expect_record(&mut r, RECORD_CONSTANTS, "constant table", |p| {
        decode_constants(p, &mut module)
    })?;
    let metadata = expect_record(&mut r, RECORD_METADATA, "metadata table", decode_metadata)?;
    expect_record(&mut r, RECORD_FLAGS, "flag table", |p| decode_flags(p, &mut module))?;

    loop {
        let start = r.offset();
        let (tag, mut payload) = r.record()?;
        match tag {
            RECORD_FUNCTION => {
                let function = decode_function(&mut payload, &module)?;
                payload.finish("function record")?;
                push_function(&mut module, function).map_err(|e| match e {
                    MirError::MalformedModule(e) => MirError::MalformedModule(e),
                    other => MalformedModuleError {
                        offset: start,
                        reason: other.to_string(),
                    }
                    .into(),
                })?;
            }
            RECORD_END => {
                payload.finish("end record")?;
                break;
            }
            other => {
                return Err(MalformedModuleError {
                    offset: start,
                    reason: format!("unexpected record tag {:#04x}", other),
                }
                .into());
            }
        }
    }
    r.finish("end record")?;

    let function_count = module.function_count();
    for (kind, record, offset) in metadata {
        if let MirMetadata::Function(f) = &record {
            if f.index() >= function_count {
                return Err(MalformedModuleError {
                    offset,
                    reason: format!("metadata {} refers to missing function {}", kind, f.index()),
                }
                .into());
            }
        }
        module.add_metadata(kind, record);
    }
    Ok(module)
}

fn endianness(r: &ByteReader, tag: u8) -> MirResult<MirEndianness> {
    match tag {
        0 => Ok(MirEndianness::Little),
        1 => Ok(MirEndianness::Big),
        other => Err(r.malformed(format!("unknown endianness {}", other))),
    }
}

/// Read a record that must carry the given tag, decode its payload, and check nothing is left.
fn expect_record<'a, T>(
    r: &mut ByteReader<'a>,
    tag: u8,
    what: &str,
    decode: impl FnOnce(&mut ByteReader<'a>) -> MirResult<T>,
) -> MirResult<T> {
    let start = r.offset();
    let (actual, mut payload) = r.record()?;
    if actual != tag {
        return Err(MalformedModuleError {
            offset: start,
            reason: format!("expected {} record, found tag {:#04x}", what, actual),
        }
        .into());
    }
    let value = decode(&mut payload)?;
    payload.finish(what)?;
    log::trace!("read {} record at byte {}", what, start);
    Ok(value)
}

fn decode_header(r: &mut ByteReader, file_endianness: MirEndianness) -> MirResult<MirModule> {
    let name = r.str("module name")?;
    let triple = r.opt_str("target triple")?;
    let tag = r.u8("endianness")?;
    let layout_endianness = endianness(r, tag)?;
    if layout_endianness != file_endianness {
        return Err(r.malformed("layout endianness disagrees with the file header"));
    }
    let layout = MirTargetLayout {
        endianness: layout_endianness,
        pointer_width_bits: r.u32("pointer width")?,
        pointer_align_bits: r.u32("pointer alignment")?,
        stack_align_bits: r.u32("stack alignment")?,
    };
    let layout = MirTargetLayout::parse(&layout.to_string())
        .map_err(|e| r.malformed(e.to_string()))?;
    let mut module = MirModule::new(name, layout);
    if let Some(triple) = triple {
        module.set_target_triple(triple);
    }
    Ok(module)
}

fn type_ref(r: &ByteReader, index: u32, limit: usize) -> MirResult<MirTyId> {
    if index as usize >= limit {
        return Err(r.malformed(format!("type index {} is out of bounds", index)));
    }
    Ok(MirTyId(index))
}

fn decode_types(r: &mut ByteReader, module: &mut MirModule) -> MirResult<()> {
    let count = r.count("type count")?;
    for slot in 0..count {
        let ty = match r.u8("type kind")? {
            TYPE_VOID => MirTy::Void,
            TYPE_INTEGER => {
                let width = r.u32("integer width")?;
                if !MirTy::is_supported_integer_width(width) {
                    return Err(r.malformed(format!("unsupported integer width {}", width)));
                }
                MirTy::Integer(MirIntegerTy { width })
            }
            TYPE_POINTER => {
                let pointee = r.u32("pointee type")?;
                MirTy::Pointer(MirPointerTy {
                    pointee: type_ref(r, pointee, slot)?,
                })
            }
            TYPE_FUNCTION => {
                let return_type = r.u32("return type")?;
                let return_type = type_ref(r, return_type, slot)?;
                let is_var_arg = r.bool("var-arg")?;
                let parameter_count = r.count("parameter count")?;
                let mut parameters = Vec::new();
                for _ in 0..parameter_count {
                    let parameter = r.u32("parameter type")?;
                    parameters.push(type_ref(r, parameter, slot)?);
                }
                MirTy::Function(MirFunctionTy {
                    return_type,
                    parameters,
                    is_var_arg,
                })
            }
            other => return Err(r.malformed(format!("unknown type kind {}", other))),
        };
        if module.intern_type(ty).index() != slot {
            return Err(r.malformed(format!("type {} is a duplicate", slot)));
        }
    }
    Ok(())
}

fn decode_constants(r: &mut ByteReader, module: &mut MirModule) -> MirResult<()> {
    let count = r.count("constant count")?;
    for slot in 0..count {
        let ty = r.u32("constant type")?;
        let ty = type_ref(r, ty, module.arena().type_count())?;
        let value = r.i64("constant value")?;
        let constant = module
            .const_int(ty, value)
            .map_err(|e| r.malformed(e.to_string()))?;
        let stored = match constant {
            MirValue::Constant(id) => module.arena().get_constant(id).map(|c| (id, c.value)),
            _ => None,
        };
        match stored {
            Some((id, stored)) if id.index() == slot && stored == value => {}
            _ => {
                return Err(r.malformed(format!(
                    "constant {} is a duplicate or not canonical",
                    slot
                )))
            }
        }
    }
    Ok(())
}

fn decode_metadata(r: &mut ByteReader) -> MirResult<Vec<(String, MirMetadata, usize)>> {
    let mut records = Vec::new();
    let kinds = r.count("metadata kind count")?;
    for _ in 0..kinds {
        let kind = r.str("metadata kind")?;
        let count = r.count("metadata record count")?;
        for _ in 0..count {
            let offset = r.offset();
            let record = match r.u8("metadata tag")? {
                METADATA_STRING => MirMetadata::String(r.str("metadata string")?),
                METADATA_FUNCTION => {
                    MirMetadata::Function(MirFunctionId(r.u32("metadata function")?))
                }
                other => return Err(r.malformed(format!("unknown metadata tag {}", other))),
            };
            records.push((kind.clone(), record, offset));
        }
    }
    Ok(records)
}

fn decode_flags(r: &mut ByteReader, module: &mut MirModule) -> MirResult<()> {
    let count = r.count("flag count")?;
    for _ in 0..count {
        let behavior = match r.u8("flag behavior")? {
            0 => MirModuleFlagBehavior::Error,
            1 => MirModuleFlagBehavior::Warning,
            2 => MirModuleFlagBehavior::Override,
            other => return Err(r.malformed(format!("unknown flag behavior {}", other))),
        };
        let key = r.str("flag key")?;
        let value = r.u32("flag value")?;
        module.add_flag(behavior, key, value);
    }
    Ok(())
}

fn decode_function(r: &mut ByteReader, module: &MirModule) -> MirResult<FunctionRecord> {
    let name = r.str("function name")?;
    let ty = r.u32("function type")?;
    let ty = type_ref(r, ty, module.arena().type_count())?;
    let Some(signature) = module.arena().get_type(ty).and_then(MirTy::as_function).cloned() else {
        return Err(r.malformed(format!("function @{} does not have a function type", name)));
    };
    let linkage = match r.u8("linkage")? {
        0 => MirLinkage::External,
        1 => MirLinkage::Internal,
        2 => MirLinkage::Private,
        other => return Err(r.malformed(format!("unknown linkage {}", other))),
    };
    let calling_convention = match r.u8("calling convention")? {
        0 => MirCallingConvention::C,
        1 => MirCallingConvention::Fast,
        other => return Err(r.malformed(format!("unknown calling convention {}", other))),
    };
    let dso_local = r.bool("dso_local")?;
    let mut attributes = BTreeSet::new();
    for _ in 0..r.count("attribute count")? {
        let attribute = match r.u8("attribute")? {
            0 => MirFunctionAttribute::NoInline,
            1 => MirFunctionAttribute::NoUnwind,
            2 => MirFunctionAttribute::OptimizeNone,
            other => return Err(r.malformed(format!("unknown function attribute {}", other))),
        };
        attributes.insert(attribute);
    }
    let argument_count = r.count("argument count")?;
    if argument_count != signature.parameters.len() {
        return Err(r.malformed(format!(
            "function @{} has {} argument names for {} parameters",
            name,
            argument_count,
            signature.parameters.len()
        )));
    }
    let mut arguments = Vec::new();
    for ty in &signature.parameters {
        arguments.push(MirArgument {
            name: r.str("argument name")?,
            ty: *ty,
        });
    }

    let mut blocks = Vec::new();
    let block_count = r.count("block count")?;
    for _ in 0..block_count {
        let name = r.str("block name")?;
        let mut instructions = Vec::new();
        for _ in 0..r.count("instruction count")? {
            instructions.push(decode_instruction(r, module, argument_count)?);
        }
        blocks.push(BlockRecord { name, instructions });
    }

    // Instruction and block references may point forward, so they are checked once the whole
    // function is known.
    let instruction_count = blocks.iter().map(|b| b.instructions.len()).sum::<usize>();
    for instruction in blocks.iter().flat_map(|b| b.instructions.iter()) {
        for operand in &instruction.operands {
            match *operand {
                LocalOperand::Instruction(i) if i as usize >= instruction_count => {
                    return Err(r.malformed(format!(
                        "function @{} refers to missing instruction {}",
                        name, i
                    )));
                }
                LocalOperand::Block(b) if b as usize >= block_count => {
                    return Err(r.malformed(format!(
                        "function @{} refers to missing block {}",
                        name, b
                    )));
                }
                _ => {}
            }
        }
    }

    Ok(FunctionRecord {
        name,
        ty,
        options: MirFunctionOptions {
            linkage,
            calling_convention,
            dso_local,
            attributes,
        },
        arguments,
        blocks,
    })
}

fn decode_instruction(
    r: &mut ByteReader,
    module: &MirModule,
    argument_count: usize,
) -> MirResult<InstructionRecord> {
    let opcode = match r.u8("opcode")? {
        OPCODE_ALLOCA => MirOpcode::Alloca {
            align: r.u32("alignment")?,
        },
        OPCODE_STORE => MirOpcode::Store {
            align: r.u32("alignment")?,
        },
        OPCODE_LOAD => MirOpcode::Load {
            align: r.u32("alignment")?,
        },
        OPCODE_ICMP => MirOpcode::ICmp(match r.u8("predicate")? {
            0 => MirIntPredicate::Lt,
            1 => MirIntPredicate::Le,
            2 => MirIntPredicate::Gt,
            3 => MirIntPredicate::Ge,
            4 => MirIntPredicate::Eq,
            5 => MirIntPredicate::Ne,
            other => return Err(r.malformed(format!("unknown icmp predicate {}", other))),
        }),
        OPCODE_BR => MirOpcode::Br,
        OPCODE_RET => MirOpcode::Ret,
        other => return Err(r.malformed(format!("unknown opcode {}", other))),
    };
    let ty = r.u32("result type")?;
    let ty = type_ref(r, ty, module.arena().type_count())?;
    let name = r.opt_str("instruction name")?;
    let operand_count = r.u8("operand count")?;
    let mut operands = Vec::new();
    for _ in 0..operand_count {
        let kind = r.u8("operand kind")?;
        let index = r.u32("operand index")?;
        let operand = match kind {
            OPERAND_ARGUMENT if (index as usize) < argument_count => {
                LocalOperand::Value(MirValue::Argument(index))
            }
            OPERAND_ARGUMENT => {
                return Err(r.malformed(format!("argument {} is out of bounds", index)));
            }
            OPERAND_CONSTANT if (index as usize) < module.arena().constant_count() => {
                LocalOperand::Value(MirValue::Constant(MirConstantId(index)))
            }
            OPERAND_CONSTANT => {
                return Err(r.malformed(format!("constant {} is out of bounds", index)));
            }
            OPERAND_INSTRUCTION => LocalOperand::Instruction(index),
            OPERAND_BLOCK => LocalOperand::Block(index),
            OPERAND_TYPE => LocalOperand::Type(type_ref(r, index, module.arena().type_count())?),
            other => return Err(r.malformed(format!("unknown operand kind {}", other))),
        };
        operands.push(operand);
    }
    Ok(InstructionRecord {
        opcode,
        ty,
        name,
        operands,
    })
}

/// Rebuild a decoded function through the raw module API.
fn push_function(module: &mut MirModule, function: FunctionRecord) -> MirResult<()> {
    let id = module.push_function(
        function.name,
        function.ty,
        function.arguments,
        function.options,
    )?;
    let mut blocks = Vec::new();
    for block in &function.blocks {
        blocks.push(module.push_block(id, block.name.clone())?);
    }
    let base = module.instruction_count() as u32;
    for (block, record) in blocks.iter().zip(function.blocks) {
        for instruction in record.instructions {
            let operands = instruction
                .operands
                .into_iter()
                .map(|operand| match operand {
                    LocalOperand::Value(value) => MirOperand::Value(value),
                    LocalOperand::Instruction(i) => {
                        MirOperand::Value(MirValue::Instruction(MirInstructionId(base + i)))
                    }
                    LocalOperand::Block(b) => MirOperand::Block(blocks[b as usize]),
                    LocalOperand::Type(ty) => MirOperand::Type(ty),
                })
                .collect::<Vec<_>>();
            module.push_instruction(
                *block,
                instruction.opcode,
                operands,
                instruction.ty,
                instruction.name,
            )?;
        }
    }
    Ok(())
}
