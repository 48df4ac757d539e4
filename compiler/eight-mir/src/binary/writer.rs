use super::*;
use crate::fun::{MirCallingConvention, MirFunction, MirFunctionAttribute, MirLinkage};
use crate::instr::{MirInstructionId, MirIntPredicate, MirOpcode};
use crate::layout::MirEndianness;
use crate::module::{MirMetadata, MirModule, MirModuleFlagBehavior};
use crate::ty::MirTy;
use crate::value::{MirOperand, MirValue};
use eight_diagnostics::ice;
use std::collections::HashMap;

pub(crate) struct ByteWriter {
    buf: Vec<u8>,
    endianness: MirEndianness,
}

impl ByteWriter {
    pub(crate) fn new(endianness: MirEndianness) -> Self {
        Self {
            buf: Vec::new(),
            endianness,
        }
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.buf
    }

    pub(crate) fn bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub(crate) fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub(crate) fn bool(&mut self, v: bool) {
        self.u8(u8::from(v));
    }

    pub(crate) fn u32(&mut self, v: u32) {
        match self.endianness {
            MirEndianness::Little => self.bytes(&v.to_le_bytes()),
            MirEndianness::Big => self.bytes(&v.to_be_bytes()),
        }
    }

    pub(crate) fn i64(&mut self, v: i64) {
        match self.endianness {
            MirEndianness::Little => self.bytes(&v.to_le_bytes()),
            MirEndianness::Big => self.bytes(&v.to_be_bytes()),
        }
    }

    pub(crate) fn count(&mut self, len: usize) {
        self.u32(len as u32);
    }

    pub(crate) fn str(&mut self, s: &str) {
        self.count(s.len());
        self.bytes(s.as_bytes());
    }

    pub(crate) fn opt_str(&mut self, s: Option<&str>) {
        self.bool(s.is_some());
        if let Some(s) = s {
            self.str(s);
        }
    }

    /// Write a record whose payload is produced by the given closure.
    pub(crate) fn record(&mut self, tag: u8, payload: impl FnOnce(&mut ByteWriter)) {
        let mut inner = ByteWriter::new(self.endianness);
        payload(&mut inner);
        self.u8(tag);
        self.count(inner.buf.len());
        self.bytes(&inner.buf);
    }
}

pub(crate) fn encode_module(module: &MirModule) -> Vec<u8> {
    let endianness = module.layout().endianness;
    let mut w = ByteWriter::new(endianness);
    w.bytes(MAGIC);
    w.u8(endianness_tag(endianness));
    w.u32(FORMAT_VERSION);

    w.record(RECORD_MODULE, |w| {
        let layout = module.layout();
        w.str(module.name());
        w.opt_str(module.target_triple());
        w.u8(endianness_tag(layout.endianness));
        w.u32(layout.pointer_width_bits);
        w.u32(layout.pointer_align_bits);
        w.u32(layout.stack_align_bits);
    });
    w.record(RECORD_TYPES, |w| {
        w.count(module.arena().type_count());
        for (_, ty) in module.arena().types() {
            encode_type(w, ty);
        }
    });
    w.record(RECORD_CONSTANTS, |w| {
        w.count(module.arena().constant_count());
        for (_, constant) in module.arena().constants() {
            w.u32(constant.ty.0);
            w.i64(constant.value);
        }
    });
    w.record(RECORD_METADATA, |w| {
        w.count(module.metadata().len());
        for (kind, records) in module.metadata() {
            w.str(kind);
            w.count(records.len());
            for record in records {
                match record {
                    MirMetadata::String(s) => {
                        w.u8(METADATA_STRING);
                        w.str(s);
                    }
                    MirMetadata::Function(f) => {
                        w.u8(METADATA_FUNCTION);
                        w.u32(f.0);
                    }
                }
            }
        }
    });
    w.record(RECORD_FLAGS, |w| {
        w.count(module.flags().len());
        for flag in module.flags() {
            w.u8(flag_behavior_tag(flag.behavior));
            w.str(&flag.key);
            w.u32(flag.value);
        }
    });
    for (_, function) in module.functions() {
        w.record(RECORD_FUNCTION, |w| encode_function(w, module, function));
    }
    w.record(RECORD_END, |_| {});
    w.finish()
}

fn encode_type(w: &mut ByteWriter, ty: &MirTy) {
    match ty {
        MirTy::Void => w.u8(TYPE_VOID),
        MirTy::Integer(i) => {
            w.u8(TYPE_INTEGER);
            w.u32(i.width);
        }
        MirTy::Pointer(p) => {
            w.u8(TYPE_POINTER);
            w.u32(p.pointee.0);
        }
        MirTy::Function(f) => {
            w.u8(TYPE_FUNCTION);
            w.u32(f.return_type.0);
            w.bool(f.is_var_arg);
            w.count(f.parameters.len());
            for parameter in &f.parameters {
                w.u32(parameter.0);
            }
        }
    }
}

fn encode_function(w: &mut ByteWriter, module: &MirModule, function: &MirFunction) {
    w.str(&function.name);
    w.u32(function.ty.0);
    w.u8(linkage_tag(function.linkage));
    w.u8(calling_convention_tag(function.calling_convention));
    w.bool(function.dso_local);
    w.count(function.attributes.len());
    for attribute in &function.attributes {
        w.u8(attribute_tag(*attribute));
    }
    w.count(function.arguments.len());
    for argument in &function.arguments {
        w.str(&argument.name);
    }

    let blocks = function
        .blocks
        .iter()
        .filter_map(|id| module.block(*id).map(|b| (*id, b)))
        .collect::<Vec<_>>();
    let block_index = blocks
        .iter()
        .enumerate()
        .map(|(i, (id, _))| (*id, i as u32))
        .collect::<HashMap<_, _>>();
    let instruction_index = blocks
        .iter()
        .flat_map(|(_, b)| b.instructions.iter())
        .enumerate()
        .map(|(i, id)| (*id, i as u32))
        .collect::<HashMap<MirInstructionId, u32>>();

    w.count(blocks.len());
    for (_, block) in &blocks {
        w.str(&block.name);
        w.count(block.instructions.len());
        for id in &block.instructions {
            let Some(instr) = module.instruction(*id) else {
                ice!(format!("block {} lists a missing instruction", block.name));
            };
            match instr.opcode {
                MirOpcode::Alloca { align } => {
                    w.u8(OPCODE_ALLOCA);
                    w.u32(align);
                }
                MirOpcode::Store { align } => {
                    w.u8(OPCODE_STORE);
                    w.u32(align);
                }
                MirOpcode::Load { align } => {
                    w.u8(OPCODE_LOAD);
                    w.u32(align);
                }
                MirOpcode::ICmp(predicate) => {
                    w.u8(OPCODE_ICMP);
                    w.u8(predicate_tag(predicate));
                }
                MirOpcode::Br => w.u8(OPCODE_BR),
                MirOpcode::Ret => w.u8(OPCODE_RET),
            }
            w.u32(instr.ty.0);
            w.opt_str(instr.name.as_deref());
            w.u8(instr.operands.len() as u8);
            for operand in &instr.operands {
                let (kind, index) = match operand {
                    MirOperand::Value(MirValue::Argument(i)) => (OPERAND_ARGUMENT, *i),
                    MirOperand::Value(MirValue::Constant(c)) => (OPERAND_CONSTANT, c.0),
                    MirOperand::Value(MirValue::Instruction(i)) => {
                        let Some(local) = instruction_index.get(i) else {
                            ice!("verified function refers to an instruction of another function");
                        };
                        (OPERAND_INSTRUCTION, *local)
                    }
                    MirOperand::Block(b) => {
                        let Some(local) = block_index.get(b) else {
                            ice!("verified function branches to a block of another function");
                        };
                        (OPERAND_BLOCK, *local)
                    }
                    MirOperand::Type(t) => (OPERAND_TYPE, t.0),
                };
                w.u8(kind);
                w.u32(index);
            }
        }
    }
}

pub(crate) fn endianness_tag(endianness: MirEndianness) -> u8 {
    match endianness {
        MirEndianness::Little => 0,
        MirEndianness::Big => 1,
    }
}

pub(crate) fn flag_behavior_tag(behavior: MirModuleFlagBehavior) -> u8 {
    match behavior {
        MirModuleFlagBehavior::Error => 0,
        MirModuleFlagBehavior::Warning => 1,
        MirModuleFlagBehavior::Override => 2,
    }
}

pub(crate) fn linkage_tag(linkage: MirLinkage) -> u8 {
    match linkage {
        MirLinkage::External => 0,
        MirLinkage::Internal => 1,
        MirLinkage::Private => 2,
    }
}

pub(crate) fn calling_convention_tag(cc: MirCallingConvention) -> u8 {
    match cc {
        MirCallingConvention::C => 0,
        MirCallingConvention::Fast => 1,
    }
}

pub(crate) fn attribute_tag(attribute: MirFunctionAttribute) -> u8 {
    match attribute {
        MirFunctionAttribute::NoInline => 0,
        MirFunctionAttribute::NoUnwind => 1,
        MirFunctionAttribute::OptimizeNone => 2,
    }
}

pub(crate) fn predicate_tag(predicate: MirIntPredicate) -> u8 {
    match predicate {
        MirIntPredicate::Lt => 0,
        MirIntPredicate::Le => 1,
        MirIntPredicate::Gt => 2,
        MirIntPredicate::Ge => 3,
        MirIntPredicate::Eq => 4,
        MirIntPredicate::Ne => 5,
    }
}
