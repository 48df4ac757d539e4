//! Textual formatting for MIR modules.
//!
//! This module provides a Wadler-style pretty printer for MIR modules, meant to be read by humans
//! as an alternative to the raw Ron format. The syntax spells out the instruction family in each
//! mnemonic, such as `mem.load` or `cmp.lt.i32`.
//!
//! The printer never breaks lines on its own, so the output does not depend on the render width.
//! Values without a name are numbered `%0`, `%1`, ... per function in program order.

use crate::fun::{MirBlockId, MirFunction, MirFunctionId};
use crate::instr::{MirInstruction, MirInstructionId, MirOpcode};
use crate::module::{MirMetadata, MirModule};
use crate::ty::MirTy;
use crate::value::MirValue;
use eight_diagnostics::ice;
use pretty::{Arena, DocAllocator, DocBuilder};
use std::collections::HashMap;

#[derive(Default)]
pub struct MirModuleTextualPass<'a> {
    arena: Arena<'a>,
}

pub type Document<'a> = DocBuilder<'a, Arena<'a>>;

/// Names of the values of the function being printed.
struct ValueNames<'m> {
    module: &'m MirModule,
    function_id: MirFunctionId,
    function: &'m MirFunction,
    instructions: HashMap<MirInstructionId, String>,
}

impl ValueNames<'_> {
    fn value(&self, value: MirValue) -> String {
        match value {
            MirValue::Argument(index) => match self.function.arguments.get(index as usize) {
                Some(argument) => format!("%{}", argument.name),
                None => format!("<argument {}>", index),
            },
            MirValue::Constant(id) => match self.module.arena().get_constant(id) {
                Some(constant) => constant.value.to_string(),
                None => format!("<constant {}>", id.index()),
            },
            MirValue::Instruction(id) => match self.instructions.get(&id) {
                Some(name) => format!("%{}", name),
                None => format!("<instruction {}>", id.index()),
            },
        }
    }

    fn block(&self, block: MirBlockId) -> String {
        match self.module.block(block) {
            Some(b) => b.name.clone(),
            None => format!("<block {}>", block.index()),
        }
    }
}

impl<'a> MirModuleTextualPass<'a> {
    pub fn format_doc_to_string(doc: Document<'a>) -> String {
        let mut w = Vec::new();
        doc.render(80, &mut w)
            .unwrap_or_else(|_| ice!("failed to render mir module"));
        String::from_utf8(w).unwrap_or_else(|_| ice!("rendered mir module is not utf-8"))
    }

    pub fn visit_module(&'a self, module: &MirModule) -> Document<'a> {
        let mut header = vec![
            format!("; module = {:?}", module.name()),
            format!("target layout = \"{}\"", module.layout()),
        ];
        if let Some(triple) = module.target_triple() {
            header.push(format!("target triple = {:?}", triple));
        }
        if !module.flags().is_empty() {
            let flags = module
                .flags()
                .iter()
                .map(|flag| format!("{} {:?} {}", flag.behavior, flag.key, flag.value))
                .collect::<Vec<_>>();
            header.push(format!("!flags = !{{{}}}", flags.join(", ")));
        }
        for (kind, records) in module.metadata() {
            let records = records
                .iter()
                .map(|record| match record {
                    MirMetadata::String(s) => format!("{:?}", s),
                    MirMetadata::Function(f) => module.describe_function(*f),
                })
                .collect::<Vec<_>>();
            header.push(format!("!{} = !{{{}}}", kind, records.join(", ")));
        }

        let header = self.arena.intersperse(
            header.into_iter().map(|line| self.arena.text(line)),
            self.arena.hardline(),
        );
        let functions = module
            .functions()
            .map(|(id, _)| self.visit_function(module, id))
            .collect::<Vec<_>>();
        if functions.is_empty() {
            return header;
        }
        header
            .append(self.arena.hardline())
            .append(self.arena.hardline())
            .append(self.arena.intersperse(
                functions,
                self.arena.hardline().append(self.arena.hardline()),
            ))
    }

    pub fn visit_function(&'a self, module: &MirModule, id: MirFunctionId) -> Document<'a> {
        let Some(function) = module.function(id) else {
            return self.arena.text(format!("; missing function {}", id.index()));
        };
        let names = Self::name_values(module, id, function);

        let mut parameters = function
            .arguments
            .iter()
            .map(|a| format!("%{}: {}", a.name, module.display_ty(a.ty)))
            .collect::<Vec<_>>();
        let signature = module.arena().get_type(function.ty).and_then(MirTy::as_function);
        if signature.is_some_and(|s| s.is_var_arg) {
            parameters.push("...".to_owned());
        }
        let return_type = signature
            .map(|s| module.display_ty(s.return_type))
            .unwrap_or_else(|| "<invalid signature>".to_owned());
        let mut line = format!(
            "fn @{}({}) -> {} {} {}",
            function.name,
            parameters.join(", "),
            return_type,
            function.linkage,
            function.calling_convention
        );
        if function.dso_local {
            line.push_str(" dso_local");
        }
        if !function.attributes.is_empty() {
            let attributes = function
                .attributes
                .iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>();
            line.push_str(&format!(" #[{}]", attributes.join(", ")));
        }
        line.push_str(" {");

        let blocks = function.blocks.iter().filter_map(|b| module.block(*b)).map(|block| {
            let instructions = block.instructions.iter().filter_map(|i| {
                module.instruction(*i).map(|instr| {
                    self.arena
                        .hardline()
                        .append(self.visit_instruction(&names, *i, instr))
                })
            });
            self.arena
                .hardline()
                .append(self.arena.text(format!("{}:", block.name)))
                .append(self.arena.concat(instructions).nest(2))
        });
        self.arena
            .text(line)
            .append(self.arena.concat(blocks))
            .append(self.arena.hardline())
            .append(self.arena.text("}"))
    }

    fn visit_instruction(
        &'a self,
        names: &ValueNames,
        id: MirInstructionId,
        instr: &MirInstruction,
    ) -> Document<'a> {
        let module = names.module;
        let body = match instr.opcode {
            MirOpcode::Alloca { .. } => instr.as_alloca().map(|alloca| {
                format!(
                    "mem.alloca {}, align {}",
                    module.display_ty(alloca.allocated_ty),
                    alloca.align
                )
            }),
            MirOpcode::Store { .. } => instr.as_store().map(|store| {
                format!(
                    "mem.store {}, {}, align {}",
                    names.value(store.value),
                    names.value(store.pointer),
                    store.align
                )
            }),
            MirOpcode::Load { .. } => instr.as_load().map(|load| {
                format!(
                    "mem.load {}, {}, align {}",
                    module.display_ty(instr.ty),
                    names.value(load.pointer),
                    load.align
                )
            }),
            MirOpcode::ICmp(predicate) => instr.as_icmp().map(|icmp| {
                let ty = module
                    .value_ty(names.function_id, icmp.lhs)
                    .map(|ty| module.display_ty(ty))
                    .unwrap_or_else(|| "?".to_owned());
                format!(
                    "cmp.{}.{} {}, {}",
                    predicate,
                    ty,
                    names.value(icmp.lhs),
                    names.value(icmp.rhs)
                )
            }),
            MirOpcode::Br => instr.as_br().map(|br| match (br.condition, br.false_target) {
                (Some(condition), Some(false_target)) => format!(
                    "branch.cond {}, {}, {}",
                    names.value(condition),
                    names.block(br.true_target),
                    names.block(false_target)
                ),
                _ => format!("branch {}", names.block(br.true_target)),
            }),
            MirOpcode::Ret => instr.as_ret().map(|ret| match ret.value {
                Some(value) => format!("ret {}", names.value(value)),
                None => "ret void".to_owned(),
            }),
        };
        let body = body.unwrap_or_else(|| format!("<malformed {}>", instr.opcode.mnemonic()));
        match names.instructions.get(&id) {
            Some(name) => self.arena.text(format!("%{} = {}", name, body)),
            None => self.arena.text(body),
        }
    }

    fn name_values<'m>(
        module: &'m MirModule,
        id: MirFunctionId,
        function: &'m MirFunction,
    ) -> ValueNames<'m> {
        let mut instructions = HashMap::new();
        let mut next = 0;
        for (instr_id, instr) in module.function_instructions(id) {
            let produces_value = module
                .arena()
                .get_type(instr.ty)
                .is_some_and(|ty| !ty.is_void());
            if !produces_value {
                continue;
            }
            let name = match &instr.name {
                Some(name) => name.clone(),
                None => {
                    next += 1;
                    (next - 1).to_string()
                }
            };
            instructions.insert(instr_id, name);
        }
        ValueNames {
            module,
            function_id: id,
            function,
            instructions,
        }
    }
}
