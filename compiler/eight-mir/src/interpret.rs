//! A reference interpreter for MIR functions.
//!
//! The interpreter executes a function directly on the module tables. It exists to check the
//! behavior of a module, for example after it went through the binary encoding, and makes no
//! attempt at being fast.

use crate::arena::truncate_to_width;
use crate::error::{EvaluationError, MirResult};
use crate::fun::{MirBlockId, MirFunctionId};
use crate::instr::{MirInstruction, MirInstructionId, MirOpcode};
use crate::module::MirModule;
use crate::ty::{MirTy, MirTyId};
use crate::value::MirValue;
use std::collections::HashMap;

/// Default number of instructions a single call may execute.
pub const DEFAULT_STEP_LIMIT: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuntimeValue {
    Integer(i64),
    /// The address of a stack slot, as an index into the slots of the frame.
    Pointer(usize),
}

/// The state of a single function call.
struct Frame<'m> {
    function: MirFunctionId,
    name: &'m str,
    arguments: Vec<RuntimeValue>,
    slots: Vec<Option<RuntimeValue>>,
    results: HashMap<MirInstructionId, RuntimeValue>,
}

pub struct MirInterpreter<'m> {
    module: &'m MirModule,
    step_limit: usize,
}

impl<'m> MirInterpreter<'m> {
    pub fn new(module: &'m MirModule) -> Self {
        Self {
            module,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    pub fn with_step_limit(module: &'m MirModule, step_limit: usize) -> Self {
        Self { module, step_limit }
    }

    /// Call a function by name with integer arguments.
    ///
    /// Arguments are truncated to the width of their parameter. Returns the returned integer, or
    /// `None` for functions returning void.
    pub fn call(&self, name: &str, arguments: &[i64]) -> MirResult<Option<i64>> {
        let fail = |reason: String| EvaluationError {
            function: format!("@{}", name),
            reason,
        };
        let Some((id, function)) = self.module.function_by_name(name) else {
            return Err(fail("no such function".to_owned()).into());
        };
        if function.arguments.len() != arguments.len() {
            return Err(fail(format!(
                "expected {} arguments, got {}",
                function.arguments.len(),
                arguments.len()
            ))
            .into());
        }
        let arguments = function
            .arguments
            .iter()
            .zip(arguments)
            .map(|(parameter, value)| match self.integer_width(parameter.ty) {
                Some(width) => Ok(RuntimeValue::Integer(truncate_to_width(*value, width))),
                None => Err(fail(format!(
                    "parameter %{} is not an integer",
                    parameter.name
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut frame = Frame {
            function: id,
            name: &function.name,
            arguments,
            slots: Vec::new(),
            results: HashMap::new(),
        };
        log::debug!("calling @{} with {:?}", name, frame.arguments);
        let result = self.run(&mut frame)?;
        match result {
            None => Ok(None),
            Some(RuntimeValue::Integer(value)) => Ok(Some(value)),
            Some(RuntimeValue::Pointer(_)) => {
                Err(fail("returned a pointer to its own stack frame".to_owned()).into())
            }
        }
    }

    fn error(&self, frame: &Frame, reason: impl Into<String>) -> EvaluationError {
        EvaluationError {
            function: format!("@{}", frame.name),
            reason: reason.into(),
        }
    }

    fn integer_width(&self, ty: MirTyId) -> Option<u32> {
        self.module
            .arena()
            .get_type(ty)
            .and_then(MirTy::integer_width)
    }

    fn run(&self, frame: &mut Frame) -> MirResult<Option<RuntimeValue>> {
        let Some(mut block) = self
            .module
            .function(frame.function)
            .and_then(|f| f.entry_block())
        else {
            return Err(self.error(frame, "function has no entry block").into());
        };
        let mut steps = 0usize;
        loop {
            let Some(b) = self.module.block(block) else {
                return Err(self.error(frame, "jumped to a missing block").into());
            };
            log::trace!("entering block {}", b.name);
            let mut next = None;
            for id in &b.instructions {
                steps += 1;
                if steps > self.step_limit {
                    return Err(self
                        .error(frame, format!("exceeded the step limit of {}", self.step_limit))
                        .into());
                }
                let Some(instr) = self.module.instruction(*id) else {
                    return Err(self.error(frame, "block lists a missing instruction").into());
                };
                match self.step(frame, *id, instr)? {
                    Flow::Continue => {}
                    Flow::Jump(target) => {
                        next = Some(target);
                        break;
                    }
                    Flow::Return(value) => return Ok(value),
                }
            }
            match next {
                Some(target) => block = target,
                None => {
                    return Err(self
                        .error(frame, format!("fell off the end of block {}", b.name))
                        .into());
                }
            }
        }
    }

    fn step(
        &self,
        frame: &mut Frame,
        id: MirInstructionId,
        instr: &MirInstruction,
    ) -> MirResult<Flow> {
        let malformed = || {
            self.error(
                frame,
                format!("malformed {} instruction", instr.opcode.mnemonic()),
            )
        };
        match instr.opcode {
            MirOpcode::Alloca { .. } => {
                instr.as_alloca().ok_or_else(malformed)?;
                frame.slots.push(None);
                let slot = frame.slots.len() - 1;
                frame.results.insert(id, RuntimeValue::Pointer(slot));
            }
            MirOpcode::Store { .. } => {
                let store = instr.as_store().ok_or_else(malformed)?;
                let value = self.value(frame, store.value)?;
                let slot = self.slot(frame, store.pointer)?;
                frame.slots[slot] = Some(value);
            }
            MirOpcode::Load { .. } => {
                let load = instr.as_load().ok_or_else(malformed)?;
                let slot = self.slot(frame, load.pointer)?;
                let Some(value) = frame.slots[slot] else {
                    return Err(self.error(frame, "load from an uninitialized stack slot").into());
                };
                let value = match (value, self.integer_width(instr.ty)) {
                    (RuntimeValue::Integer(v), Some(width)) => {
                        RuntimeValue::Integer(truncate_to_width(v, width))
                    }
                    (value, _) => value,
                };
                frame.results.insert(id, value);
            }
            MirOpcode::ICmp(predicate) => {
                let icmp = instr.as_icmp().ok_or_else(malformed)?;
                let lhs = self.integer(frame, icmp.lhs)?;
                let rhs = self.integer(frame, icmp.rhs)?;
                let result = i64::from(predicate.evaluate(lhs, rhs));
                let width = self.integer_width(instr.ty).unwrap_or(1);
                let result = truncate_to_width(result, width);
                frame.results.insert(id, RuntimeValue::Integer(result));
            }
            MirOpcode::Br => {
                let br = instr.as_br().ok_or_else(malformed)?;
                let target = match (br.condition, br.false_target) {
                    (Some(condition), Some(false_target)) => {
                        if self.integer(frame, condition)? != 0 {
                            br.true_target
                        } else {
                            false_target
                        }
                    }
                    _ => br.true_target,
                };
                let in_function = self
                    .module
                    .block(target)
                    .is_some_and(|b| b.parent == frame.function);
                if !in_function {
                    return Err(self.error(frame, "branch leaves the function").into());
                }
                return Ok(Flow::Jump(target));
            }
            MirOpcode::Ret => {
                let ret = instr.as_ret().ok_or_else(malformed)?;
                let value = ret.value.map(|v| self.value(frame, v)).transpose()?;
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Continue)
    }

    fn value(&self, frame: &Frame, value: MirValue) -> MirResult<RuntimeValue> {
        let result = match value {
            MirValue::Argument(index) => frame.arguments.get(index as usize).copied(),
            MirValue::Constant(id) => self
                .module
                .arena()
                .get_constant(id)
                .map(|c| RuntimeValue::Integer(c.value)),
            MirValue::Instruction(id) => frame.results.get(&id).copied(),
        };
        result.ok_or_else(|| {
            self.error(frame, format!("{} has no value at this point", value))
                .into()
        })
    }

    fn integer(&self, frame: &Frame, value: MirValue) -> MirResult<i64> {
        match self.value(frame, value)? {
            RuntimeValue::Integer(v) => Ok(v),
            RuntimeValue::Pointer(_) => {
                Err(self.error(frame, format!("{} is not an integer", value)).into())
            }
        }
    }

    fn slot(&self, frame: &Frame, pointer: MirValue) -> MirResult<usize> {
        match self.value(frame, pointer)? {
            RuntimeValue::Pointer(slot) if slot < frame.slots.len() => Ok(slot),
            _ => Err(self
                .error(frame, format!("{} is not a stack slot", pointer))
                .into()),
        }
    }
}

enum Flow {
    Continue,
    Jump(MirBlockId),
    Return(Option<RuntimeValue>),
}
