//! The stack-based evaluator: executes one [`Cmd`] at a time against a
//! [`CellStore`], a frame stack, and the extern registry, until `exit`.

pub mod arrays;
pub mod cell;
pub mod closures;
pub mod env;
pub mod frame;
pub mod heap;
pub mod strings;

use crate::codegen::cmd::{Cmd, CmdKind};
use crate::codegen::{FunDef, Program};
use smallvec::SmallVec;

use crate::diagnostics::Diagnostics;
use crate::error::{RunError, RunResult};
use crate::externs::{CallArgs, ExternCall, ExternRegistry};
use crate::ids::TokId;
use crate::lexer::Token;
use crate::resource::VmLimits;
use crate::tracer::VmTracer;
use crate::vm::arrays::Arrays;
use crate::vm::cell::Cell;
use crate::vm::closures::Closures;
use crate::vm::env::Envs;
use crate::vm::frame::Frame;
use crate::vm::heap::CellStore;
use crate::vm::strings::Strs;

struct Vm {
    heap: CellStore,
    strs: Strs,
    arrays: Arrays,
    envs: Envs,
    closures: Closures,
    frames: Vec<Frame>,
    current_env: crate::ids::EnvId,
    pc: u32,
    current_tok: TokId,
}

impl Vm {
    fn new(program: &Program, limits: VmLimits) -> RunResult<Self> {
        let mut heap = CellStore::new(limits);
        let mut envs = Envs::default();
        let global_tok = program.cmds.first().map_or_else(|| TokId::new(0), |c| c.tok);
        let global_env = envs.alloc(&mut heap, None, program.global_scope, program.global_local_count)?;
        Ok(Self {
            heap,
            strs: Strs::default(),
            arrays: Arrays::default(),
            envs,
            closures: Closures::default(),
            frames: Vec::new(),
            current_env: global_env,
            pc: 0,
            current_tok: global_tok,
        })
    }

    fn run_loop(&mut self, program: &Program, externs: &mut ExternRegistry, tracer: &mut dyn VmTracer) -> RunResult<i32> {
        loop {
            let cmd = &program.cmds[self.pc as usize];
            self.current_tok = cmd.tok;
            tracer.on_instruction(self.pc, cmd.kind, self.heap.sp());
            match cmd.kind {
                CmdKind::PushInt => {
                    self.heap.stack_push(Cell::Int(cmd.x))?;
                    self.pc += 1;
                }
                CmdKind::PushStr => {
                    let text = cmd.s.clone().unwrap_or_default();
                    let id = self.strs.push(text);
                    self.heap.stack_push(Cell::Str(id))?;
                    self.pc += 1;
                }
                CmdKind::PushNull => {
                    self.heap.stack_push(Cell::NULL)?;
                    self.pc += 1;
                }
                CmdKind::LoadLocal => {
                    let scope = cmd.scope.unwrap_or_else(|| crate::bug!("load_local without a scope"));
                    let slot = u32::try_from(cmd.x).expect("slot index fits u32");
                    let env = self.envs.find_scope(self.current_env, scope);
                    let value = self.envs.load(&self.heap, env, slot);
                    self.heap.stack_push(value)?;
                    self.pc += 1;
                }
                CmdKind::LocalRef => {
                    let scope = cmd.scope.unwrap_or_else(|| crate::bug!("local_ref without a scope"));
                    let slot = u32::try_from(cmd.x).expect("slot index fits u32");
                    let env = self.envs.find_scope(self.current_env, scope);
                    let cell_ref = self.envs.slot_ref(env, slot);
                    self.heap.stack_push(Cell::Ref(cell_ref))?;
                    self.pc += 1;
                }
                CmdKind::PushExtern => {
                    let fun_index = u32::try_from(cmd.x).expect("fun index fits u32");
                    self.heap.stack_push(Cell::Extern(fun_index))?;
                    self.pc += 1;
                }
                CmdKind::PushClosure => {
                    let fun_index = u32::try_from(cmd.x).expect("fun index fits u32");
                    let id = self.closures.alloc(fun_index, self.current_env);
                    self.heap.stack_push(Cell::Closure(id))?;
                    self.pc += 1;
                }
                CmdKind::Dup => {
                    let top = self.heap.stack_peek();
                    self.heap.stack_push(top)?;
                    self.pc += 1;
                }
                CmdKind::Pop => {
                    self.heap.stack_pop();
                    self.pc += 1;
                }
                CmdKind::CellGet => {
                    let r = self.heap.stack_pop();
                    let Cell::Ref(cell_ref) = r else {
                        crate::bug!("cell_get on a non-ref cell");
                    };
                    let value = self.heap.get(cell_ref);
                    self.heap.stack_push(value)?;
                    self.pc += 1;
                }
                CmdKind::CellSet => {
                    let value = self.heap.stack_pop();
                    let r = self.heap.stack_pop();
                    let Cell::Ref(cell_ref) = r else {
                        crate::bug!("cell_set on a non-ref cell");
                    };
                    self.heap.set(cell_ref, value);
                    self.heap.stack_push(value)?;
                    self.pc += 1;
                }
                CmdKind::Eq => {
                    let rhs = self.heap.stack_pop();
                    let lhs = self.heap.stack_pop();
                    let result = self.eval_eq(lhs, rhs)?;
                    self.heap.stack_push(result)?;
                    self.pc += 1;
                }
                CmdKind::Lt => {
                    let rhs = self.heap.stack_pop();
                    let lhs = self.heap.stack_pop();
                    let result = self.eval_lt(lhs, rhs)?;
                    self.heap.stack_push(result)?;
                    self.pc += 1;
                }
                CmdKind::Add => {
                    let rhs = self.heap.stack_pop();
                    let lhs = self.heap.stack_pop();
                    let result = self.eval_add(lhs, rhs)?;
                    self.heap.stack_push(result)?;
                    self.pc += 1;
                }
                CmdKind::Sub => {
                    let rhs = self.heap.stack_pop();
                    let lhs = self.heap.stack_pop();
                    let (a, b) = int_pair("sub", lhs, rhs)?;
                    self.heap.stack_push(Cell::Int(a.wrapping_sub(b)))?;
                    self.pc += 1;
                }
                CmdKind::Mul => {
                    let rhs = self.heap.stack_pop();
                    let lhs = self.heap.stack_pop();
                    let (a, b) = int_pair("mul", lhs, rhs)?;
                    self.heap.stack_push(Cell::Int(a.wrapping_mul(b)))?;
                    self.pc += 1;
                }
                CmdKind::Div => {
                    let rhs = self.heap.stack_pop();
                    let lhs = self.heap.stack_pop();
                    let (a, b) = int_pair("div", lhs, rhs)?;
                    // Division by zero is not specially caught here; preserved
                    // from the host's native integer-division behaviour.
                    self.heap.stack_push(Cell::Int(a / b))?;
                    self.pc += 1;
                }
                CmdKind::Mod => {
                    let rhs = self.heap.stack_pop();
                    let lhs = self.heap.stack_pop();
                    let (a, b) = int_pair("mod", lhs, rhs)?;
                    self.heap.stack_push(Cell::Int(a % b))?;
                    self.pc += 1;
                }
                CmdKind::Index => {
                    let index = self.heap.stack_pop();
                    let callee = self.heap.stack_pop();
                    let result = self.eval_index(callee, index)?;
                    self.heap.stack_push(result)?;
                    self.pc += 1;
                }
                CmdKind::IndexRef => {
                    let index = self.heap.stack_pop();
                    let callee = self.heap.stack_pop();
                    let cell_ref = self.eval_index_ref(callee, index)?;
                    self.heap.stack_push(Cell::Ref(cell_ref))?;
                    self.pc += 1;
                }
                CmdKind::PushArray => {
                    let capacity_hint = u32::try_from(cmd.x).unwrap_or(0);
                    let id = self.arrays.alloc(&mut self.heap, capacity_hint)?;
                    self.heap.stack_push(Cell::Array(id))?;
                    self.pc += 1;
                }
                CmdKind::ArrayPush => {
                    let value = self.heap.stack_pop();
                    let array_cell = self.heap.stack_pop();
                    let Cell::Array(id) = array_cell else {
                        return Err(RunError::TypeError(format!(
                            "array_push target must be an array, got {}",
                            array_cell.type_name()
                        )));
                    };
                    self.arrays.push(&mut self.heap, id, value)?;
                    self.heap.stack_push(Cell::Array(id))?;
                    self.pc += 1;
                }
                CmdKind::Jump => {
                    self.pc = u32::try_from(cmd.x).expect("jump target fits u32");
                }
                CmdKind::JumpUnless => {
                    let cond = self.heap.stack_pop();
                    let Cell::Int(v) = cond else {
                        return Err(RunError::BadCondition);
                    };
                    if v == 0 {
                        self.pc = u32::try_from(cmd.x).expect("jump target fits u32");
                    } else {
                        self.pc += 1;
                    }
                }
                CmdKind::Label => {
                    let label_index = u32::try_from(cmd.x).unwrap_or(0);
                    tracer.on_label_resolve(label_index, self.pc);
                    self.pc += 1;
                }
                CmdKind::Call => {
                    self.exec_call(program, externs, tracer, usize::try_from(cmd.x).expect("arg count fits usize"))?;
                }
                CmdKind::Return => {
                    let frame = self.frames.pop().unwrap_or_else(|| crate::bug!("return with an empty frame stack"));
                    self.pc = frame.return_pc;
                    self.current_env = frame.caller_env;
                    tracer.on_return(u32::try_from(self.frames.len()).unwrap_or(u32::MAX));
                }
                CmdKind::Err => {
                    let message = cmd.s.clone().unwrap_or_else(|| "internal error".to_string());
                    return Err(RunError::Err(message));
                }
                CmdKind::Exit => {
                    let code = self.heap.stack_pop();
                    let Cell::Int(value) = code else {
                        return Err(RunError::BadExitValue);
                    };
                    return Ok(value as i32);
                }
            }
        }
    }

    fn exec_call(&mut self, program: &Program, externs: &mut ExternRegistry, tracer: &mut dyn VmTracer, n: usize) -> RunResult<()> {
        let mut args: CallArgs = SmallVec::from_elem(Cell::NULL, n);
        for slot in args.iter_mut().rev() {
            *slot = self.heap.stack_pop();
        }
        let callee = self.heap.stack_pop();
        match callee {
            Cell::Closure(closure_id) => {
                let entry = self.closures.get(closure_id);
                let fun_def = program.funs[entry.fun_index as usize].clone();
                let FunDef::Closure {
                    scope,
                    entry_cmd,
                    local_count,
                    param_count,
                } = fun_def
                else {
                    crate::bug!("closure cell points at a non-closure fun entry");
                };
                let new_env = self.envs.alloc(&mut self.heap, Some(entry.env), scope, local_count)?;
                let take = (param_count as usize).min(n);
                for (slot, value) in args.iter().take(take).enumerate() {
                    self.envs.store(&mut self.heap, new_env, slot as u32, *value);
                }
                self.frames.push(Frame {
                    return_pc: self.pc + 1,
                    caller_env: self.current_env,
                    call_site: self.current_tok,
                });
                self.current_env = new_env;
                self.pc = entry_cmd;
                tracer.on_call(u32::try_from(self.frames.len()).unwrap_or(u32::MAX));
                Ok(())
            }
            Cell::Extern(fun_index) => {
                let fun_def = program.funs[fun_index as usize].clone();
                let FunDef::Extern { extern_index } = fun_def else {
                    crate::bug!("extern cell points at a non-extern fun entry");
                };
                let mut call = ExternCall {
                    heap: &mut self.heap,
                    arrays: &mut self.arrays,
                    strings: &mut self.strs,
                    args,
                    result: None,
                    error: None,
                };
                externs.call(extern_index as usize, &mut call);
                let (result, error) = (call.result, call.error);
                if let Some(message) = error {
                    return Err(RunError::Err(message));
                }
                self.heap.stack_push(result.unwrap_or(Cell::NULL))?;
                self.pc += 1;
                Ok(())
            }
            other => Err(RunError::TypeError(format!("cannot call a value of type {}", other.type_name()))),
        }
    }

    fn eval_eq(&self, lhs: Cell, rhs: Cell) -> RunResult<Cell> {
        match (lhs, rhs) {
            (Cell::Int(a), Cell::Int(b)) => Ok(bool_cell(a == b)),
            (Cell::Str(a), Cell::Str(b)) => Ok(bool_cell(self.strs.get(a) == self.strs.get(b))),
            _ if lhs.type_ordinal() != rhs.type_ordinal() => Ok(Cell::NULL),
            _ => Err(RunError::TypeError(format!("cannot compare two {} values for equality", lhs.type_name()))),
        }
    }

    fn eval_lt(&self, lhs: Cell, rhs: Cell) -> RunResult<Cell> {
        match (lhs, rhs) {
            (Cell::Int(a), Cell::Int(b)) => Ok(bool_cell(a < b)),
            (Cell::Str(a), Cell::Str(b)) => Ok(bool_cell(self.strs.get(a) < self.strs.get(b))),
            _ => Ok(bool_cell(lhs.type_ordinal() < rhs.type_ordinal())),
        }
    }

    fn eval_add(&mut self, lhs: Cell, rhs: Cell) -> RunResult<Cell> {
        match (lhs, rhs) {
            (Cell::Int(a), Cell::Int(b)) => Ok(Cell::Int(a.wrapping_add(b))),
            (Cell::Str(a), Cell::Str(b)) => {
                let joined = format!("{}{}", self.strs.get(a), self.strs.get(b));
                Ok(Cell::Str(self.strs.push(joined)))
            }
            _ => Err(RunError::TypeError(format!("cannot add {} and {}", lhs.type_name(), rhs.type_name()))),
        }
    }

    fn eval_index(&self, callee: Cell, index: Cell) -> RunResult<Cell> {
        let Cell::Int(i) = index else {
            return Err(RunError::BadIndex(format!("index must be an int, got {}", index.type_name())));
        };
        match callee {
            Cell::Str(id) => {
                let bytes = self.strs.get(id).as_bytes();
                if i < 0 || i as usize >= bytes.len() {
                    Ok(Cell::Int(0))
                } else {
                    Ok(Cell::Int(i64::from(bytes[i as usize])))
                }
            }
            Cell::Array(id) => self
                .arrays
                .read(&self.heap, id, i)
                .ok_or_else(|| RunError::BadIndex(format!("array index {i} out of range"))),
            other => Err(RunError::TypeError(format!("cannot index a value of type {}", other.type_name()))),
        }
    }

    fn eval_index_ref(&self, callee: Cell, index: Cell) -> RunResult<crate::ids::CellRef> {
        let Cell::Int(i) = index else {
            return Err(RunError::BadIndex(format!("index must be an int, got {}", index.type_name())));
        };
        let Cell::Array(id) = callee else {
            return Err(RunError::TypeError(format!("cannot assign through an index on a value of type {}", callee.type_name())));
        };
        self.arrays.index_ref(id, i).ok_or_else(|| RunError::BadIndex(format!("array index {i} out of range")))
    }
}

fn bool_cell(b: bool) -> Cell {
    if b { Cell::Int(1) } else { Cell::NULL }
}

fn int_pair(op: &str, lhs: Cell, rhs: Cell) -> RunResult<(i64, i64)> {
    match (lhs, rhs) {
        (Cell::Int(a), Cell::Int(b)) => Ok((a, b)),
        _ => Err(RunError::TypeError(format!("{op} requires two ints, got {} and {}", lhs.type_name(), rhs.type_name()))),
    }
}

/// Executes a compiled program to completion, returning its exit code and any
/// runtime diagnostic produced along the way (a non-empty result means the
/// program aborted via a runtime error rather than `exit`).
#[must_use]
pub fn run(program: &Program, toks: &[Token], externs: &mut ExternRegistry, limits: VmLimits, tracer: &mut dyn VmTracer) -> (i32, Diagnostics) {
    let mut diags = Diagnostics::new();
    let mut vm = match Vm::new(program, limits) {
        Ok(vm) => vm,
        Err(err) => {
            let tok = program.cmds.first().map_or_else(|| TokId::new(0), |c| c.tok);
            diags.push(toks[tok.index()].range, err.to_string());
            return (1, diags);
        }
    };
    match vm.run_loop(program, externs, tracer) {
        Ok(code) => (code, diags),
        Err(err) => {
            diags.push(toks[vm.current_tok.index()].range, err.to_string());
            (1, diags)
        }
    }
}
