//! Zero-cost VM instrumentation, in place of a `log`/`tracing` dependency.
//!
//! A `VmTracer` trait with `#[inline(always)]` no-op default methods,
//! monomorphized into the evaluator loop so a release build carries no
//! tracing overhead at all when `NoopTracer` is selected.

use crate::codegen::cmd::CmdKind;

/// Implemented by anything that wants to observe VM execution. All methods
/// have no-op defaults; implement only the ones you need.
pub trait VmTracer {
    #[inline(always)]
    fn on_instruction(&mut self, _pc: u32, _kind: CmdKind, _stack_depth: u32) {}

    #[inline(always)]
    fn on_call(&mut self, _depth: u32) {}

    #[inline(always)]
    fn on_return(&mut self, _depth: u32) {}

    #[inline(always)]
    fn on_label_resolve(&mut self, _label_index: u32, _cmd_index: u32) {}
}

/// The production default: every hook compiles away entirely.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl VmTracer for NoopTracer {}

/// A human-readable execution trace printed to stderr, selected by
/// `loom-cli`'s `--trace` flag.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrTracer;

impl VmTracer for StderrTracer {
    fn on_instruction(&mut self, pc: u32, kind: CmdKind, stack_depth: u32) {
        eprintln!("  pc={pc:<5} {kind:<12} depth={stack_depth}");
    }

    fn on_call(&mut self, depth: u32) {
        eprintln!("call -> depth {depth}");
    }

    fn on_return(&mut self, depth: u32) {
        eprintln!("return -> depth {depth}");
    }

    fn on_label_resolve(&mut self, label_index: u32, cmd_index: u32) {
        eprintln!("label {label_index} -> cmd {cmd_index}");
    }
}
