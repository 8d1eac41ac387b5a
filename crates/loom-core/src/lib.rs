//! Core of a small expression-oriented scripting language: lexer, recursive-
//! descent parser, arena AST, single-pass code generator, and a stack-based
//! VM with closures, cells, and host extern functions.
//!
//! The test-harness entry point is [`eval`]; [`eval_with`] exposes the knobs
//! (resource limits, a [`VmTracer`], extra host externs) a CLI wrapper needs.

pub mod ast;
pub mod codegen;
pub mod diagnostics;
pub mod dump;
pub mod error;
pub mod externs;
pub mod ids;
pub mod lexer;
pub mod parser;
pub mod resource;
pub mod tracer;
pub mod vm;

pub use diagnostics::{Diagnostics, Source};
pub use error::{RunError, RunResult};
pub use externs::{register_default_externs, ExternCall, ExternFn, ExternRegistry};
pub use resource::VmLimits;
pub use tracer::{NoopTracer, StderrTracer, VmTracer};

/// Runs `source` to completion with default resource limits, no tracing, and
/// only the built-in array externs registered. Mirrors the `eval(source) ->
/// (exit_code, diagnostics_text)` interface.
#[must_use]
pub fn eval(source: &str) -> (i32, String) {
    let mut externs = ExternRegistry::new();
    register_default_externs(&mut externs);
    eval_with(source, VmLimits::default(), &mut NoopTracer, &mut externs)
}

/// Full entry point: runs `source` with caller-supplied limits, tracer, and
/// extern registry (so a host can register additional externs before
/// evaluation).
#[must_use]
pub fn eval_with(source: &str, limits: VmLimits, tracer: &mut dyn VmTracer, externs: &mut ExternRegistry) -> (i32, String) {
    let src = Source::new(source);
    let toks = lexer::tokenize(source);
    let (ast, root, parse_diags) = parser::parse(source, &toks);
    let (program, codegen_diags) = codegen::compile(&ast, root, &toks, source, externs.name_index_map());

    let mut diags = Diagnostics::new();
    for item in parse_diags.items().iter().chain(codegen_diags.items()) {
        diags.push(item.range, item.message.clone());
    }

    let (vm_code, vm_diags) = vm::run(&program, &toks, externs, limits, tracer);
    for item in vm_diags.items() {
        diags.push(item.range, item.message.clone());
    }

    // A diagnostic anywhere in the pipeline forces a non-zero exit code, even
    // if the unreachable-in-practice command stream the VM actually walked
    // happened to reach a clean `exit 0`.
    let exit_code = if !diags.is_empty() { 1.max(vm_code) } else { vm_code };
    (exit_code, diags.render(&src))
}

/// Dumps the raw token stream, source text joined by spaces, for debugging
/// and for the lexer's own round-trip property.
#[must_use]
pub fn tokenize_dump(source: &str) -> String {
    lexer::tokenize_dump(source)
}

/// Dumps the parsed program (minus the program-level wrapping `Semi`/`null`)
/// as a parenthesized prefix s-expression.
#[must_use]
pub fn parse_dump(source: &str) -> String {
    let toks = lexer::tokenize(source);
    let (ast, root, _diags) = parser::parse(source, &toks);
    let ast::ExpKind::Semi { first, .. } = ast.get(root).kind.clone() else {
        unreachable!("program root is always wrapped in a Semi node");
    };
    dump::dump(&ast, first, &toks, source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compound_assignment_exits_forty_two() {
        let (code, diags) = eval("let a = 2; a += 1; a *= 14; a");
        assert_eq!(code, 42);
        assert!(diags.is_empty());
    }

    #[test]
    fn array_builtins_exit_two() {
        let (code, diags) = eval("let a = []; array_push(a, 1); array_push(a, 2); array_len(a)");
        assert_eq!(code, 2);
        assert!(diags.is_empty());
    }

    #[test]
    fn closures_capture_their_defining_scope() {
        let (code, diags) = eval("let f = fun(x) x + 1; f(41)");
        assert_eq!(code, 42);
        assert!(diags.is_empty());
    }

    #[test]
    fn break_outside_loop_is_a_diagnosed_runtime_error() {
        let (code, diags) = eval("break");
        assert_eq!(code, 1);
        assert!(diags.contains("break"));
    }

    #[test]
    fn precedence_dump_matches_expected_sexp() {
        assert_eq!(parse_dump("1 + 2 * (3 / 4)"), "(+ 1 (* 2 (/ 3 4)))");
    }
}
