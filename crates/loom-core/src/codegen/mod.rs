//! Single-pass code generator: walks the AST once emitting a flat command
//! vector, then back-patches every label to a resolved command index.
//! Forward jumps emit a label eagerly; the final pass fills in its
//! command-index target, rather than attempting one-pass absolute offsets.

pub mod cmd;
pub mod state;

use ahash::AHashMap;

use crate::ast::{Ast, AssignOpKind, BinOpKind, ExpKind};
use crate::codegen::cmd::{Cmd, CmdKind};
use crate::codegen::state::{CodegenState, FunKind, LoopFrame};
use crate::diagnostics::{Diagnostics, SourceRange};
use crate::ids::{ExpId, FunId, LabelId, ScopeId, SubExpId, TokId};
use crate::lexer::Token;

/// The resolved, immutable output of codegen: ready for the VM to execute.
#[derive(Debug)]
pub struct Program {
    pub cmds: Vec<Cmd>,
    pub funs: Vec<FunDef>,
    pub global_scope: ScopeId,
    pub global_local_count: u32,
}

#[derive(Debug, Clone)]
pub enum FunDef {
    Closure {
        scope: ScopeId,
        entry_cmd: u32,
        local_count: u32,
        param_count: u32,
    },
    Extern {
        extern_index: u32,
    },
}

struct Codegen<'a> {
    ast: &'a Ast,
    toks: &'a [Token],
    src: &'a str,
    extern_names: &'a AHashMap<String, u32>,
    state: CodegenState,
    cmds: Vec<Cmd>,
    diags: Diagnostics,
}

/// Compiles `root` (the parser's program node) against the given extern
/// function name table, returning the resolved program and any diagnostics
/// raised along the way (unbound identifiers, `break` outside a loop).
#[must_use]
pub fn compile(ast: &Ast, root: ExpId, toks: &[Token], src: &str, extern_names: &AHashMap<String, u32>) -> (Program, Diagnostics) {
    let mut cg = Codegen {
        ast,
        toks,
        src,
        extern_names,
        state: CodegenState::default(),
        cmds: Vec::new(),
        diags: Diagnostics::new(),
    };
    let global_tok = ast.get(root).tok;
    let global_scope = cg.state.new_scope(None, global_tok);
    // `root` is the parser's program-level wrapper `Semi(stmts, null)`, which
    // exists so an embedded program always leaves `null` for an outer caller
    // (see the parser's program-wrapping note). `eval`'s exit code instead
    // wants the last statement's own value, so codegen compiles `first`
    // directly and never emits the wrapper's trailing `null`.
    let ExpKind::Semi { first, .. } = ast.get(root).kind.clone() else {
        crate::bug!("program root is always a Semi node");
    };
    cg.gen(first, global_scope);
    cg.emit(Cmd::new(CmdKind::Exit, global_tok));
    cg.backpatch();
    let funs = cg.finish_funs();
    let program = Program {
        cmds: cg.cmds,
        funs,
        global_scope,
        global_local_count: cg.state.scopes[global_scope.index()].local_count,
    };
    (program, cg.diags)
}

impl<'a> Codegen<'a> {
    fn tok_text(&self, tok: TokId) -> &'a str {
        let r = self.toks[tok.index()].range;
        &self.src[r.l as usize..r.r as usize]
    }

    fn tok_range(&self, tok: TokId) -> SourceRange {
        self.toks[tok.index()].range
    }

    fn emit(&mut self, cmd: Cmd) -> u32 {
        let idx = u32::try_from(self.cmds.len()).expect("program longer than u32::MAX commands");
        self.cmds.push(cmd);
        idx
    }

    fn place_label(&mut self, label: LabelId, tok: TokId) {
        let idx = self.emit(Cmd::new(CmdKind::Label, tok).with_x(label.index() as i64));
        self.state.resolve_label(label, idx);
    }

    fn backpatch(&mut self) {
        for cmd in &mut self.cmds {
            if matches!(cmd.kind, CmdKind::Jump | CmdKind::JumpUnless) {
                let label = cmd.label_id();
                let resolved = self.state.labels[label.index()]
                    .resolved
                    .unwrap_or_else(|| crate::bug!("unresolved label {} after codegen", label.index()));
                cmd.x = i64::from(resolved);
            }
        }
    }

    fn finish_funs(&self) -> Vec<FunDef> {
        self.state
            .funs
            .iter()
            .map(|f| match f.kind {
                FunKind::Closure {
                    scope,
                    entry_label,
                    param_count,
                } => {
                    let entry_cmd = self.state.labels[entry_label.index()]
                        .resolved
                        .unwrap_or_else(|| crate::bug!("unresolved function entry label"));
                    FunDef::Closure {
                        scope,
                        entry_cmd,
                        local_count: self.state.scopes[scope.index()].local_count,
                        param_count,
                    }
                }
                FunKind::Extern { extern_index } => FunDef::Extern { extern_index },
            })
            .collect()
    }

    /// Generates an rvalue. Leaves exactly one value on the stack.
    fn gen(&mut self, id: ExpId, scope: ScopeId) {
        let exp = self.ast.get(id);
        let tok = exp.tok;
        match exp.kind.clone() {
            ExpKind::Err { message } => {
                self.emit(Cmd::new(CmdKind::Err, tok).with_s(message));
            }
            ExpKind::Int { value } => {
                self.emit(Cmd::new(CmdKind::PushInt, tok).with_x(value));
            }
            ExpKind::Str { value } => {
                self.emit(Cmd::new(CmdKind::PushStr, tok).with_s(value));
            }
            ExpKind::Ident => {
                self.gen_ident_rvalue(tok, scope);
            }
            ExpKind::Paren { inner } => {
                self.gen(inner, scope);
            }
            ExpKind::Bracket { callee, index } => {
                self.gen(callee, scope);
                self.gen(index, scope);
                self.emit(Cmd::new(CmdKind::Index, tok));
            }
            ExpKind::Call { callee, args } => {
                self.gen(callee, scope);
                let items: Vec<_> = self.ast.subexp_range(args).iter().map(|s| s.exp).collect();
                let n = items.len();
                for arg in items {
                    self.gen(arg, scope);
                }
                self.emit(Cmd::new(CmdKind::Call, tok).with_x(n as i64));
            }
            ExpKind::ArrayLit { elems } => {
                self.emit(Cmd::new(CmdKind::PushArray, tok).with_x(0));
                let items: Vec<_> = self.ast.subexp_range(elems).iter().map(|s| s.exp).collect();
                for elem in items {
                    self.gen(elem, scope);
                    self.emit(Cmd::new(CmdKind::ArrayPush, tok));
                }
            }
            ExpKind::Semi { first, second } => {
                self.gen(first, scope);
                self.emit(Cmd::new(CmdKind::Pop, tok));
                self.gen(second, scope);
            }
            ExpKind::Let { init } => {
                let name = self.tok_text(tok).to_string();
                let slot = self.state.declare_local(scope, name, tok);
                self.emit(Cmd::new(CmdKind::LocalRef, tok).with_x(i64::from(slot)).with_scope(scope));
                self.gen(init, scope);
                self.emit(Cmd::new(CmdKind::CellSet, tok));
            }
            ExpKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.gen_if(tok, cond, then_branch, else_branch, scope);
            }
            ExpKind::While { cond, body } => {
                self.gen_while(tok, cond, body, scope);
            }
            ExpKind::Break => match self.state.loops.last().copied() {
                Some(frame) => {
                    self.emit(Cmd::new(CmdKind::Jump, tok).with_x(frame.break_label.index() as i64));
                }
                None => {
                    self.diags.push(self.tok_range(tok), "ループの外側では break を使用できません");
                    self.emit(Cmd::new(CmdKind::Err, tok).with_s("break outside loop"));
                }
            },
            ExpKind::Return { value } => {
                self.gen(value, scope);
                self.emit(Cmd::new(CmdKind::Return, tok));
            }
            ExpKind::Fun { params, body } => {
                self.gen_fun(tok, params, body, scope);
            }
            ExpKind::Assign { op, target, value } => {
                self.gen_assign(tok, op, target, value, scope);
            }
            ExpKind::BinOp { op, lhs, rhs } => {
                self.gen_binop(tok, op, lhs, rhs, scope);
            }
        }
    }

    /// Resolves an identifier rvalue: local load, extern reference, or an
    /// `err` command for an unbound name.
    fn gen_ident_rvalue(&mut self, tok: TokId, scope: ScopeId) {
        let name = self.tok_text(tok);
        if let Some((local_scope, slot)) = self.state.find_local(scope, name) {
            self.emit(Cmd::new(CmdKind::LoadLocal, tok).with_x(i64::from(slot)).with_scope(local_scope));
            return;
        }
        if let Some(&extern_index) = self.extern_names.get(name) {
            let fun_id = self.state.extern_fun(name, extern_index);
            self.emit(Cmd::new(CmdKind::PushExtern, tok).with_x(fun_id.index() as i64));
            return;
        }
        self.diags.push(self.tok_range(tok), format!("unbound variable '{name}'"));
        self.emit(Cmd::new(CmdKind::Err, tok).with_s(format!("unbound variable '{name}'")));
    }

    fn gen_ident_lval(&mut self, tok: TokId, scope: ScopeId) {
        let name = self.tok_text(tok);
        if let Some((local_scope, slot)) = self.state.find_local(scope, name) {
            self.emit(Cmd::new(CmdKind::LocalRef, tok).with_x(i64::from(slot)).with_scope(local_scope));
            return;
        }
        self.diags.push(self.tok_range(tok), format!("unbound variable '{name}'"));
        self.emit(Cmd::new(CmdKind::Err, tok).with_s(format!("unbound variable '{name}'")));
    }

    fn gen_if(&mut self, tok: TokId, cond: ExpId, then_branch: ExpId, else_branch: ExpId, scope: ScopeId) {
        let else_label = self.state.new_label();
        let end_label = self.state.new_label();
        self.gen(cond, scope);
        self.emit(Cmd::new(CmdKind::JumpUnless, tok).with_x(else_label.index() as i64));
        self.gen(then_branch, scope);
        self.emit(Cmd::new(CmdKind::Jump, tok).with_x(end_label.index() as i64));
        self.place_label(else_label, tok);
        self.gen(else_branch, scope);
        self.place_label(end_label, tok);
    }

    fn gen_while(&mut self, tok: TokId, cond: ExpId, body: ExpId, scope: ScopeId) {
        let continue_label = self.state.new_label();
        let break_label = self.state.new_label();
        self.state.loops.push(LoopFrame { break_label });
        self.place_label(continue_label, tok);
        self.gen(cond, scope);
        self.emit(Cmd::new(CmdKind::JumpUnless, tok).with_x(break_label.index() as i64));
        self.gen(body, scope);
        self.emit(Cmd::new(CmdKind::Pop, tok));
        self.emit(Cmd::new(CmdKind::Jump, tok).with_x(continue_label.index() as i64));
        self.place_label(break_label, tok);
        self.emit(Cmd::new(CmdKind::PushNull, tok));
        self.state.loops.pop();
    }

    fn gen_fun(&mut self, tok: TokId, params: (SubExpId, SubExpId), body: ExpId, outer_scope: ScopeId) {
        let skip_label = self.state.new_label();
        let entry_label = self.state.new_label();
        self.emit(Cmd::new(CmdKind::Jump, tok).with_x(skip_label.index() as i64));
        self.place_label(entry_label, tok);

        let fn_scope = self.state.new_scope(Some(outer_scope), tok);
        let param_ids: Vec<_> = self.ast.subexp_range(params).iter().map(|s| s.exp).collect();
        let param_count = param_ids.len() as u32;
        for param in param_ids {
            let param_tok = self.ast.get(param).tok;
            let name = self.tok_text(param_tok).to_string();
            self.state.declare_local(fn_scope, name, param_tok);
        }
        let fun_id = self.state.new_closure_fun(fn_scope, entry_label, param_count, "");

        self.gen(body, fn_scope);
        self.emit(Cmd::new(CmdKind::Return, tok));
        self.place_label(skip_label, tok);
        self.emit(Cmd::new(CmdKind::PushClosure, tok).with_x(fun_id.index() as i64));
    }

    fn gen_assign(&mut self, tok: TokId, op: AssignOpKind, target: ExpId, value: ExpId, scope: ScopeId) {
        match op {
            AssignOpKind::Set => {
                self.gen_lval(target, scope);
                self.gen(value, scope);
                self.emit(Cmd::new(CmdKind::CellSet, tok));
            }
            _ => {
                self.gen_lval(target, scope);
                self.emit(Cmd::new(CmdKind::Dup, tok));
                self.emit(Cmd::new(CmdKind::CellGet, tok));
                self.gen(value, scope);
                let bin = match op {
                    AssignOpKind::Add => CmdKind::Add,
                    AssignOpKind::Sub => CmdKind::Sub,
                    AssignOpKind::Mul => CmdKind::Mul,
                    AssignOpKind::Div => CmdKind::Div,
                    AssignOpKind::Mod => CmdKind::Mod,
                    AssignOpKind::Set => unreachable!(),
                };
                self.emit(Cmd::new(bin, tok));
                self.emit(Cmd::new(CmdKind::CellSet, tok));
            }
        }
    }

    /// Generates an lvalue: leaves exactly one `Ref` cell on the stack. Only
    /// identifiers and indexing expressions are valid lvalues; anything else
    /// emits a runtime `err` command.
    fn gen_lval(&mut self, id: ExpId, scope: ScopeId) {
        let exp = self.ast.get(id);
        let tok = exp.tok;
        match exp.kind.clone() {
            ExpKind::Ident => self.gen_ident_lval(tok, scope),
            ExpKind::Bracket { callee, index } => {
                self.gen(callee, scope);
                self.gen(index, scope);
                self.emit(Cmd::new(CmdKind::IndexRef, tok));
            }
            _ => {
                self.diags.push(self.tok_range(tok), "invalid assignment target");
                self.emit(Cmd::new(CmdKind::Err, tok).with_s("invalid assignment target"));
            }
        }
    }

    fn gen_binop(&mut self, tok: TokId, op: BinOpKind, lhs: ExpId, rhs: ExpId, scope: ScopeId) {
        match op {
            BinOpKind::Add => self.gen_simple_binop(tok, CmdKind::Add, lhs, rhs, scope),
            BinOpKind::Sub => self.gen_simple_binop(tok, CmdKind::Sub, lhs, rhs, scope),
            BinOpKind::Mul => self.gen_simple_binop(tok, CmdKind::Mul, lhs, rhs, scope),
            BinOpKind::Div => self.gen_simple_binop(tok, CmdKind::Div, lhs, rhs, scope),
            BinOpKind::Mod => self.gen_simple_binop(tok, CmdKind::Mod, lhs, rhs, scope),
            BinOpKind::Eq => self.gen_simple_binop(tok, CmdKind::Eq, lhs, rhs, scope),
            BinOpKind::Ne => {
                self.gen_simple_binop(tok, CmdKind::Eq, lhs, rhs, scope);
                self.emit(Cmd::new(CmdKind::PushNull, tok));
                self.emit(Cmd::new(CmdKind::Eq, tok));
            }
            BinOpKind::Lt => self.gen_simple_binop(tok, CmdKind::Lt, lhs, rhs, scope),
            BinOpKind::Le => {
                // a <= b: swap operands, emit <, negate.
                self.gen(rhs, scope);
                self.gen(lhs, scope);
                self.emit(Cmd::new(CmdKind::Lt, tok));
                self.emit(Cmd::new(CmdKind::PushNull, tok));
                self.emit(Cmd::new(CmdKind::Eq, tok));
            }
            BinOpKind::Gt => {
                // a > b: swap operands, emit <.
                self.gen(rhs, scope);
                self.gen(lhs, scope);
                self.emit(Cmd::new(CmdKind::Lt, tok));
            }
            BinOpKind::Ge => {
                // a >= b: emit <, negate.
                self.gen(lhs, scope);
                self.gen(rhs, scope);
                self.emit(Cmd::new(CmdKind::Lt, tok));
                self.emit(Cmd::new(CmdKind::PushNull, tok));
                self.emit(Cmd::new(CmdKind::Eq, tok));
            }
        }
    }

    fn gen_simple_binop(&mut self, tok: TokId, kind: CmdKind, lhs: ExpId, rhs: ExpId, scope: ScopeId) {
        self.gen(lhs, scope);
        self.gen(rhs, scope);
        self.emit(Cmd::new(kind, tok));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn compile_src(src: &str) -> (Program, Diagnostics) {
        let toks = tokenize(src);
        let (ast, root, parse_diags) = parse(src, &toks);
        assert!(parse_diags.is_empty());
        compile(&ast, root, &toks, src, &AHashMap::default())
    }

    #[test]
    fn break_outside_loop_is_diagnosed() {
        let (_program, diags) = compile_src("break");
        assert_eq!(diags.len(), 1);
        assert!(diags.items()[0].message.contains("break"));
    }

    #[test]
    fn simple_arithmetic_compiles_without_diagnostics() {
        let (program, diags) = compile_src("1 + 2 * 3");
        assert!(diags.is_empty());
        assert!(program.cmds.iter().any(|c| c.kind == CmdKind::Mul));
        assert!(program.cmds.iter().any(|c| c.kind == CmdKind::Add));
    }

    #[test]
    fn unbound_identifier_is_diagnosed() {
        let (_program, diags) = compile_src("x");
        assert_eq!(diags.len(), 1);
    }
}
