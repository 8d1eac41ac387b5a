//! Scopes, locals, labels, and functions: the compile-time bookkeeping the
//! code generator threads through a single AST walk.

use crate::ids::{FunId, LabelId, ScopeId, TokId};

#[derive(Debug, Clone)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub local_count: u32,
    pub tok: TokId,
}

#[derive(Debug, Clone)]
pub struct Local {
    pub name: String,
    pub scope: ScopeId,
    pub slot: u32,
    pub tok: TokId,
}

#[derive(Debug, Clone, Copy)]
pub struct Label {
    pub resolved: Option<u32>,
}

#[derive(Debug, Clone, Copy)]
pub enum FunKind {
    Closure { scope: ScopeId, entry_label: LabelId, param_count: u32 },
    Extern { extern_index: u32 },
}

#[derive(Debug, Clone)]
pub struct Fun {
    pub kind: FunKind,
    pub name: String,
}

/// A `while` loop's break target, pushed on entry and popped on exit; `break`
/// jumps to the top of this stack, erroring if it's empty.
#[derive(Debug, Clone, Copy)]
pub struct LoopFrame {
    pub break_label: LabelId,
}

/// All codegen-time tables. Owned by [`crate::codegen::Codegen`] for the
/// duration of one compilation; never shared across `eval` invocations.
#[derive(Debug, Default)]
pub struct CodegenState {
    pub scopes: Vec<Scope>,
    pub locals: Vec<Local>,
    pub labels: Vec<Label>,
    pub funs: Vec<Fun>,
    pub loops: Vec<LoopFrame>,
}

impl CodegenState {
    pub fn new_scope(&mut self, parent: Option<ScopeId>, tok: TokId) -> ScopeId {
        let id = ScopeId::new(self.scopes.len());
        self.scopes.push(Scope {
            parent,
            local_count: 0,
            tok,
        });
        id
    }

    pub fn declare_local(&mut self, scope: ScopeId, name: impl Into<String>, tok: TokId) -> u32 {
        let s = &mut self.scopes[scope.index()];
        let slot = s.local_count;
        s.local_count += 1;
        self.locals.push(Local {
            name: name.into(),
            scope,
            slot,
            tok,
        });
        slot
    }

    /// Resolves `name` starting at `scope` and walking the parent chain,
    /// returning the innermost declaring scope and slot. Shadowing within one
    /// scope resolves to the most recently declared local.
    #[must_use]
    pub fn find_local(&self, mut scope: ScopeId, name: &str) -> Option<(ScopeId, u32)> {
        loop {
            if let Some(local) = self
                .locals
                .iter()
                .rev()
                .find(|l| l.scope == scope && l.name == name)
            {
                return Some((local.scope, local.slot));
            }
            match self.scopes[scope.index()].parent {
                Some(parent) => scope = parent,
                None => return None,
            }
        }
    }

    pub fn new_label(&mut self) -> LabelId {
        let id = LabelId::new(self.labels.len());
        self.labels.push(Label { resolved: None });
        id
    }

    pub fn resolve_label(&mut self, label: LabelId, cmd_index: u32) {
        self.labels[label.index()].resolved = Some(cmd_index);
    }

    pub fn new_closure_fun(&mut self, scope: ScopeId, entry_label: LabelId, param_count: u32, name: impl Into<String>) -> FunId {
        let id = FunId::new(self.funs.len());
        self.funs.push(Fun {
            kind: FunKind::Closure {
                scope,
                entry_label,
                param_count,
            },
            name: name.into(),
        });
        id
    }

    /// Finds or registers the `Fun` entry for an extern function by name,
    /// reusing the entry if this name has already been referenced.
    pub fn extern_fun(&mut self, name: &str, extern_index: u32) -> FunId {
        if let Some(pos) = self.funs.iter().position(|f| f.name == name && matches!(f.kind, FunKind::Extern { .. })) {
            return FunId::new(pos);
        }
        let id = FunId::new(self.funs.len());
        self.funs.push(Fun {
            kind: FunKind::Extern { extern_index },
            name: name.to_string(),
        });
        id
    }
}
