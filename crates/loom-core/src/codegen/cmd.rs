//! The flat instruction set the code generator emits and the VM executes.

use crate::ids::{LabelId, ScopeId, TokId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum CmdKind {
    PushInt,
    PushStr,
    PushNull,
    /// Reads a local's current value (rvalue).
    LoadLocal,
    /// Pushes a `Ref` cell addressing a local's storage slot (lvalue).
    LocalRef,
    PushExtern,
    PushClosure,
    Dup,
    Pop,
    /// Pops a `Ref` cell, pushes the value it currently points at.
    CellGet,
    /// Pops `[ref, value]`, writes through `ref`, pushes `value` back.
    CellSet,
    Eq,
    Lt,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Index,
    IndexRef,
    PushArray,
    ArrayPush,
    Jump,
    JumpUnless,
    /// No-op marker; exists purely so label positions are visible while
    /// reading a disassembly. Resolved labels point one-past this command.
    Label,
    Call,
    Return,
    /// Aborts the program with the attached string payload as the message.
    Err,
    Exit,
}

/// One VM instruction. Not every field is meaningful for every `kind`; see
/// the emission sites in `codegen::lower` for which fields each kind reads.
#[derive(Debug, Clone)]
pub struct Cmd {
    pub kind: CmdKind,
    pub x: i64,
    pub s: Option<String>,
    pub scope: Option<ScopeId>,
    pub tok: TokId,
}

impl Cmd {
    #[must_use]
    pub fn new(kind: CmdKind, tok: TokId) -> Self {
        Self {
            kind,
            x: 0,
            s: None,
            scope: None,
            tok,
        }
    }

    #[must_use]
    pub fn with_x(mut self, x: i64) -> Self {
        self.x = x;
        self
    }

    #[must_use]
    pub fn with_s(mut self, s: impl Into<String>) -> Self {
        self.s = Some(s.into());
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: ScopeId) -> Self {
        self.scope = Some(scope);
        self
    }

    #[must_use]
    pub fn label_id(&self) -> LabelId {
        LabelId::new(self.x as usize)
    }
}
