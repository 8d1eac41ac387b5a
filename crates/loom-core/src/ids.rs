//! Arena index types used throughout the pipeline.
//!
//! Every cross-reference in this crate — AST children, scopes, locals, labels,
//! commands, environments, closures, strings, arrays — is a small integer index
//! into a typed `Vec`, never a pointer. This sidesteps cyclic-ownership issues
//! (a closure can capture an environment that outlives the frame that created
//! it) and makes every table trivially relocatable.

macro_rules! index_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            #[inline]
            #[must_use]
            pub fn new(index: usize) -> Self {
                Self(u32::try_from(index).expect("arena index overflowed u32"))
            }

            #[inline]
            #[must_use]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

index_type!(
    /// Index into the token vector produced by the lexer.
    TokId
);

index_type!(
    /// Index into the AST arena. Index 0 is the reserved sentinel node (see
    /// [`crate::ast::Ast::SENTINEL`]); no real child ever points at it.
    ExpId
);

index_type!(
    /// Index into the sub-expression table used for variadic AST children
    /// (array literals, call arguments, function parameters).
    SubExpId
);

index_type!(
    /// Index into the codegen scope table.
    ScopeId
);

index_type!(
    /// Index into the codegen label table. A label starts unresolved and is
    /// bound to a command index by the back-patching pass at the end of codegen.
    LabelId
);

index_type!(
    /// Index into the codegen function table (closures and externs share this
    /// table; see [`crate::codegen::state::FunKind`]).
    FunId
);

index_type!(
    /// Raw index into the unified cell store (stack region + heap region).
    CellRef
);

index_type!(
    /// Index into the VM's string table.
    StrId
);

index_type!(
    /// Index into the VM's array table.
    ArrayId
);

index_type!(
    /// Index into the VM's environment table.
    EnvId
);

index_type!(
    /// Index into the VM's closure table.
    ClosureId
);
