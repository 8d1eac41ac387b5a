//! The call stack: one `Frame` per active activation, pushed on `call` and
//! popped on `return`.

use crate::ids::{EnvId, TokId};

#[derive(Debug, Clone, Copy)]
pub struct Frame {
    pub return_pc: u32,
    pub caller_env: EnvId,
    pub call_site: TokId,
}
