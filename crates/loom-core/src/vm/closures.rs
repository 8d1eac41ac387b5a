//! Closure table: pairs a compiled function index with the environment that
//! was current at the `push_closure` site (lexical capture).

use crate::ids::{ClosureId, EnvId};

#[derive(Debug, Clone, Copy)]
pub struct ClosureEntry {
    pub fun_index: u32,
    pub env: EnvId,
}

#[derive(Default)]
pub struct Closures {
    entries: Vec<ClosureEntry>,
}

impl Closures {
    pub fn alloc(&mut self, fun_index: u32, env: EnvId) -> ClosureId {
        let id = ClosureId::new(self.entries.len());
        self.entries.push(ClosureEntry { fun_index, env });
        id
    }

    #[must_use]
    pub fn get(&self, id: ClosureId) -> ClosureEntry {
        self.entries[id.index()]
    }
}
