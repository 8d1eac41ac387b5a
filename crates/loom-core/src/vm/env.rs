//! Call-activation storage. An `Env` is a heap cell range, one cell per
//! declared local in its scope, chained by `parent` to model lexical nesting.
//! Closures capture the env that was current at their creation point.

use crate::error::RunResult;
use crate::ids::{CellRef, EnvId, ScopeId};
use crate::vm::cell::Cell;
use crate::vm::heap::CellStore;

#[derive(Debug, Clone, Copy)]
pub struct EnvEntry {
    pub parent: Option<EnvId>,
    pub scope: ScopeId,
    pub base: CellRef,
}

#[derive(Default)]
pub struct Envs {
    entries: Vec<EnvEntry>,
}

impl Envs {
    pub fn alloc(&mut self, heap: &mut CellStore, parent: Option<EnvId>, scope: ScopeId, local_count: u32) -> RunResult<EnvId> {
        let base = heap.heap_alloc(local_count.max(1))?;
        let id = EnvId::new(self.entries.len());
        self.entries.push(EnvEntry { parent, scope, base });
        Ok(id)
    }

    #[must_use]
    pub fn get(&self, id: EnvId) -> EnvEntry {
        self.entries[id.index()]
    }

    #[must_use]
    pub fn slot_ref(&self, id: EnvId, slot: u32) -> CellRef {
        CellRef::new(self.get(id).base.index() + slot as usize)
    }

    pub fn load(&self, heap: &CellStore, id: EnvId, slot: u32) -> Cell {
        heap.get(self.slot_ref(id, slot))
    }

    pub fn store(&self, heap: &mut CellStore, id: EnvId, slot: u32, value: Cell) {
        heap.set(self.slot_ref(id, slot), value);
    }

    /// Walks the `parent` chain from `start`, looking for the env whose
    /// scope matches `target_scope`. Every `LoadLocal`/`LocalRef` command
    /// names the scope the identifier was declared in, which codegen
    /// resolved lexically — the VM just has to find that scope's activation
    /// among possibly several enclosing ones.
    #[must_use]
    pub fn find_scope(&self, start: EnvId, target_scope: ScopeId) -> EnvId {
        let mut cur = start;
        loop {
            let entry = self.get(cur);
            if entry.scope == target_scope {
                return cur;
            }
            match entry.parent {
                Some(parent) => cur = parent,
                None => crate::bug!("no enclosing env matches scope {}", target_scope.index()),
            }
        }
    }
}
