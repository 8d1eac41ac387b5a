//! Owned-buffer string table. `push` interns nothing — every string literal
//! and every concatenation result gets its own table entry: a fresh buffer,
//! no rope or ref-counting.

use crate::ids::StrId;

#[derive(Default)]
pub struct Strs {
    buffers: Vec<String>,
}

impl Strs {
    pub fn push(&mut self, s: impl Into<String>) -> StrId {
        let id = StrId::new(self.buffers.len());
        self.buffers.push(s.into());
        id
    }

    #[must_use]
    pub fn get(&self, id: StrId) -> &str {
        &self.buffers[id.index()]
    }
}
