//! Resource limits for one VM run: stack/heap capacity and the GC-threshold
//! stub.

/// Fixed capacities for one `eval` invocation. Never shared across
/// invocations — each call to `eval` constructs its own VM state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmLimits {
    /// Number of cells reserved for the stack region.
    pub stack_cells: u32,
    /// Number of cells reserved for the heap region.
    pub heap_cells: u32,
    /// Remaining-heap threshold (in cells) below which `does_gc` is raised.
    /// GC itself is a stub: the flag is observable but nothing acts on it.
    pub gc_threshold: u32,
}

impl Default for VmLimits {
    fn default() -> Self {
        Self {
            stack_cells: 16 * 1024,
            heap_cells: 4 * 1024 * 1024,
            gc_threshold: 64 * 1024,
        }
    }
}

impl VmLimits {
    /// An effectively unbounded configuration for embedding contexts that
    /// don't want resource caps (tests, fuzzing harnesses).
    #[must_use]
    pub fn no_limit() -> Self {
        Self {
            stack_cells: u32::MAX / 4,
            heap_cells: u32::MAX / 4,
            gc_threshold: 0,
        }
    }
}
