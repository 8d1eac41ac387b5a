//! Host extern functions: the only way a program observes the outside world.
//! A fixed set of names is supplied upfront and looked up by the code
//! generator during identifier resolution; the host implementation behind
//! each name is a plain synchronous Rust closure.

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::vm::arrays::Arrays;
use crate::vm::cell::Cell;
use crate::vm::heap::CellStore;
use crate::vm::strings::Strs;

/// Call arguments rarely exceed a handful; inline storage avoids a heap
/// allocation for the common case.
pub(crate) type CallArgs = SmallVec<[Cell; 4]>;

/// The call frame passed to a host extern function: arguments plus a
/// one-cell result slot and an error-rejection slot.
pub struct ExternCall<'a> {
    pub(crate) heap: &'a mut CellStore,
    pub(crate) arrays: &'a mut Arrays,
    pub(crate) strings: &'a mut Strs,
    pub(crate) args: CallArgs,
    pub(crate) result: Option<Cell>,
    pub(crate) error: Option<String>,
}

impl<'a> ExternCall<'a> {
    #[must_use]
    pub fn argc(&self) -> usize {
        self.args.len()
    }

    #[must_use]
    pub fn arg(&self, i: usize) -> Cell {
        self.args.get(i).copied().unwrap_or(Cell::Int(0))
    }

    #[must_use]
    pub fn heap(&self) -> &CellStore {
        self.heap
    }

    #[must_use]
    pub fn heap_mut(&mut self) -> &mut CellStore {
        self.heap
    }

    #[must_use]
    pub fn arrays(&self) -> &Arrays {
        self.arrays
    }

    #[must_use]
    pub fn arrays_mut(&mut self) -> &mut Arrays {
        self.arrays
    }

    #[must_use]
    pub fn strings_mut(&mut self) -> &mut Strs {
        self.strings
    }

    pub fn resolve(&mut self, value: Cell) {
        self.result = Some(value);
    }

    pub fn reject(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }
}

pub type ExternFn = Box<dyn FnMut(&mut ExternCall) + Send>;

/// The set of externs available to one `eval` invocation: names (consulted
/// by codegen's identifier resolution) paired with their host implementation
/// (consulted by the VM at call time). Registration order is the extern's
/// stable index.
#[derive(Default)]
pub struct ExternRegistry {
    names: Vec<String>,
    /// Mirrors `names` for O(1) lookup; codegen's identifier resolution
    /// consults this once per reference instead of scanning the vector.
    by_name: AHashMap<String, u32>,
    funcs: Vec<ExternFn>,
}

impl ExternRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, f: impl FnMut(&mut ExternCall) + Send + 'static) {
        let name = name.into();
        let index = u32::try_from(self.names.len()).expect("extern table longer than u32::MAX");
        self.by_name.insert(name.clone(), index);
        self.names.push(name);
        self.funcs.push(Box::new(f));
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    /// The name-to-index map codegen consults while resolving identifiers
    /// that aren't local variables.
    pub(crate) fn name_index_map(&self) -> &AHashMap<String, u32> {
        &self.by_name
    }

    pub(crate) fn call(&mut self, index: usize, call: &mut ExternCall) {
        (self.funcs[index])(call);
    }
}

/// Registers the three array built-ins: `array_len`, `array_push`,
/// `array_pop`.
pub fn register_default_externs(registry: &mut ExternRegistry) {
    registry.register("array_len", |call: &mut ExternCall| {
        let Cell::Array(id) = call.arg(0) else {
            call.reject("array_len: argument must be an array");
            return;
        };
        let len = call.arrays().get(id).len;
        call.resolve(Cell::Int(i64::from(len)));
    });

    registry.register("array_push", |call: &mut ExternCall| {
        let Cell::Array(id) = call.arg(0) else {
            call.reject("array_push: argument must be an array");
            return;
        };
        let value = call.arg(1);
        if call.arrays.push(call.heap, id, value).is_err() {
            call.reject("array_push: out of memory");
            return;
        }
        call.resolve(Cell::Array(id));
    });

    registry.register("array_pop", |call: &mut ExternCall| {
        let Cell::Array(id) = call.arg(0) else {
            call.reject("array_pop: argument must be an array");
            return;
        };
        match call.arrays.pop(call.heap, id) {
            Some(value) => call.resolve(value),
            None => call.reject("array_pop: array is empty"),
        }
    });
}
