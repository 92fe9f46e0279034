//! Two equal-sized semispaces and a stop-the-world Cheney-style copying
//! collector, expressed over arena indices rather than native pointers.

use tracing::debug;

use crate::error::StorageError;
use crate::value::{Cell, CellData, Value};

/// The set of references the collector must keep alive and rewrite on every
/// collection. Everything else reachable hangs off these through `Pair`,
/// `Function`, and `Symbol` cells, which the scan phase traces.
#[derive(Clone, Copy, Debug)]
pub struct Roots {
    pub oblist: Value,
    pub truth: Value,
    pub unbound_marker: Value,
    pub eof_val: Value,
    pub quote_sym: Value,
    pub do_sym: Value,
    pub fn_sym: Value,
    pub errobj_sym: Value,
}

impl Roots {
    fn as_mut_array(&mut self) -> [&mut Value; 8] {
        [
            &mut self.oblist,
            &mut self.truth,
            &mut self.unbound_marker,
            &mut self.eof_val,
            &mut self.quote_sym,
            &mut self.do_sym,
            &mut self.fn_sym,
            &mut self.errobj_sym,
        ]
    }
}

/// The arena. Allocates cells in the active semispace and relocates live
/// data into the other semispace on collection.
pub struct Heap {
    spaces: [Vec<Cell>; 2],
    active: usize,
    capacity: usize,
    /// Present once `init` has populated the reserved sentinels; absent
    /// only during `Heap::new`'s own bootstrap.
    pub roots: Option<Roots>,
}

impl Heap {
    pub fn new(capacity: usize) -> Heap {
        Heap {
            spaces: [
                Vec::with_capacity(capacity),
                Vec::with_capacity(capacity),
            ],
            active: 0,
            capacity,
            roots: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn active_space(&self) -> &Vec<Cell> {
        &self.spaces[self.active]
    }

    fn active_space_mut(&mut self) -> &mut Vec<Cell> {
        &mut self.spaces[self.active]
    }

    /// Allocates `data` as a fresh cell in the active semispace.
    pub fn alloc(&mut self, data: CellData) -> Result<Value, StorageError> {
        if self.active_space().len() >= self.capacity {
            return Err(StorageError::OutOfMemory);
        }
        let space = self.active_space_mut();
        let index = space.len();
        space.push(Cell::new(data));
        Ok(Value::Cell(index))
    }

    pub fn get(&self, v: Value) -> Option<&CellData> {
        match v {
            Value::Nil => None,
            Value::Cell(i) => Some(&self.active_space()[i].data),
        }
    }

    pub fn get_mut(&mut self, v: Value) -> Option<&mut CellData> {
        match v {
            Value::Nil => None,
            Value::Cell(i) => Some(&mut self.active_space_mut()[i].data),
        }
    }

    /// Runs one full collection, relocating every root and everything
    /// reachable from it. Called deterministically between REPL iterations.
    pub fn collect(&mut self) {
        let old = self.active;
        let new = 1 - old;
        self.spaces[new].clear();
        self.active = new;

        let mut roots = self.roots.take().expect("heap used before init");
        for root in roots.as_mut_array() {
            *root = self.relocate(old, *root);
        }
        self.roots = Some(roots);

        let mut scan = 0;
        while scan < self.spaces[new].len() {
            self.trace_one(old, scan);
            scan += 1;
        }

        let copied = self.spaces[new].len();
        self.spaces[old].clear();
        debug!(copied, "gc cycle complete");
    }

    fn trace_one(&mut self, old: usize, scan: usize) {
        let new = self.active;
        match self.spaces[new][scan].data.clone() {
            CellData::Pair { car, cdr } => {
                let new_car = self.relocate(old, car);
                let new_cdr = self.relocate(old, cdr);
                if let CellData::Pair { car, cdr } = &mut self.spaces[new][scan].data {
                    *car = new_car;
                    *cdr = new_cdr;
                }
            }
            CellData::Function { code, env } => {
                let new_code = self.relocate(old, code);
                let new_env = self.relocate(old, env);
                if let CellData::Function { code, env } = &mut self.spaces[new][scan].data {
                    *code = new_code;
                    *env = new_env;
                }
            }
            CellData::Symbol { global, .. } => {
                let new_global = self.relocate(old, global);
                if let CellData::Symbol { global, .. } = &mut self.spaces[new][scan].data {
                    *global = new_global;
                }
            }
            CellData::Number(_) | CellData::Primitive { .. } => {}
        }
    }

    /// Copies the cell at `v` (read from semispace `old`) into the current
    /// active semispace if it hasn't been copied already, and returns a
    /// reference to the copy. Leaves a forwarding mark behind in `old` so a
    /// second reference to the same cell reuses the copy instead of
    /// duplicating it.
    fn relocate(&mut self, old: usize, v: Value) -> Value {
        let index = match v {
            Value::Nil => return Value::Nil,
            Value::Cell(i) => i,
        };
        if let Some(forward) = self.spaces[old][index].forward {
            return Value::Cell(forward);
        }
        let data = self.spaces[old][index].data.clone();
        let new = self.active;
        let new_index = self.spaces[new].len();
        self.spaces[new].push(Cell::new(data));
        self.spaces[old][index].forward = Some(new_index);
        Value::Cell(new_index)
    }
}
