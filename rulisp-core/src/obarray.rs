//! The oblist: a singly linked list of interned symbols, itself a GC root.

use crate::error::Result;
use crate::heap::Heap;
use crate::value::{CellData, Value};

impl Heap {
    /// Returns the existing symbol named `name`, if the oblist already
    /// holds one, without allocating.
    pub fn intern_try(&self, name: &str) -> Value {
        let oblist = self.roots.expect("heap used before init").oblist;
        let mut cursor = oblist;
        loop {
            let (sym, rest) = match self.get(cursor) {
                Some(CellData::Pair { car, cdr }) => (*car, *cdr),
                _ => return Value::Nil,
            };
            if let Some(CellData::Symbol { name: existing, .. }) = self.get(sym) {
                if existing.as_str() == name {
                    return sym;
                }
            }
            cursor = rest;
        }
    }

    /// Returns the symbol named `name`, interning a fresh one (with the
    /// unbound-marker as its global binding) and prepending it to the
    /// oblist if it didn't already exist.
    pub fn intern(&mut self, name: &str) -> Result<Value> {
        let existing = self.intern_try(name);
        if !existing.is_nil() {
            return Ok(existing);
        }

        let unbound = self.roots.expect("heap used before init").unbound_marker;
        let sym = self.alloc(CellData::Symbol {
            name: name.to_owned(),
            global: unbound,
        })?;
        tracing::trace!(name, "interning new symbol");

        let mut roots = self.roots.take().expect("heap used before init");
        let new_head = self.alloc(CellData::Pair {
            car: sym,
            cdr: roots.oblist,
        })?;
        roots.oblist = new_head;
        self.roots = Some(roots);

        Ok(sym)
    }
}
