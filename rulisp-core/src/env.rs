//! Lexical environments: association lists of `(formals . actuals)` frames,
//! chained innermost-first. Globals are not modeled here at all — they live
//! directly in each symbol's `global` cell (see `value::CellData::Symbol`).

use crate::error::{EvalError, Result};
use crate::heap::Heap;
use crate::value::{CellData, Value};

/// Where a lexical binding physically lives, so `set!` can mutate it in
/// place without re-walking the environment.
enum Slot {
    /// An ordinary positional binding: the value is the car of this pair,
    /// one of the actuals cells lined up against a formal.
    Car(Value),
    /// A capture-all binding (`fn rest ...`): the value is the whole
    /// actuals list, stored as the cdr of the frame pair itself.
    Cdr(Value),
}

fn read_slot(heap: &Heap, slot: &Slot) -> Result<Value> {
    let (container, want_car) = match slot {
        Slot::Car(p) => (*p, true),
        Slot::Cdr(p) => (*p, false),
    };
    match heap.get(container) {
        Some(CellData::Pair { car, cdr }) => Ok(if want_car { *car } else { *cdr }),
        _ => Err(EvalError::DamagedFrame.into()),
    }
}

fn write_slot(heap: &mut Heap, slot: &Slot, value: Value) -> Result<()> {
    let (container, want_car) = match slot {
        Slot::Car(p) => (*p, true),
        Slot::Cdr(p) => (*p, false),
    };
    match heap.get_mut(container) {
        Some(CellData::Pair { car, cdr }) => {
            if want_car {
                *car = value;
            } else {
                *cdr = value;
            }
            Ok(())
        }
        _ => Err(EvalError::DamagedFrame.into()),
    }
}

/// Walks `env` innermost-first looking for `sym`. A formal that is itself a
/// bare symbol (rather than a list) captures the whole remaining actuals
/// list, matching `fn`'s "formals may be a single symbol" rule.
fn find(heap: &Heap, sym: Value, env: Value) -> Result<Option<Slot>> {
    let mut frames = env;
    loop {
        let (frame, rest) = match heap.get(frames) {
            None => return Ok(None),
            Some(CellData::Pair { car, cdr }) => (*car, *cdr),
            Some(_) => return Err(EvalError::DamagedFrame.into()),
        };
        let (formals, actuals) = match heap.get(frame) {
            Some(CellData::Pair { car, cdr }) => (*car, *cdr),
            _ => return Err(EvalError::DamagedFrame.into()),
        };

        if matches!(heap.get(formals), Some(CellData::Symbol { .. })) {
            if formals == sym {
                return Ok(Some(Slot::Cdr(frame)));
            }
        } else if let Some(slot) = search_list(heap, sym, formals, actuals)? {
            return Ok(Some(slot));
        }

        frames = rest;
    }
}

fn search_list(heap: &Heap, sym: Value, formals: Value, actuals: Value) -> Result<Option<Slot>> {
    let mut f = formals;
    let mut a = actuals;
    loop {
        let (f_head, f_rest) = match heap.get(f) {
            None => return Ok(None),
            Some(CellData::Pair { car, cdr }) => (*car, *cdr),
            Some(_) => return Err(EvalError::DamagedFrame.into()),
        };
        if f_head == sym {
            return match heap.get(a) {
                Some(CellData::Pair { .. }) => Ok(Some(Slot::Car(a))),
                _ => Err(EvalError::TooFewArguments.into()),
            };
        }
        a = match heap.get(a) {
            Some(CellData::Pair { cdr, .. }) => *cdr,
            _ => return Err(EvalError::TooFewArguments.into()),
        };
        f = f_rest;
    }
}

/// Looks up `sym` in `env`, falling back to its global cell. Fails if the
/// symbol has no lexical binding and its global cell still holds the
/// unbound-marker.
pub fn lookup(heap: &Heap, sym: Value, env: Value, unbound_marker: Value) -> Result<Value> {
    if let Some(slot) = find(heap, sym, env)? {
        return read_slot(heap, &slot);
    }
    let global = match heap.get(sym) {
        Some(CellData::Symbol { global, .. }) => *global,
        _ => return Err(EvalError::BadFunction.into()),
    };
    if global == unbound_marker {
        return Err(EvalError::UnboundVariable.into());
    }
    Ok(global)
}

/// Sets `sym` to `value`: mutates the innermost lexical binding if one
/// exists, otherwise writes `value` into the symbol's global cell. Returns
/// `value`.
pub fn set(heap: &mut Heap, sym: Value, value: Value, env: Value) -> Result<Value> {
    match find(heap, sym, env)? {
        Some(slot) => write_slot(heap, &slot, value)?,
        None => match heap.get_mut(sym) {
            Some(CellData::Symbol { global, .. }) => *global = value,
            _ => return Err(EvalError::BadArgumentSyntax.into()),
        },
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::Roots;

    fn heap_with_roots(capacity: usize) -> Heap {
        let mut heap = Heap::new(capacity);
        heap.roots = Some(Roots {
            oblist: Value::Nil,
            truth: Value::Nil,
            unbound_marker: Value::Nil,
            eof_val: Value::Nil,
            quote_sym: Value::Nil,
            do_sym: Value::Nil,
            fn_sym: Value::Nil,
            errobj_sym: Value::Nil,
        });
        heap
    }

    fn list(heap: &mut Heap, items: &[Value]) -> Value {
        let mut tail = Value::Nil;
        for &item in items.iter().rev() {
            tail = heap.alloc(CellData::Pair { car: item, cdr: tail }).unwrap();
        }
        tail
    }

    #[test]
    fn finds_a_positional_binding_and_set_mutates_it_in_place() {
        let mut heap = heap_with_roots(64);
        let x = heap.intern("x").unwrap();
        let y = heap.intern("y").unwrap();
        let one = heap.alloc(CellData::Number(1)).unwrap();
        let two = heap.alloc(CellData::Number(2)).unwrap();
        let formals = list(&mut heap, &[x, y]);
        let actuals = list(&mut heap, &[one, two]);
        let frame = heap.alloc(CellData::Pair { car: formals, cdr: actuals }).unwrap();
        let env = heap.alloc(CellData::Pair { car: frame, cdr: Value::Nil }).unwrap();

        let found = lookup(&heap, y, env, Value::Nil).unwrap();
        assert_eq!(heap.get(found), Some(&CellData::Number(2)));

        let three = heap.alloc(CellData::Number(3)).unwrap();
        set(&mut heap, y, three, env).unwrap();
        let found = lookup(&heap, y, env, Value::Nil).unwrap();
        assert_eq!(heap.get(found), Some(&CellData::Number(3)));
    }

    #[test]
    fn bare_symbol_formal_captures_the_whole_actuals_list() {
        let mut heap = heap_with_roots(64);
        let rest = heap.intern("rest").unwrap();
        let one = heap.alloc(CellData::Number(1)).unwrap();
        let two = heap.alloc(CellData::Number(2)).unwrap();
        let actuals = list(&mut heap, &[one, two]);
        let frame = heap.alloc(CellData::Pair { car: rest, cdr: actuals }).unwrap();
        let env = heap.alloc(CellData::Pair { car: frame, cdr: Value::Nil }).unwrap();

        let bound = lookup(&heap, rest, env, Value::Nil).unwrap();
        assert_eq!(bound, actuals);
    }

    #[test]
    fn falls_back_to_the_global_cell_when_not_lexically_bound() {
        let mut heap = heap_with_roots(64);
        let g = heap.intern("g").unwrap();
        let value = heap.alloc(CellData::Number(42)).unwrap();
        set(&mut heap, g, value, Value::Nil).unwrap();
        let found = lookup(&heap, g, Value::Nil, Value::Nil).unwrap();
        assert_eq!(found, value);
    }

    #[test]
    fn inner_frame_shadows_an_outer_binding_of_the_same_symbol() {
        let mut heap = heap_with_roots(64);
        let x = heap.intern("x").unwrap();
        let outer_val = heap.alloc(CellData::Number(1)).unwrap();
        let inner_val = heap.alloc(CellData::Number(2)).unwrap();
        let outer_formals = list(&mut heap, &[x]);
        let outer_actuals = list(&mut heap, &[outer_val]);
        let outer_frame = heap.alloc(CellData::Pair { car: outer_formals, cdr: outer_actuals }).unwrap();
        let outer_env = heap.alloc(CellData::Pair { car: outer_frame, cdr: Value::Nil }).unwrap();

        let inner_formals = list(&mut heap, &[x]);
        let inner_actuals = list(&mut heap, &[inner_val]);
        let inner_frame = heap.alloc(CellData::Pair { car: inner_formals, cdr: inner_actuals }).unwrap();
        let inner_env = heap.alloc(CellData::Pair { car: inner_frame, cdr: outer_env }).unwrap();

        let found = lookup(&heap, x, inner_env, Value::Nil).unwrap();
        assert_eq!(heap.get(found), Some(&CellData::Number(2)));
    }

    #[test]
    fn too_few_actuals_for_the_formals_is_an_eval_error() {
        let mut heap = heap_with_roots(64);
        let x = heap.intern("x").unwrap();
        let y = heap.intern("y").unwrap();
        let one = heap.alloc(CellData::Number(1)).unwrap();
        let formals = list(&mut heap, &[x, y]);
        let actuals = list(&mut heap, &[one]);
        let frame = heap.alloc(CellData::Pair { car: formals, cdr: actuals }).unwrap();
        let env = heap.alloc(CellData::Pair { car: frame, cdr: Value::Nil }).unwrap();

        let err = lookup(&heap, y, env, Value::Nil).unwrap_err();
        assert!(matches!(err, crate::error::Error::Eval(EvalError::TooFewArguments)));
    }
}
