//! Rendering values back to their printed form.

use std::io::{self, Write};

use crate::heap::Heap;
use crate::value::{CellData, Value};

/// Writes `v`'s printed representation to `out`, with no trailing newline.
/// `print` and the REPL driver both call this; only `print` appends one.
pub fn print_value(heap: &Heap, v: Value, out: &mut impl Write) -> io::Result<()> {
    match heap.get(v) {
        None => write!(out, "()"),
        Some(CellData::Number(n)) => write!(out, "{n}"),
        Some(CellData::Symbol { name, .. }) => write!(out, "{name}"),
        Some(CellData::Primitive { name, arity, .. }) => {
            write!(out, "#<prim {} {name}>", arity_kind_number(*arity))
        }
        Some(CellData::Function { code, .. }) => {
            let (formals, body) = match heap.get(*code) {
                Some(CellData::Pair { car, cdr }) => (*car, *cdr),
                _ => (Value::Nil, Value::Nil),
            };
            write!(out, "#<fn ")?;
            print_value(heap, formals, out)?;
            write!(out, " ")?;
            print_value(heap, body, out)?;
            write!(out, ">")
        }
        Some(CellData::Pair { .. }) => print_list(heap, v, out),
    }
}

fn print_list(heap: &Heap, v: Value, out: &mut impl Write) -> io::Result<()> {
    write!(out, "(")?;
    let mut cursor = v;
    let mut first = true;
    loop {
        match heap.get(cursor) {
            Some(CellData::Pair { car, cdr }) => {
                if !first {
                    write!(out, " ")?;
                }
                first = false;
                print_value(heap, *car, out)?;
                cursor = *cdr;
            }
            None => break,
            Some(_) => {
                write!(out, " . ")?;
                print_value(heap, cursor, out)?;
                break;
            }
        }
    }
    write!(out, ")")
}

/// The numeric arity-kind tag used in a primitive's printed form, matching
/// the reference interpreter's raw type-tag numbering.
fn arity_kind_number(arity: crate::value::ArityKind) -> u8 {
    use crate::value::ArityKind::*;
    match arity {
        Prim0 => 0,
        Prim1 => 1,
        Prim2 => 2,
        Prim3 => 3,
        PrimL => 4,
        PrimF => 5,
        PrimM => 6,
    }
}
