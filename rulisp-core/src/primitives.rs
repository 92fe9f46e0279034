//! Builtin primitives and special forms, dispatched by `PrimitiveId`.
//!
//! Primitives don't carry closures; the evaluator already extracted the
//! `arity`/`id` pair from the operator's cell and calls straight into the
//! matching `dispatch*` function here.

use std::io::Write;

use crate::ctx::Ctx;
use crate::error::{ArithmeticError, EvalError, Result, TypeError, UserError};
use crate::eval::{eval, eval_args};
use crate::reader::Reader;
use crate::traits::RandomSource;
use crate::value::{ArityKind, CellData, PrimitiveId, Value};

/// One entry in the primitive registration table: the bound name, its
/// calling convention, and which native implementation it dispatches to.
pub struct PrimitiveSpec {
    pub name: &'static str,
    pub arity: ArityKind,
    pub id: PrimitiveId,
}

/// All primitives bound in the global environment at init, in the order
/// the reference interpreter registers them.
pub const PRIMITIVES: &[PrimitiveSpec] = &[
    PrimitiveSpec { name: "cons", arity: ArityKind::Prim2, id: PrimitiveId::Cons },
    PrimitiveSpec { name: "car", arity: ArityKind::Prim1, id: PrimitiveId::Car },
    PrimitiveSpec { name: "cdr", arity: ArityKind::Prim1, id: PrimitiveId::Cdr },
    PrimitiveSpec { name: "set-car!", arity: ArityKind::Prim2, id: PrimitiveId::SetCar },
    PrimitiveSpec { name: "set-cdr!", arity: ArityKind::Prim2, id: PrimitiveId::SetCdr },
    PrimitiveSpec { name: "set!", arity: ArityKind::PrimF, id: PrimitiveId::SetBang },
    PrimitiveSpec { name: "+", arity: ArityKind::Prim2, id: PrimitiveId::Add },
    PrimitiveSpec { name: "-", arity: ArityKind::Prim2, id: PrimitiveId::Sub },
    PrimitiveSpec { name: "*", arity: ArityKind::Prim2, id: PrimitiveId::Mul },
    PrimitiveSpec { name: "/", arity: ArityKind::Prim2, id: PrimitiveId::Div },
    PrimitiveSpec { name: "%", arity: ArityKind::Prim2, id: PrimitiveId::Mod },
    PrimitiveSpec { name: ">", arity: ArityKind::Prim2, id: PrimitiveId::GreaterThan },
    PrimitiveSpec { name: "<", arity: ArityKind::Prim2, id: PrimitiveId::LessThan },
    PrimitiveSpec { name: "eq?", arity: ArityKind::Prim2, id: PrimitiveId::Eq },
    PrimitiveSpec { name: "eql?", arity: ArityKind::Prim2, id: PrimitiveId::Eql },
    PrimitiveSpec { name: "read", arity: ArityKind::Prim1, id: PrimitiveId::Read },
    PrimitiveSpec { name: "print", arity: ArityKind::Prim1, id: PrimitiveId::Print },
    PrimitiveSpec { name: "eval", arity: ArityKind::PrimF, id: PrimitiveId::Eval },
    PrimitiveSpec { name: "fn", arity: ArityKind::PrimF, id: PrimitiveId::Fn },
    PrimitiveSpec { name: "if", arity: ArityKind::PrimM, id: PrimitiveId::If },
    PrimitiveSpec { name: "do", arity: ArityKind::PrimM, id: PrimitiveId::Do },
    PrimitiveSpec { name: "quote", arity: ArityKind::PrimF, id: PrimitiveId::Quote },
    PrimitiveSpec { name: "error", arity: ArityKind::Prim2, id: PrimitiveId::ErrorPrim },
    PrimitiveSpec { name: "random", arity: ArityKind::Prim1, id: PrimitiveId::Random },
    PrimitiveSpec { name: "reverse", arity: ArityKind::Prim1, id: PrimitiveId::Reverse },
];

fn type_error(primitive: &'static str, position: usize, expected: &'static str, offending: Value) -> crate::error::Error {
    TypeError { primitive, position, expected, offending }.into()
}

fn expect_number(heap: &crate::heap::Heap, v: Value, primitive: &'static str, position: usize) -> Result<i64> {
    match heap.get(v) {
        Some(CellData::Number(n)) => Ok(*n),
        _ => Err(type_error(primitive, position, "number", v)),
    }
}

fn expect_symbol_name<'h>(heap: &'h crate::heap::Heap, v: Value, primitive: &'static str, position: usize) -> Result<&'h str> {
    match heap.get(v) {
        Some(CellData::Symbol { name, .. }) => Ok(name.as_str()),
        _ => Err(type_error(primitive, position, "symbol", v)),
    }
}

fn truth_of<R: RandomSource, W: Write>(ctx: &Ctx<R, W>, b: bool) -> Value {
    if b {
        ctx.heap.roots.expect("engine not initialized").truth
    } else {
        Value::Nil
    }
}

pub fn dispatch0<R: RandomSource, W: Write>(_ctx: &mut Ctx<R, W>, _id: PrimitiveId) -> Result<Value> {
    unreachable!("no zero-arity primitive is registered")
}

pub fn dispatch1<R: RandomSource, W: Write>(ctx: &mut Ctx<R, W>, id: PrimitiveId, a: Value) -> Result<Value> {
    match id {
        PrimitiveId::Car => match ctx.heap.get(a) {
            None => Ok(Value::Nil),
            Some(CellData::Pair { car, .. }) => Ok(*car),
            Some(_) => Err(type_error("car", 1, "cell", a)),
        },
        PrimitiveId::Cdr => match ctx.heap.get(a) {
            None => Ok(Value::Nil),
            Some(CellData::Pair { cdr, .. }) => Ok(*cdr),
            Some(_) => Err(type_error("cdr", 1, "cell", a)),
        },
        PrimitiveId::Read => {
            // Always ignores its argument and parses the empty list; see
            // the reader module docs for why this isn't a bug to fix.
            let quote_sym = ctx.heap.roots.expect("engine not initialized").quote_sym;
            Reader::new("()").read(ctx.heap, quote_sym)
        }
        PrimitiveId::Print => {
            crate::print::print_value(ctx.heap, a, ctx.out).expect("failed to write to output sink");
            writeln!(ctx.out).expect("failed to write to output sink");
            Ok(Value::Nil)
        }
        PrimitiveId::Random => {
            let n = expect_number(ctx.heap, a, "random", 1)?;
            if n <= 0 {
                return Err(type_error("random", 1, "positive number", a));
            }
            let r = ctx.random.bounded(n);
            Ok(ctx.heap.alloc(CellData::Number(r))?)
        }
        PrimitiveId::Reverse => {
            let mut cursor = a;
            let mut result = Value::Nil;
            loop {
                match ctx.heap.get(cursor) {
                    None => break,
                    Some(CellData::Pair { car, cdr }) => {
                        let (head, rest) = (*car, *cdr);
                        result = ctx.heap.alloc(CellData::Pair { car: head, cdr: result })?;
                        cursor = rest;
                    }
                    Some(_) => return Err(type_error("reverse", 1, "cell", a)),
                }
            }
            Ok(result)
        }
        _ => unreachable!("{id:?} is not a one-argument primitive"),
    }
}

pub fn dispatch2<R: RandomSource, W: Write>(ctx: &mut Ctx<R, W>, id: PrimitiveId, a: Value, b: Value) -> Result<Value> {
    match id {
        PrimitiveId::Cons => Ok(ctx.heap.alloc(CellData::Pair { car: a, cdr: b })?),
        PrimitiveId::SetCar => {
            match ctx.heap.get_mut(a) {
                Some(CellData::Pair { car, .. }) => *car = b,
                _ => return Err(type_error("set-car!", 1, "cell", a)),
            }
            Ok(b)
        }
        PrimitiveId::SetCdr => {
            match ctx.heap.get_mut(a) {
                Some(CellData::Pair { cdr, .. }) => *cdr = b,
                _ => return Err(type_error("set-cdr!", 1, "cell", a)),
            }
            Ok(b)
        }
        PrimitiveId::Add => {
            let x = expect_number(ctx.heap, a, "+", 1)?;
            let y = expect_number(ctx.heap, b, "+", 2)?;
            Ok(ctx.heap.alloc(CellData::Number(x + y))?)
        }
        PrimitiveId::Sub => {
            let x = expect_number(ctx.heap, a, "-", 1)?;
            let y = expect_number(ctx.heap, b, "-", 2)?;
            Ok(ctx.heap.alloc(CellData::Number(x - y))?)
        }
        PrimitiveId::Mul => {
            let x = expect_number(ctx.heap, a, "*", 1)?;
            let y = expect_number(ctx.heap, b, "*", 2)?;
            Ok(ctx.heap.alloc(CellData::Number(x * y))?)
        }
        PrimitiveId::Div => {
            let x = expect_number(ctx.heap, a, "/", 1)?;
            let y = expect_number(ctx.heap, b, "/", 2)?;
            if y == 0 {
                return Err(ArithmeticError::DivisionByZero.into());
            }
            Ok(ctx.heap.alloc(CellData::Number(x / y))?)
        }
        PrimitiveId::Mod => {
            let x = expect_number(ctx.heap, a, "%", 1)?;
            let y = expect_number(ctx.heap, b, "%", 2)?;
            if y == 0 {
                return Err(ArithmeticError::ModulusByZero.into());
            }
            Ok(ctx.heap.alloc(CellData::Number(x % y))?)
        }
        PrimitiveId::GreaterThan => {
            let x = expect_number(ctx.heap, a, ">", 1)?;
            let y = expect_number(ctx.heap, b, ">", 2)?;
            Ok(truth_of(ctx, x > y))
        }
        PrimitiveId::LessThan => {
            let x = expect_number(ctx.heap, a, "<", 1)?;
            let y = expect_number(ctx.heap, b, "<", 2)?;
            Ok(truth_of(ctx, x < y))
        }
        PrimitiveId::Eq => Ok(truth_of(ctx, values_identical(a, b))),
        PrimitiveId::Eql => {
            let eql = match (ctx.heap.get(a), ctx.heap.get(b)) {
                (Some(CellData::Number(x)), Some(CellData::Number(y))) => x == y,
                _ => values_identical(a, b),
            };
            Ok(truth_of(ctx, eql))
        }
        PrimitiveId::ErrorPrim => {
            let name = expect_symbol_name(ctx.heap, a, "error", 1)?.to_owned();
            Err(UserError { name, errobj: b }.into())
        }
        _ => unreachable!("{id:?} is not a two-argument primitive"),
    }
}

pub fn dispatch3<R: RandomSource, W: Write>(_ctx: &mut Ctx<R, W>, id: PrimitiveId, _a: Value, _b: Value, _c: Value) -> Result<Value> {
    unreachable!("{id:?} is not a three-argument primitive")
}

pub fn dispatchl<R: RandomSource, W: Write>(_ctx: &mut Ctx<R, W>, id: PrimitiveId, _args: Value) -> Result<Value> {
    unreachable!("{id:?} is not a variadic primitive")
}

/// `prim1`/`prim2`/`prim3` compare by identity: same arena index, or both
/// Nil. Numbers get no special-casing here — that's `eql?`'s job.
fn values_identical(a: Value, b: Value) -> bool {
    a == b
}

pub fn dispatchf<R: RandomSource, W: Write>(
    ctx: &mut Ctx<R, W>,
    id: PrimitiveId,
    args: Value,
    env: Value,
) -> Result<Value> {
    match id {
        // `quote` is just l_car under the hood in the reference (qq.c:637-645):
        // applied to nil it answers nil rather than erroring.
        PrimitiveId::Quote => Ok(first_or_nil(ctx.heap, args)),
        PrimitiveId::SetBang => {
            let name = first(ctx.heap, args)?;
            if !matches!(ctx.heap.get(name), Some(CellData::Symbol { .. })) {
                return Err(type_error("set!", 1, "symbol", name));
            }
            let value_form = second(ctx.heap, args)?;
            let value = eval(ctx, value_form, env)?;
            crate::env::set(ctx.heap, name, value, env)
        }
        PrimitiveId::Eval => {
            // Same l_car-backed behavior as quote (qq.c:618-621): no argument
            // evaluates the empty list rather than raising an error.
            let form = first_or_nil(ctx.heap, args);
            eval(ctx, form, env)
        }
        PrimitiveId::Fn => make_closure(ctx, args, env),
        _ => unreachable!("{id:?} is not a primf primitive"),
    }
}

/// `if`/`do` rewrite `form`/`env` for tail re-dispatch. `Some` means
/// "continue the trampoline with this form and env"; `None` means "`form`
/// is already the final answer" (unused by `if`/`do`, but part of the
/// general calling convention — see the evaluator's `PrimM` row).
pub fn dispatchm<R: RandomSource, W: Write>(
    ctx: &mut Ctx<R, W>,
    id: PrimitiveId,
    form: Value,
    env: Value,
) -> Result<Option<(Value, Value)>> {
    match id {
        PrimitiveId::If => {
            // l_if is built out of l_car/l_cdr (qq.c:522-530): a missing test,
            // then-branch, or else-branch (a 2-arg `if`) reads as nil rather
            // than raising an error.
            let args = cdr_of(ctx.heap, form)?;
            let test = first_or_nil(ctx.heap, args);
            let test_val = eval(ctx, test, env)?;
            let branch = if test_val.is_truthy() {
                second_or_nil(ctx.heap, args)
            } else {
                third_or_nil(ctx.heap, args)
            };
            Ok(Some((branch, env)))
        }
        PrimitiveId::Do => {
            let mut forms = cdr_of(ctx.heap, form)?;
            loop {
                let (head, rest) = match ctx.heap.get(forms) {
                    Some(CellData::Pair { car, cdr }) => (*car, *cdr),
                    _ => return Err(EvalError::BadArgumentSyntax.into()),
                };
                if rest.is_nil() {
                    return Ok(Some((head, env)));
                }
                eval(ctx, head, env)?;
                forms = rest;
            }
        }
        _ => unreachable!("{id:?} is not a primm primitive"),
    }
}

fn cdr_of(heap: &crate::heap::Heap, form: Value) -> Result<Value> {
    match heap.get(form) {
        Some(CellData::Pair { cdr, .. }) => Ok(*cdr),
        _ => Err(EvalError::BadArgumentSyntax.into()),
    }
}

fn first(heap: &crate::heap::Heap, args: Value) -> Result<Value> {
    match heap.get(args) {
        Some(CellData::Pair { car, .. }) => Ok(*car),
        _ => Err(EvalError::BadArgumentSyntax.into()),
    }
}

fn second(heap: &crate::heap::Heap, args: Value) -> Result<Value> {
    let rest = cdr_of(heap, args)?;
    first(heap, rest)
}

/// `l_car`-style access: nil (or any non-pair) answers nil rather than an
/// error. Used only by the handful of special forms the reference itself
/// builds out of raw `l_car`/`l_cdr` rather than an arity check — `quote`,
/// `eval`, and `if`'s test/branches.
fn first_or_nil(heap: &crate::heap::Heap, args: Value) -> Value {
    match heap.get(args) {
        Some(CellData::Pair { car, .. }) => *car,
        _ => Value::Nil,
    }
}

fn cdr_or_nil(heap: &crate::heap::Heap, args: Value) -> Value {
    match heap.get(args) {
        Some(CellData::Pair { cdr, .. }) => *cdr,
        _ => Value::Nil,
    }
}

fn second_or_nil(heap: &crate::heap::Heap, args: Value) -> Value {
    first_or_nil(heap, cdr_or_nil(heap, args))
}

fn third_or_nil(heap: &crate::heap::Heap, args: Value) -> Value {
    second_or_nil(heap, cdr_or_nil(heap, args))
}

/// `(fn formals body...)`: single body expressions are used as-is; more
/// than one is wrapped in an implicit `do`.
fn make_closure<R: RandomSource, W: Write>(ctx: &mut Ctx<R, W>, args: Value, env: Value) -> Result<Value> {
    let formals = first(ctx.heap, args)?;
    let rest = cdr_of(ctx.heap, args)?;
    let has_one = match ctx.heap.get(rest) {
        Some(CellData::Pair { cdr, .. }) => cdr.is_nil(),
        _ => return Err(EvalError::BadArgumentSyntax.into()),
    };

    if !matches!(ctx.heap.get(formals), Some(CellData::Symbol { .. })) {
        let mut cursor = formals;
        loop {
            match ctx.heap.get(cursor) {
                None => break,
                Some(CellData::Pair { cdr, .. }) => cursor = *cdr,
                Some(_) => return Err(EvalError::ImproperFormalList.into()),
            }
        }
    }

    let body = if has_one {
        first(ctx.heap, rest)?
    } else {
        let do_sym = ctx.heap.roots.expect("engine not initialized").do_sym;
        ctx.heap.alloc(CellData::Pair { car: do_sym, cdr: rest })?
    };

    let code = ctx.heap.alloc(CellData::Pair { car: formals, cdr: body })?;
    Ok(ctx.heap.alloc(CellData::Function { code, env })?)
}

/// Evaluates every subform of `args` into a fresh list, left to right; used
/// by `priml`-arity primitives (none of which are currently registered, but
/// kept for parity with the evaluator's dispatch table).
#[allow(dead_code)]
fn eval_all<R: RandomSource, W: Write>(ctx: &mut Ctx<R, W>, args: Value, env: Value) -> Result<Value> {
    eval_args(ctx, args, env)
}
