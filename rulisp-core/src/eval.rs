//! Recursive-descent evaluation with a single trampoline loop, so tail
//! calls (function application, `if`, `do`) re-dispatch without growing the
//! Rust call stack.

use std::io::Write;

use crate::ctx::Ctx;
use crate::env;
use crate::error::{EvalError, Result};
use crate::primitives;
use crate::traits::RandomSource;
use crate::value::{ArityKind, CellData, Value};

/// Evaluates `form` in `env`, following the dispatch table: self-evaluating
/// atoms return unchanged, symbols resolve through the environment (falling
/// back to the global cell), and pairs dispatch on the operator's variant.
pub fn eval<R: RandomSource, W: Write>(
    ctx: &mut Ctx<R, W>,
    mut form: Value,
    mut env: Value,
) -> Result<Value> {
    loop {
        let data = match ctx.heap.get(form) {
            None => return Ok(Value::Nil),
            Some(data) => data.clone(),
        };

        match data {
            CellData::Number(_) | CellData::Function { .. } | CellData::Primitive { .. } => {
                return Ok(form);
            }
            CellData::Symbol { .. } => {
                let unbound = ctx.heap.roots.expect("engine not initialized").unbound_marker;
                return env::lookup(ctx.heap, form, env, unbound);
            }
            CellData::Pair { car, cdr } => {
                let op = eval(ctx, car, env)?;
                let op_data = ctx.heap.get(op).cloned();
                match op_data {
                    None => return Err(EvalError::BadFunction.into()),
                    Some(CellData::Primitive { arity, id, .. }) => {
                        match arity {
                            ArityKind::Prim0 => return primitives::dispatch0(ctx, id),
                            ArityKind::Prim1 => {
                                let a = eval_nth(ctx, cdr, env, 0)?;
                                return primitives::dispatch1(ctx, id, a);
                            }
                            ArityKind::Prim2 => {
                                let a = eval_nth(ctx, cdr, env, 0)?;
                                let b = eval_nth(ctx, cdr, env, 1)?;
                                return primitives::dispatch2(ctx, id, a, b);
                            }
                            ArityKind::Prim3 => {
                                let a = eval_nth(ctx, cdr, env, 0)?;
                                let b = eval_nth(ctx, cdr, env, 1)?;
                                let c = eval_nth(ctx, cdr, env, 2)?;
                                return primitives::dispatch3(ctx, id, a, b, c);
                            }
                            ArityKind::PrimL => {
                                let args = eval_args(ctx, cdr, env)?;
                                return primitives::dispatchl(ctx, id, args);
                            }
                            ArityKind::PrimF => {
                                return primitives::dispatchf(ctx, id, cdr, env);
                            }
                            ArityKind::PrimM => {
                                match primitives::dispatchm(ctx, id, form, env)? {
                                    Some((new_form, new_env)) => {
                                        form = new_form;
                                        env = new_env;
                                        continue;
                                    }
                                    None => return Ok(form),
                                }
                            }
                        }
                    }
                    Some(CellData::Function { code, env: captured }) => {
                        let actuals = eval_args(ctx, cdr, env)?;
                        let (formals, body) = match ctx.heap.get(code) {
                            Some(CellData::Pair { car, cdr }) => (*car, *cdr),
                            _ => return Err(EvalError::BadFunction.into()),
                        };
                        let frame = ctx.heap.alloc(CellData::Pair {
                            car: formals,
                            cdr: actuals,
                        })?;
                        let new_env = ctx.heap.alloc(CellData::Pair {
                            car: frame,
                            cdr: captured,
                        })?;
                        env = new_env;
                        form = body;
                        continue;
                    }
                    Some(CellData::Symbol { .. }) => {
                        // Textual macro: rewrite `(r ...)` to `(r (quote (r
                        // ...)))` and re-dispatch in the global environment,
                        // matching the reference's `(r (quote form))` rule.
                        let quote_sym = ctx.heap.roots.expect("engine not initialized").quote_sym;
                        let quoted_args = ctx.heap.alloc(CellData::Pair {
                            car: form,
                            cdr: Value::Nil,
                        })?;
                        let quote_form = ctx.heap.alloc(CellData::Pair {
                            car: quote_sym,
                            cdr: quoted_args,
                        })?;
                        let arg_list = ctx.heap.alloc(CellData::Pair {
                            car: quote_form,
                            cdr: Value::Nil,
                        })?;
                        form = ctx.heap.alloc(CellData::Pair {
                            car: op,
                            cdr: arg_list,
                        })?;
                        env = Value::Nil;
                        continue;
                    }
                    Some(_) => return Err(EvalError::BadFunction.into()),
                }
            }
        }
    }
}

/// Evaluates the `n`th subform of an unevaluated argument list `args`
/// (0-indexed) in `env`.
fn eval_nth<R: RandomSource, W: Write>(
    ctx: &mut Ctx<R, W>,
    args: Value,
    env: Value,
    n: usize,
) -> Result<Value> {
    let form = nth(ctx.heap, args, n)?;
    eval(ctx, form, env)
}

fn nth(heap: &crate::heap::Heap, mut args: Value, mut n: usize) -> Result<Value> {
    loop {
        let (head, rest) = match heap.get(args) {
            Some(CellData::Pair { car, cdr }) => (*car, *cdr),
            _ => return Err(EvalError::BadArgumentSyntax.into()),
        };
        if n == 0 {
            return Ok(head);
        }
        n -= 1;
        args = rest;
    }
}

/// Evaluates every subform of an unevaluated argument list into a fresh
/// proper list, left to right.
pub fn eval_args<R: RandomSource, W: Write>(
    ctx: &mut Ctx<R, W>,
    args: Value,
    env: Value,
) -> Result<Value> {
    if args.is_nil() {
        return Ok(Value::Nil);
    }
    let (head, rest) = match ctx.heap.get(args) {
        Some(CellData::Pair { car, cdr }) => (*car, *cdr),
        _ => return Err(EvalError::BadArgumentSyntax.into()),
    };
    let value = eval(ctx, head, env)?;
    let tail = eval_args(ctx, rest, env)?;
    Ok(ctx.heap.alloc(CellData::Pair {
        car: value,
        cdr: tail,
    })?)
}
