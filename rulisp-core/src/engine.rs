//! The `Engine`: heap, oblist, and the REPL driver that ties reading,
//! evaluation, and printing together. Consolidates what the reference
//! interpreter kept as process-wide statics into one object, so tests can
//! build a fresh one per scenario instead of sharing global state.

use std::io::{self, Write};

use tracing::warn;

use crate::ctx::Ctx;
use crate::error::{Error, ReaderError, Result};
use crate::eval::eval;
use crate::heap::{Heap, Roots};
use crate::primitives::PRIMITIVES;
use crate::print::print_value;
use crate::reader::Reader;
use crate::traits::{LineSource, RandomSource};
use crate::value::{CellData, Value};

const PROMPT: &str = "> ";

pub struct Engine<R, W> {
    pub heap: Heap,
    random: R,
    out: W,
}

impl<R: RandomSource, W: Write> Engine<R, W> {
    /// Builds a fresh engine with `capacity` cells per semispace, the
    /// reserved sentinels allocated, and every primitive bound globally.
    pub fn new(capacity: usize, random: R, out: W) -> Result<Engine<R, W>> {
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

        let unbound_name_sym = heap.intern("**unbound-marker**")?;
        let unbound_marker = heap.alloc(CellData::Pair {
            car: unbound_name_sym,
            cdr: Value::Nil,
        })?;
        heap.roots.as_mut().unwrap().unbound_marker = unbound_marker;
        // Fix up the bootstrap symbol's own global cell now that a real
        // unbound-marker exists (the reference interpreter has the same
        // bootstrap ordering problem: the very first interned symbol is
        // created before its sentinel is ready).
        if let Some(CellData::Symbol { global, .. }) = heap.get_mut(unbound_name_sym) {
            *global = unbound_marker;
        }

        let eof_name = heap.intern("eof")?;
        let eof_val = heap.alloc(CellData::Pair {
            car: eof_name,
            cdr: Value::Nil,
        })?;
        let truth = heap.intern("t")?;
        let errobj_sym = heap.intern("errobj")?;
        let do_sym = heap.intern("do")?;
        let fn_sym = heap.intern("fn")?;
        let quote_sym = heap.intern("quote")?;

        {
            let roots = heap.roots.as_mut().unwrap();
            roots.eof_val = eof_val;
            roots.truth = truth;
            roots.errobj_sym = errobj_sym;
            roots.do_sym = do_sym;
            roots.fn_sym = fn_sym;
            roots.quote_sym = quote_sym;
        }

        for spec in PRIMITIVES {
            let sym = heap.intern(spec.name)?;
            let prim = heap.alloc(CellData::Primitive {
                name: spec.name,
                arity: spec.arity,
                id: spec.id,
            })?;
            match heap.get_mut(sym) {
                Some(CellData::Symbol { global, .. }) => *global = prim,
                _ => unreachable!("intern always returns a symbol"),
            }
        }

        Ok(Engine { heap, random, out })
    }

    fn ctx(&mut self) -> Ctx<'_, R, W> {
        Ctx {
            heap: &mut self.heap,
            random: &mut self.random,
            out: &mut self.out,
        }
    }

    /// Evaluates `form` in the empty (global-only) top-level environment.
    pub fn eval_top_level(&mut self, form: Value) -> Result<Value> {
        eval(&mut self.ctx(), form, Value::Nil)
    }

    fn quote_sym(&self) -> Value {
        self.heap.roots.expect("engine not initialized").quote_sym
    }

    fn errobj_sym(&self) -> Value {
        self.heap.roots.expect("engine not initialized").errobj_sym
    }

    fn report_error(&mut self, err: &Error) -> io::Result<()> {
        warn!(error = %err, "engine error");
        writeln!(self.out, "error: {err}")?;
        if let Some(offending) = err.errobj() {
            let errobj_sym = self.errobj_sym();
            let _ = crate::env::set(&mut self.heap, errobj_sym, offending, Value::Nil);
        }
        Ok(())
    }

    /// Reads one top-level form, prompting `lines` for further lines when
    /// the form so far is incomplete. Returns `Ok(None)` at clean
    /// end-of-input.
    fn read_form<L: LineSource>(&mut self, lines: &mut L) -> io::Result<Result<Option<Value>>> {
        let mut buffer = String::new();
        loop {
            match lines.read_line()? {
                None => return Ok(Ok(None)),
                Some(line) => {
                    if !buffer.is_empty() {
                        buffer.push('\n');
                    }
                    buffer.push_str(&line);
                }
            }

            let quote_sym = self.quote_sym();
            let mut reader = Reader::new(&buffer);
            match reader.read(&mut self.heap, quote_sym) {
                Ok(v) => return Ok(Ok(Some(v))),
                Err(Error::Reader(ReaderError::EofInList)) | Err(Error::Reader(ReaderError::Eof)) => {
                    write!(self.out, "{PROMPT}")?;
                    self.out.flush()?;
                    continue;
                }
                Err(e) => return Ok(Err(e)),
            }
        }
    }

    /// Drives the read-eval-print loop until `lines` is exhausted. Returns
    /// the process exit code: 0 on clean end-of-input.
    pub fn run<L: LineSource>(&mut self, lines: &mut L) -> io::Result<i32> {
        loop {
            self.heap.collect();
            write!(self.out, "{PROMPT}")?;
            self.out.flush()?;

            let form = match self.read_form(lines)? {
                Ok(None) => return Ok(0),
                Ok(Some(form)) => form,
                Err(e) => {
                    self.report_error(&e)?;
                    continue;
                }
            };

            print_value(&self.heap, form, &mut self.out)?;
            writeln!(self.out)?;

            match self.eval_top_level(form) {
                Ok(result) => {
                    print_value(&self.heap, result, &mut self.out)?;
                    writeln!(self.out)?;
                }
                Err(e) => {
                    self.report_error(&e)?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;
    use crate::test_support::NullRandom;

    type TestEngine = Engine<NullRandom, Vec<u8>>;

    fn new_engine() -> TestEngine {
        Engine::new(4096, NullRandom, Vec::new()).unwrap()
    }

    fn eval_str<R: RandomSource, W: Write>(engine: &mut Engine<R, W>, src: &str) -> Value {
        read_and_eval(engine, src).unwrap()
    }

    fn read_and_eval<R: RandomSource, W: Write>(
        engine: &mut Engine<R, W>,
        src: &str,
    ) -> Result<Value> {
        let quote_sym = engine.quote_sym();
        let form = Reader::new(src).read(&mut engine.heap, quote_sym)?;
        engine.eval_top_level(form)
    }

    fn as_number<R, W>(engine: &Engine<R, W>, v: Value) -> i64 {
        match engine.heap.get(v) {
            Some(CellData::Number(n)) => *n,
            other => panic!("expected a number, got {other:?}"),
        }
    }

    fn printed<R, W>(engine: &Engine<R, W>, v: Value) -> String {
        let mut out = Vec::new();
        print_value(&engine.heap, v, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn arithmetic_builds_a_fresh_number_cell() {
        let mut e = new_engine();
        let v = eval_str(&mut e, "(+ 1 2)");
        assert_eq!(as_number(&e, v), 3);
    }

    #[test]
    fn cons_car_cdr_round_trip() {
        let mut e = new_engine();
        let car = eval_str(&mut e, "(car (cons 1 (cons 2 ())))");
        assert_eq!(as_number(&e, car), 1);
        let cdr = eval_str(&mut e, "(cdr (cons 1 (cons 2 ())))");
        assert_eq!(printed(&e, cdr), "(2)");
    }

    #[test]
    fn closure_application_binds_formals_positionally() {
        let mut e = new_engine();
        let v = eval_str(&mut e, "((fn (x y) (+ x (* y y))) 3 4)");
        assert_eq!(as_number(&e, v), 19);
    }

    #[test]
    fn do_sequences_effects_and_returns_the_last_value() {
        let mut e = new_engine();
        let v = eval_str(&mut e, "(do (set! x 10) (set! x (+ x 1)) x)");
        assert_eq!(as_number(&e, v), 11);
    }

    #[test]
    fn if_picks_the_matching_branch_without_evaluating_the_other() {
        let mut e = new_engine();
        let yes = eval_str(&mut e, "(if (eq? 1 1) (quote yes) (quote no))");
        assert_eq!(printed(&e, yes), "yes");
        // the untaken branch is never forced: an unbound reference there
        // must not raise an error.
        let v = eval_str(&mut e, "(if () never-defined 2)");
        assert_eq!(as_number(&e, v), 2);
    }

    #[test]
    fn if_with_no_else_branch_answers_nil_on_a_false_test() {
        let mut e = new_engine();
        let v = eval_str(&mut e, "(if () (quote yes))");
        assert_eq!(v, Value::Nil);
    }

    #[test]
    fn quote_returns_its_argument_unevaluated() {
        let mut e = new_engine();
        let v = eval_str(&mut e, "(quote (+ 1 2))");
        assert_eq!(printed(&e, v), "(+ 1 2)");
    }

    #[test]
    fn quote_and_eval_with_no_argument_answer_nil() {
        let mut e = new_engine();
        let v = eval_str(&mut e, "(quote)");
        assert_eq!(v, Value::Nil);
        let v = eval_str(&mut e, "(eval)");
        assert_eq!(v, Value::Nil);
    }

    #[test]
    fn primitives_and_closures_self_evaluate() {
        let mut e = new_engine();
        let prim = eval_str(&mut e, "car");
        assert!(matches!(e.heap.get(prim), Some(CellData::Primitive { .. })));
        let f = eval_str(&mut e, "(fn (x) x)");
        assert!(matches!(e.heap.get(f), Some(CellData::Function { .. })));
    }

    #[test]
    fn tail_recursive_self_call_does_not_overflow_the_stack() {
        let mut e = new_engine();
        eval_str(
            &mut e,
            "(set! count (fn (n) (if (eq? n 0) (quote done) (count (- n 1)))))",
        );
        let v = eval_str(&mut e, "(count 100000)");
        assert_eq!(printed(&e, v), "done");
    }

    #[test]
    fn arguments_evaluate_left_to_right() {
        let mut e = new_engine();
        eval_str(&mut e, "(set! order ())");
        eval_str(
            &mut e,
            "(cons (do (set! order (cons 1 order)) 10) (do (set! order (cons 2 order)) 20))",
        );
        let order = eval_str(&mut e, "order");
        assert_eq!(printed(&e, order), "(2 1)");
    }

    #[test]
    fn local_binding_shadows_global_and_set_bang_targets_innermost() {
        let mut e = new_engine();
        eval_str(&mut e, "(set! x 1)");
        let local = eval_str(&mut e, "((fn (x) (do (set! x 99) x)) 5)");
        assert_eq!(as_number(&e, local), 99);
        let global_after = eval_str(&mut e, "x");
        assert_eq!(as_number(&e, global_after), 1);
    }

    #[test]
    fn type_error_leaves_the_engine_usable_and_binds_errobj() {
        let mut e = new_engine();
        let err = read_and_eval(&mut e, "(car 5)").unwrap_err();
        assert!(matches!(err, Error::Type(_)));
        e.report_error(&err).unwrap();
        let errobj_sym = e.errobj_sym();
        let bound = e.eval_top_level(errobj_sym).unwrap();
        assert_eq!(as_number(&e, bound), 5);

        // the engine keeps working after the error.
        let v = eval_str(&mut e, "(+ 1 1)");
        assert_eq!(as_number(&e, v), 2);
    }

    #[test]
    fn division_by_zero_is_an_arithmetic_error() {
        let mut e = new_engine();
        let err = read_and_eval(&mut e, "(/ 1 0)").unwrap_err();
        assert!(matches!(err, Error::Arithmetic(_)));
    }

    #[test]
    fn eql_compares_numbers_by_value_and_everything_else_by_identity() {
        let mut e = new_engine();
        let same_number = eval_str(&mut e, "(eql? 2 (+ 1 1))");
        assert_eq!(same_number, e.heap.roots.unwrap().truth);
        let distinct_cells = eval_str(&mut e, "(eq? (cons 1 2) (cons 1 2))");
        assert_eq!(distinct_cells, Value::Nil);
    }

    #[test]
    fn gc_preserves_top_level_bindings_under_allocation_pressure() {
        let mut e = Engine::new(256, NullRandom, Vec::new()).unwrap();
        eval_str(&mut e, "(set! x 42)");
        for _ in 0..100 {
            eval_str(&mut e, "(cons 1 2)");
            e.heap.collect();
        }
        let v = eval_str(&mut e, "x");
        assert_eq!(as_number(&e, v), 42);
    }

    #[test]
    fn unbound_variable_is_reported_as_an_eval_error() {
        let mut e = new_engine();
        let err = read_and_eval(&mut e, "never-defined").unwrap_err();
        assert!(matches!(err, Error::Eval(EvalError::UnboundVariable)));
    }

    #[test]
    fn reverse_builds_a_fresh_list_in_opposite_order() {
        let mut e = new_engine();
        let v = eval_str(&mut e, "(reverse (cons 1 (cons 2 (cons 3 ()))))");
        assert_eq!(printed(&e, v), "(3 2 1)");
    }

    #[test]
    fn error_primitive_raises_a_user_error_carrying_errobj() {
        let mut e = new_engine();
        let err = read_and_eval(&mut e, "(error (quote bad-input) 7)").unwrap_err();
        match &err {
            Error::User(inner) => assert_eq!(inner.name, "bad-input"),
            other => panic!("expected a user error, got {other:?}"),
        }
        assert_eq!(err.errobj().map(|v| as_number(&e, v)), Some(7));
    }

    #[test]
    fn random_draws_from_the_hosts_random_source_within_bounds() {
        let mut e = Engine::new(
            4096,
            crate::test_support::ScriptedRandom::new(vec![2, 5, 0]),
            Vec::new(),
        )
        .unwrap();
        let v = eval_str(&mut e, "(random 10)");
        assert_eq!(as_number(&e, v), 2);
        let v = eval_str(&mut e, "(random 10)");
        assert_eq!(as_number(&e, v), 5);
    }
}
