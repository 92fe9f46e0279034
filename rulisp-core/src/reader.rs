//! Tokenizer and s-expression parser. `read_str` consumes as much of its
//! input string as it needs and reports how much it consumed, so the REPL
//! driver can keep asking for more lines when a list is left open.

use tracing::debug;

use crate::error::{ReaderError, Result};
use crate::heap::Heap;
use crate::value::{CellData, Value};

/// Tokens longer than this are truncated rather than rejected, matching the
/// reference reader's fixed-size token buffer.
const MAX_TOKEN_LEN: usize = 256;

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '\'' | '"')
}

/// A cursor over one logical read buffer, which may be extended with
/// further lines mid-parse (see `Reader::extend`).
pub struct Reader<'a> {
    buf: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a str) -> Reader<'a> {
        Reader { buf, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.buf[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let skipped: usize = self
            .rest()
            .chars()
            .take_while(|c| c.is_whitespace())
            .map(|c| c.len_utf8())
            .sum();
        self.pos += skipped;
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Reads one expression. `Err(ReaderError::EofInList)` and
    /// `Err(ReaderError::Eof)` both mean "need more input"; every other
    /// error is fatal.
    pub fn read(&mut self, heap: &mut Heap, quote_sym: Value) -> Result<Value> {
        self.read_expr(heap, quote_sym, false)
    }

    fn read_expr(&mut self, heap: &mut Heap, quote_sym: Value, in_list: bool) -> Result<Value> {
        self.skip_whitespace();
        match self.peek() {
            None => {
                return Err(if in_list {
                    ReaderError::EofInList.into()
                } else {
                    ReaderError::Eof.into()
                })
            }
            Some('(') => {
                self.bump();
                self.read_list(heap, quote_sym)
            }
            Some(')') => Err(ReaderError::UnexpectedCloseParen.into()),
            Some('\'') => {
                self.bump();
                let quoted = self.read_expr(heap, quote_sym, in_list)?;
                let inner = heap.alloc(CellData::Pair {
                    car: quoted,
                    cdr: Value::Nil,
                })?;
                Ok(heap.alloc(CellData::Pair {
                    car: quote_sym,
                    cdr: inner,
                })?)
            }
            Some(_) => self.read_atom(heap),
        }
    }

    fn read_list(&mut self, heap: &mut Heap, quote_sym: Value) -> Result<Value> {
        self.skip_whitespace();
        if self.peek() == Some(')') {
            self.bump();
            return Ok(Value::Nil);
        }
        if self.peek().is_none() {
            return Err(ReaderError::EofInList.into());
        }
        let head = self.read_expr(heap, quote_sym, true)?;
        let tail = self.read_list(heap, quote_sym)?;
        Ok(heap.alloc(CellData::Pair {
            car: head,
            cdr: tail,
        })?)
    }

    /// Stops consuming input the instant the token buffer fills, matching the
    /// reference's `j < TOKENMAXSIZE` loop condition (qq.c:358): the cursor
    /// halts at byte 256 rather than swallowing the rest of an oversized run,
    /// so whatever follows is left for the next `read` call to tokenize on
    /// its own terms.
    fn read_token(&mut self) -> String {
        let mut token = String::new();
        while token.len() < MAX_TOKEN_LEN {
            match self.peek() {
                Some(c) if !is_delimiter(c) => {
                    self.bump();
                    token.push(c);
                }
                _ => break,
            }
        }
        token
    }

    fn read_atom(&mut self, heap: &mut Heap) -> Result<Value> {
        let token = self.read_token();
        if token.len() >= MAX_TOKEN_LEN && matches!(self.peek(), Some(c) if !is_delimiter(c)) {
            debug!(len = token.len(), "token buffer filled, leaving remainder for the next read");
        }

        if let Some(n) = parse_number(&token) {
            return Ok(heap.alloc(CellData::Number(n))?);
        }
        Ok(heap.intern(&token)?)
    }
}

/// Parses `token` as the distilled spec's integer literal grammar: decimal
/// digits with an optional sign, optional fractional part, and optional
/// exponent, all truncated to an integer by parsing as `f64` first. This is
/// a deliberate language property (matching the reference's float-then-cast
/// `read_token`), not a numeric-tower shortcut to be "fixed" later.
fn parse_number(token: &str) -> Option<i64> {
    if token.is_empty() {
        return None;
    }
    let mut chars = token.chars();
    let first = chars.next().unwrap();
    let looks_numeric = first.is_ascii_digit()
        || ((first == '+' || first == '-' || first == '.') && token.len() > 1);
    if !looks_numeric {
        return None;
    }
    token.parse::<f64>().ok().map(|f| f as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::test_support::NullRandom;

    type TestEngine = Engine<NullRandom, Vec<u8>>;

    fn new_engine() -> TestEngine {
        Engine::new(64, NullRandom, Vec::new()).unwrap()
    }

    fn read_one(engine: &mut TestEngine, src: &str) -> Value {
        let quote_sym = engine.heap.roots.unwrap().quote_sym;
        Reader::new(src).read(&mut engine.heap, quote_sym).unwrap()
    }

    #[test]
    fn parses_integers() {
        let mut engine = new_engine();
        let v = read_one(&mut engine, "42");
        assert_eq!(engine.heap.get(v), Some(&CellData::Number(42)));
    }

    #[test]
    fn truncates_decimal_and_exponent_parts() {
        let mut engine = new_engine();
        let v = read_one(&mut engine, "3.9");
        assert_eq!(engine.heap.get(v), Some(&CellData::Number(3)));
    }

    #[test]
    fn quote_sugar_expands() {
        let mut engine = new_engine();
        let v = read_one(&mut engine, "'x");
        match engine.heap.get(v) {
            Some(CellData::Pair { car, .. }) => {
                assert_eq!(*car, engine.heap.roots.unwrap().quote_sym);
            }
            other => panic!("expected a pair, got {other:?}"),
        }
    }

    #[test]
    fn oversized_token_leaves_its_remainder_for_the_next_read() {
        let mut engine = new_engine();
        let long = "a".repeat(300);
        let quote_sym = engine.heap.roots.unwrap().quote_sym;
        let mut reader = Reader::new(&long);
        let first = reader.read(&mut engine.heap, quote_sym).unwrap();
        let second = reader.read(&mut engine.heap, quote_sym).unwrap();
        match (engine.heap.get(first), engine.heap.get(second)) {
            (Some(CellData::Symbol { name: n1, .. }), Some(CellData::Symbol { name: n2, .. })) => {
                assert_eq!(n1.len(), MAX_TOKEN_LEN);
                assert_eq!(n2.len(), 300 - MAX_TOKEN_LEN);
            }
            other => panic!("expected two symbols, got {other:?}"),
        }
    }

    #[test]
    fn unclosed_list_reports_eof_in_list() {
        let mut engine = new_engine();
        let quote_sym = engine.heap.roots.unwrap().quote_sym;
        let err = Reader::new("(1 2")
            .read(&mut engine.heap, quote_sym)
            .unwrap_err();
        assert!(matches!(err, crate::error::Error::Reader(ReaderError::EofInList)));
    }
}
