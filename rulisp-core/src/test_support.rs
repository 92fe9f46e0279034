//! Test-only collaborator implementations shared across this crate's unit
//! tests.

use crate::traits::RandomSource;

/// A `RandomSource` that always returns 0, for tests that need `random` to
/// be deterministic rather than exercising its distribution.
pub struct NullRandom;

impl RandomSource for NullRandom {
    fn bounded(&mut self, _n: i64) -> i64 {
        0
    }
}

/// A scripted `RandomSource` that replays a fixed sequence, looping if
/// exhausted.
pub struct ScriptedRandom {
    values: Vec<i64>,
    next: usize,
}

impl ScriptedRandom {
    pub fn new(values: Vec<i64>) -> ScriptedRandom {
        ScriptedRandom { values, next: 0 }
    }
}

impl RandomSource for ScriptedRandom {
    fn bounded(&mut self, n: i64) -> i64 {
        let v = self.values[self.next % self.values.len()] % n;
        self.next += 1;
        v
    }
}
