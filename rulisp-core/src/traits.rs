//! Host collaborator traits. `rulisp-core` knows nothing about line editors,
//! terminals, or random number generators beyond these three shapes —
//! `rulisp-cli` is the only crate that implements them.

use std::io;

/// Supplies the next line of input, one line per call.
pub trait LineSource {
    /// Returns the next line (without its trailing newline), or `Ok(None)`
    /// at end-of-input.
    fn read_line(&mut self) -> io::Result<Option<String>>;
}

/// Supplies uniformly distributed integers for the `random` primitive.
pub trait RandomSource {
    /// Returns a uniform integer in `[0, n)`. `n` is always positive.
    fn bounded(&mut self, n: i64) -> i64;
}
