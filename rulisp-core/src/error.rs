//! The engine's error taxonomy.
//!
//! Every fallible engine operation returns `Result<_, Error>` instead of
//! unwinding through a native `longjmp`-style boundary. The REPL driver is
//! the only place that catches these: it logs the error, prints a
//! diagnostic, binds `errobj`, and continues to the next iteration.

use crate::value::Value;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Reader(#[from] ReaderError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    Arithmetic(#[from] ArithmeticError),
    #[error(transparent)]
    User(#[from] UserError),
}

impl Error {
    /// The value to bind to `errobj`, if this error carries one.
    pub fn errobj(&self) -> Option<Value> {
        match self {
            Error::Type(TypeError { offending, .. }) => Some(*offending),
            Error::User(UserError { errobj, .. }) => Some(*errobj),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("heap exhausted: no free cells in either semispace")]
    OutOfMemory,
}

#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("unexpected end of input inside a list")]
    EofInList,
    #[error("unexpected ')'")]
    UnexpectedCloseParen,
    #[error("unexpected end of input")]
    Eof,
}

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("unbound variable")]
    UnboundVariable,
    #[error("value is not callable")]
    BadFunction,
    #[error("argument list is not a proper list")]
    BadArgumentSyntax,
    #[error("environment frame is damaged")]
    DamagedFrame,
    #[error("too few arguments supplied for formals")]
    TooFewArguments,
    #[error("formal argument list must be a symbol or a proper list of symbols")]
    ImproperFormalList,
}

#[derive(Debug, thiserror::Error)]
#[error("{primitive}: argument {position} is not a {expected}")]
pub struct TypeError {
    pub primitive: &'static str,
    pub position: usize,
    pub expected: &'static str,
    pub offending: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum ArithmeticError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("modulus by zero")]
    ModulusByZero,
}

#[derive(Debug, thiserror::Error)]
#[error("{name}")]
pub struct UserError {
    pub name: String,
    pub errobj: Value,
}

pub type Result<T> = std::result::Result<T, Error>;
