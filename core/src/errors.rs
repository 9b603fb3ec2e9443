//! Runtime error taxonomy.
//!
//! Every fallible operation in the crate returns [`Result`] with this
//! error type; nothing is caught or retried below the embedder's entry
//! point. The single silent case in the whole interpreter is freeing an
//! unknown pointer, which the pool absorbs (see `memory`).

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("parse error at line {line}, column {col}: {message}"))]
    Parse {
        message: String,
        line: usize,
        col: usize,
    },

    #[snafu(display("variable '{name}' is not declared in the current scope"))]
    UndefinedVariable { name: String },

    #[snafu(display("function '{name}' is not defined"))]
    UndefinedFunction { name: String },

    #[snafu(display("struct '{name}' is not defined"))]
    UndefinedStruct { name: String },

    #[snafu(display("extern function '{name}' has no bound implementation"))]
    ExternNotBound { name: String },

    #[snafu(display("operator '{op}' is not supported between {lhs} and {rhs}"))]
    TypeMismatch {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },

    #[snafu(display("unary '{op}' is not supported on {operand}"))]
    InvalidUnary {
        op: &'static str,
        operand: &'static str,
    },

    #[snafu(display("division by zero"))]
    DivisionByZero,

    #[snafu(display("condition must evaluate to a bool, found {found}"))]
    Condition { found: &'static str },

    #[snafu(display("left side of '{op}' is not assignable"))]
    InvalidPlace { op: &'static str },

    #[snafu(display("cannot parse '{text}' as a number"))]
    ParseNumber { text: String },

    #[snafu(display("expected a list, found {found}"))]
    ExpectedList { found: &'static str },

    #[snafu(display("list index must be an int, found {found}"))]
    IndexType { found: &'static str },

    #[snafu(display("'{name}' expects {expected} arguments, got {got}"))]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[snafu(display("list index {index} out of range for length {len}"))]
    IndexOutOfBounds { index: i64, len: usize },

    #[snafu(display("value of type {ty} has no member '{field}'"))]
    UnknownField { ty: String, field: String },

    #[snafu(display("I/O error on {target}"))]
    Io {
        target: String,
        source: std::io::Error,
    },

    #[snafu(display("memory pool exhausted allocating {requested} bytes"))]
    OutOfMemory { requested: usize },

    #[snafu(display("pointer {ptr}+{len} is outside the arena of {size} bytes"))]
    OutOfRange { ptr: u32, len: usize, size: usize },

    #[snafu(display("call depth exceeded the limit of {max_depth}"))]
    RecursionLimit { max_depth: usize },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
