//! pscript: a small embedded scripting language.
//!
//! The crate is built from two halves: a buddy-allocated [`memory`]
//! pool that backs every aggregate script value, and a tree-walking
//! interpreter ([`context`]) that evaluates the [`parser`]'s AST
//! against a chain of lexical [`scope`]s.
//!
//! ```no_run
//! use pscript_core::{Context, ContextOptions};
//!
//! let mut ctx = Context::new(ContextOptions::default());
//! ctx.run("let x = 1; x += 2; __print(x);").unwrap();
//! ```

pub mod ast;
pub mod context;
pub mod errors;
pub mod memory;
pub mod parser;
pub mod scope;
pub mod value;

pub use context::{Context, ContextOptions};
pub use errors::Error;
