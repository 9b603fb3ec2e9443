//! The execution context: everything one interpreter instance owns.
//!
//! A [`Context`] bundles the memory pool, the scope arena, the function
//! and struct tables, the call stack, and the two I/O streams the
//! script-visible builtins talk to. Nothing lives in module-level
//! state; drop the context and the whole interpreter is gone.

use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::rc::Rc;

use crate::ast::{FunctionDef, Program};
use crate::errors::Result;
use crate::memory::Pool;
use crate::parser;
use crate::scope::{ScopeId, Scopes};
use crate::value::{self, Value};

mod builtins;
mod exec;


use exec::Flow;

/// Tunables for one interpreter instance.
pub struct ContextOptions {
    /// Arena size in bytes.
    pub memory_size: usize,
    /// Maximum user-function call depth.
    pub max_call_depth: usize,
    /// Directory imports resolve against.
    pub module_root: PathBuf,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            memory_size: 1 << 20,
            max_call_depth: 256,
            module_root: PathBuf::from("pscript-modules"),
        }
    }
}

/// A function table entry. Bodies execute under the namespace prefix
/// the function was defined with, so module-internal calls resolve.
struct FunctionEntry {
    def: Rc<FunctionDef>,
    prefix: String,
}

/// A struct description with its member defaults already evaluated and
/// snapshotted.
struct StructDesc {
    name: String,
    members: Vec<StructMember>,
}

struct StructMember {
    name: String,
    default: Value,
}

/// One in-flight function invocation.
struct Frame {
    name: String,
    scope: ScopeId,
}

pub struct Context {
    pool: Pool,
    scopes: Scopes,
    functions: HashMap<String, FunctionEntry>,
    structs: HashMap<String, Rc<StructDesc>>,
    call_stack: Vec<Frame>,
    options: ContextOptions,
    out: Box<dyn Write>,
    input: Box<dyn BufRead>,
}

impl Context {
    /// A context bound to the process's stdio.
    pub fn new(options: ContextOptions) -> Context {
        Self::with_streams(
            options,
            Box::new(io::stdout()),
            Box::new(io::BufReader::new(io::stdin())),
        )
    }

    /// A context with caller-supplied output sink and input source.
    pub fn with_streams(
        options: ContextOptions,
        out: Box<dyn Write>,
        input: Box<dyn BufRead>,
    ) -> Context {
        Context {
            pool: Pool::new(options.memory_size),
            scopes: Scopes::new(),
            functions: HashMap::new(),
            structs: HashMap::new(),
            call_stack: Vec::new(),
            options,
            out,
            input,
        }
    }

    /// Parse and execute a script at the top level.
    pub fn run(&mut self, source: &str) -> Result<()> {
        let program = parser::parse(source)?;
        self.execute(&program)
    }

    /// Execute an already-parsed program in the global scope.
    ///
    /// Runs with an empty call stack; a top-level `return` is absorbed
    /// here rather than propagated.
    pub fn execute(&mut self, program: &Program) -> Result<()> {
        let flow = self.exec_block(&program.body, Scopes::GLOBAL, "")?;
        if let Flow::Return(value) = flow {
            value::release(&mut self.pool, &value);
        }
        Ok(())
    }

    /// Read access to the arena, e.g. for dumping.
    pub fn memory(&self) -> &Pool {
        &self.pool
    }

    /// Hex dump of the arena to `out`.
    pub fn dump_memory<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        self.pool.dump(out)
    }
}
