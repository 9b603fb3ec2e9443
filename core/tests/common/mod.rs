//! Shared harness for the end-to-end script tests: run a script with
//! captured streams and return whatever it printed.

// Each test binary uses its own subset of these helpers.
#![allow(dead_code)]

use std::cell::RefCell;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;

use pscript_core::{Context, ContextOptions, Error};

/// Output sink that stays readable after the context takes the writer.
#[derive(Clone, Default)]
pub struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl io::Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

pub fn default_options() -> ContextOptions {
    ContextOptions {
        memory_size: 1 << 16,
        ..ContextOptions::default()
    }
}

/// Run `source` with the given options and stdin contents; return the
/// captured output and the result.
pub fn run_full(source: &str, input: &str, options: ContextOptions) -> (String, Result<(), Error>) {
    let buf = SharedBuf::default();
    let mut ctx = Context::with_streams(
        options,
        Box::new(buf.clone()),
        Box::new(io::Cursor::new(input.as_bytes().to_vec())),
    );
    let result = ctx.run(source);
    (buf.contents(), result)
}

pub fn run(source: &str) -> (String, Result<(), Error>) {
    run_full(source, "", default_options())
}

/// Run `source` expecting success; return the captured output.
pub fn output(source: &str) -> String {
    let (out, result) = run(source);
    if let Err(err) = result {
        panic!("script failed: {err}\noutput so far: {out:?}");
    }
    out
}

/// Run expecting failure; return the error and the output produced
/// before it.
pub fn failure(source: &str) -> (String, Error) {
    let (out, result) = run(source);
    match result {
        Ok(()) => panic!("script unexpectedly succeeded, output: {out:?}"),
        Err(err) => (out, err),
    }
}

/// A scratch module tree under the target temp dir, for import tests.
pub struct ModuleTree {
    pub root: PathBuf,
}

impl ModuleTree {
    pub fn new(tag: &str) -> ModuleTree {
        let root = std::env::temp_dir().join(format!(
            "pscript-modules-{tag}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(&root).unwrap();
        ModuleTree { root }
    }

    /// Write `source` as `<root>/<path>.ps`, creating folders.
    pub fn write(&self, path: &str, source: &str) {
        let mut file = self.root.clone();
        for part in path.split('/') {
            file.push(part);
        }
        file.set_extension("ps");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(file, source).unwrap();
    }

    pub fn options(&self) -> ContextOptions {
        ContextOptions {
            memory_size: 1 << 16,
            module_root: self.root.clone(),
            ..ContextOptions::default()
        }
    }
}

impl Drop for ModuleTree {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}
