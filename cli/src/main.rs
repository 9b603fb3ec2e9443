use std::path::PathBuf;

use clap::Parser;
use miette::{miette, IntoDiagnostic, Result, WrapErr};
use pscript_core::{Context, ContextOptions};
use tracing_subscriber::EnvFilter;

/// pscript - a small embedded scripting language
#[derive(Parser, Debug)]
#[command(name = "pscript")]
#[command(about = "Run a pscript script", long_about = None)]
struct Args {
    /// Script file to execute
    script: PathBuf,

    /// Arena size in bytes for the script's memory pool
    #[arg(long, default_value_t = 1 << 20)]
    memory: usize,

    /// Maximum call depth before execution is aborted
    #[arg(long, default_value_t = 256)]
    max_call_depth: usize,

    /// Directory that `import` statements resolve against
    #[arg(long, default_value = "pscript-modules")]
    module_root: PathBuf,

    /// Hex-dump the arena after the script finishes (for debugging the
    /// allocator)
    #[arg(long)]
    dump_memory: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let source = std::fs::read_to_string(&args.script)
        .into_diagnostic()
        .wrap_err_with(|| format!("reading {}", args.script.display()))?;

    let options = ContextOptions {
        memory_size: args.memory,
        max_call_depth: args.max_call_depth,
        module_root: args.module_root,
    };
    let mut ctx = Context::new(options);

    let result = ctx.run(&source).map_err(|e| miette!("{e}"));

    if args.dump_memory {
        let mut out = std::io::stderr();
        ctx.dump_memory(&mut out).into_diagnostic()?;
    }

    result
}
