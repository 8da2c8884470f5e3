//! Driver glue: parse → optimize (optional) → codegen → write.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use carbn_backend_bytecode::{disassemble, BytecodeBackend};
use carbn_core::pipeline::{optimize, Backend, Frontend};
use carbn_frontend_python::PythonFrontend;
use clap::Parser;
use log::debug;

#[derive(Parser)]
#[command(name = "carbn", version, about = "Python to Carbon bytecode compiler")]
struct Args {
    /// Input source file.
    input: PathBuf,

    /// Output bytecode file. Defaults to the input path with a `.crbn`
    /// extension.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Run the optimizer pipeline before code generation.
    #[arg(long)]
    optimize: bool,

    /// Enable debug logging (per-pass progress, AST dump, disassembly).
    #[arg(long)]
    debug: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension("crbn"));

    let source = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;

    let frontend = PythonFrontend;
    let mut module = frontend.parse(&source)?;

    if args.optimize {
        module = optimize(module)?;
    }

    if log::log_enabled!(log::Level::Debug) {
        debug!("AST: {}", serde_json::to_string_pretty(&module)?);
    }

    let backend = BytecodeBackend;
    let bytes = backend.generate(&module)?;

    if log::log_enabled!(log::Level::Debug) {
        for inst in disassemble(&bytes)? {
            debug!("{inst}");
        }
    }

    fs::write(&output, &bytes)
        .with_context(|| format!("failed to write {}", output.display()))?;
    Ok(())
}
