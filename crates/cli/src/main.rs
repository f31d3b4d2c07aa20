//! The `ember` binary: REPL, file execution, and bytecode disassembly
//! (§12). This crate only wires the pieces together; all language
//! semantics live in `ember-core`, `ember-compiler`, and `ember-vm`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use ember_vm::{InterpretError, VmConfig};

/// Exit codes (§6): 0 ok, 65 compile error, 70 runtime error, 74 file I/O
/// error.
mod exit {
    pub const OK: u8 = 0;
    pub const COMPILE_ERROR: u8 = 65;
    pub const RUNTIME_ERROR: u8 = 70;
    pub const IO_ERROR: u8 = 74;
}

#[derive(Parser)]
#[command(name = "ember")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Ember: a small dynamically-typed scripting language", long_about = None)]
struct Cli {
    /// Source file to run. With no file and no subcommand, starts the REPL.
    script: Option<PathBuf>,

    /// Print each decoded instruction before it runs.
    #[arg(long)]
    trace: bool,

    /// Force a garbage collection before every allocation.
    #[arg(long)]
    stress_gc: bool,

    /// Arguments passed through to the script, visible via the `argv` native.
    #[arg(last = true)]
    args: Vec<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a file and print its disassembled bytecode without running it.
    Disassemble {
        /// Input source file
        path: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_env("EMBER_LOG").unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::Disassemble { path }) => run_disassemble(&path),
        None => match cli.script {
            Some(path) => run_file(&path, cli.trace, cli.stress_gc, cli.args),
            None => run_repl(cli.trace, cli.stress_gc),
        },
    }
}

fn vm_config(trace: bool, stress_gc: bool) -> VmConfig {
    let mut config = VmConfig::default();
    config.stress_gc = stress_gc;
    config.trace_execution = trace;
    config
}

fn run_file(path: &PathBuf, trace: bool, stress_gc: bool, args: Vec<String>) -> ExitCode {
    let source = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("ember: can't read '{}': {err}", path.display());
            return ExitCode::from(exit::IO_ERROR);
        }
    };

    ember_vm::set_argv(args);
    let mut vm = ember_vm::Vm::new(vm_config(trace, stress_gc));
    match vm.interpret(&source) {
        Ok(()) => ExitCode::from(exit::OK),
        Err(InterpretError::Compile(errors)) => {
            eprint!("{errors}");
            ExitCode::from(exit::COMPILE_ERROR)
        }
        Err(InterpretError::Runtime(fault)) => {
            eprint!("{fault}");
            ExitCode::from(exit::RUNTIME_ERROR)
        }
    }
}

/// Reads one line at a time from stdin and interprets each as a standalone
/// script against a single long-lived `Vm`, so globals persist across lines
/// while local scopes do not (§12).
fn run_repl(trace: bool, stress_gc: bool) -> ExitCode {
    let mut rl = rustyline::DefaultEditor::new().expect("failed to initialize line editor");
    let mut vm = ember_vm::Vm::new(vm_config(trace, stress_gc));

    loop {
        match rl.readline("> ") {
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());
                if let Err(error) = vm.interpret(line.as_bytes()) {
                    eprint!("{error}");
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) | Err(rustyline::error::ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("ember: {err}");
                break;
            }
        }
    }
    ExitCode::from(exit::OK)
}

fn run_disassemble(path: &PathBuf) -> ExitCode {
    let source = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("ember: can't read '{}': {err}", path.display());
            return ExitCode::from(exit::IO_ERROR);
        }
    };

    let mut heap = ember_core::Heap::new();
    match ember_compiler::compile(&source, &mut heap, ember_compiler::CompilerConfig::default()) {
        Ok(function) => {
            print_chunk_tree(function, &mut Vec::new());
            ExitCode::from(exit::OK)
        }
        Err(errors) => {
            eprint!("{errors}");
            ExitCode::from(exit::COMPILE_ERROR)
        }
    }
}

/// Walks every function constant reachable from `function`'s chunk,
/// disassembling each one; `seen` guards against printing the same nested
/// function twice (two closures over the same literal share one `Function`
/// constant).
fn print_chunk_tree(function: ember_core::ObjectRef, seen: &mut Vec<ember_core::ObjectRef>) {
    if seen.contains(&function) {
        return;
    }
    seen.push(function);

    let obj = function.as_function();
    let name = match obj.name {
        Some(name) => name.as_string().as_str().to_string(),
        None => "<script>".to_string(),
    };
    println!("{}", ember_compiler::disassemble_chunk(&obj.chunk, &name));

    for constant in &obj.chunk.constants {
        if constant.is_object() && constant.as_object().kind() == ember_core::ObjKind::Function {
            print_chunk_tree(constant.as_object(), seen);
        }
    }
}
