use clap::Parser;
use color_eyre::Report;
use flint_compiler::error::CompileError;
use flint_errors::ReportableError as _;
use flint_runtime::heap::{Handle, Heap};
use flint_runtime::object::Function;
use flint_runtime::value::Value;
use flint_vm::Vm;
use flint_vm::builtins::{Clock, Sleep};
use flint_vm::error::RuntimeError;
use flint_vm::io::StdoutContext;
use std::fs;
use std::io::{self, BufRead as _, Write as _};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const USAGE_ERROR: u8 = 64;
const COMPILE_ERROR: u8 = 65;
const RUNTIME_ERROR: u8 = 70;
const IO_ERROR: u8 = 74;

#[derive(Debug, Parser)]
#[clap(name = "flint", version, about = "The flint interpreter")]
struct CLArgs {
    /// Script to interpret; starts a REPL when omitted.
    path: Option<PathBuf>,
    /// Render diagnostics as rich reports instead of plain lines.
    #[clap(long)]
    pretty: bool,
    /// Print the token stream instead of interpreting.
    #[clap(long)]
    tokenize: bool,
    /// Disassemble every compiled chunk to stderr before running.
    #[clap(long)]
    dump: bool,
    /// Run a collection cycle at every allocation check.
    #[clap(long)]
    gc_stress: bool,
    /// Log each dispatched instruction through tracing.
    #[clap(long)]
    trace_execution: bool,
}

fn main() -> ExitCode {
    fallible_main().expect("encountered an unexpected error!")
}

fn fallible_main() -> Result<ExitCode, Report> {
    let args = match CLArgs::try_parse() {
        Ok(args) => args,
        Err(error) => {
            let is_help = matches!(
                error.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            );
            error.print()?;
            return Ok(if is_help {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(USAGE_ERROR)
            });
        }
    };

    let filter = EnvFilter::builder().from_env()?;
    tracing_subscriber::registry()
        .with(fmt::layer().without_time())
        .with(filter)
        .init();

    let mut session = Session::new(&args);
    match args.path {
        Some(ref path) => session.run_file(path),
        None => session.repl(),
    }
}

/// One interpreter instance: the heap, the VM, and the reporting options.
struct Session {
    heap: Heap,
    vm: Vm,
    pretty: bool,
    tokenize: bool,
    dump: bool,
}

impl Session {
    fn new(args: &CLArgs) -> Self {
        let mut heap = Heap::with_stress(args.gc_stress);
        let mut vm = Vm::with_trace(args.trace_execution);
        vm.define_native(&mut heap, Rc::new(Clock::new()));
        vm.define_native(&mut heap, Rc::new(Sleep));
        Self {
            heap,
            vm,
            pretty: args.pretty,
            tokenize: args.tokenize,
            dump: args.dump,
        }
    }

    fn run_file(&mut self, path: &Path) -> Result<ExitCode, Report> {
        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(error) => {
                eprintln!("could not read {}: {error}", path.display());
                return Ok(ExitCode::from(IO_ERROR));
            }
        };
        if self.tokenize {
            dump_tokens(&source);
            return Ok(ExitCode::SUCCESS);
        }
        let path = path.to_string_lossy();
        Ok(self.interpret(&path, &source))
    }

    fn repl(&mut self) -> Result<ExitCode, Report> {
        let stdin = io::stdin();
        let mut line = String::new();
        loop {
            print!("> ");
            io::stdout().flush()?;
            line.clear();
            if stdin.lock().read_line(&mut line)? == 0 {
                break;
            }
            // An empty line is a no-op, not an error.
            if line.trim().is_empty() {
                continue;
            }
            if self.tokenize {
                dump_tokens(&line);
                continue;
            }
            self.interpret("repl", &line);
        }
        Ok(ExitCode::SUCCESS)
    }

    /// Compile and run one program, reporting diagnostics to stderr. The
    /// heap and globals survive for the next call.
    fn interpret(&mut self, path: &str, source: &str) -> ExitCode {
        let script = match flint_compiler::compile(source, &mut self.heap, Some(&self.vm)) {
            Ok(script) => script,
            Err(errors) => {
                self.report_compile_errors(&errors, path, source);
                return ExitCode::from(COMPILE_ERROR);
            }
        };

        if self.dump {
            let mut buffer = String::new();
            dump_function(&self.heap, script, &mut buffer);
            eprint!("{buffer}");
        }

        let mut context = StdoutContext;
        match self.vm.run(&mut self.heap, &mut context, script) {
            Ok(()) => ExitCode::SUCCESS,
            Err(error) => {
                self.report_runtime_error(&error, path, source);
                ExitCode::from(RUNTIME_ERROR)
            }
        }
    }

    fn report_compile_errors(&self, errors: &[CompileError], path: &str, source: &str) {
        let mut buffer = String::new();
        for error in errors {
            if self.pretty {
                error.report(&mut buffer, path, source);
            } else {
                error
                    .format(&mut buffer)
                    .expect("writing to a string shouldn't normally error.");
                buffer.push('\n');
            }
        }
        eprint!("{buffer}");
    }

    fn report_runtime_error(&self, error: &RuntimeError, path: &str, source: &str) {
        let mut buffer = String::new();
        if self.pretty {
            error.report(&mut buffer, path, source);
        } else {
            error
                .format(&mut buffer)
                .expect("writing to a string shouldn't normally error.");
            buffer.push('\n');
        }
        eprint!("{buffer}");
    }
}

/// Print one `NAME lexeme line` row per token.
fn dump_tokens(source: &str) {
    let mut lexer = flint_lexer::Lexer::new(source);
    loop {
        let token = lexer.next_token();
        let lexeme = lexer.lexeme(&token).unwrap_or("");
        println!("{} {:?} {}", token.kind.name(), lexeme, token.line);
        if token.is_eof() {
            return;
        }
    }
}

/// Disassemble a function and, recursively, every function in its constant
/// pool.
fn dump_function(heap: &Heap, function: Handle<Function>, buffer: &mut String) {
    let Some(resolved) = heap.function(function) else {
        return;
    };
    let name = heap.string(resolved.name).unwrap_or("?");
    if resolved.chunk.disassemble(buffer, name, heap).is_err() {
        return;
    }
    let nested: Vec<Handle<Function>> = resolved
        .chunk
        .constants()
        .iter()
        .filter_map(|constant| match constant {
            Value::Function(handle) => Some(*handle),
            _ => None,
        })
        .collect();
    for handle in nested {
        dump_function(heap, handle, buffer);
    }
}
