use std::fs;
use std::io;
use std::process::ExitCode;
use std::thread;

use clap::{Arg, Command};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use monkey_interpreter::object::{Environment, Object};
use monkey_interpreter::repl::{self, ReplConfig};

const INTERPRETER_STACK_SIZE: usize = 256 * 1024 * 1024;

fn main() -> ExitCode {
    let matches = Command::new("rmonkey")
        .about("The Monkey programming language")
        .arg(
            Arg::new("file")
                .help("Script to run; starts a REPL when omitted")
                .index(1),
        )
        .arg(
            Arg::new("prompt")
                .long("prompt")
                .help("REPL prompt")
                .takes_value(true)
                .default_value(">> "),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .help("Log filter, e.g. `debug`; defaults to $RUST_LOG, then `warn`")
                .takes_value(true),
        )
        .get_matches();

    let filter = match matches.value_of("log-level") {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let file = matches.value_of("file").map(str::to_owned);
    let config = ReplConfig {
        prompt: matches.value_of("prompt").unwrap_or(">> ").to_owned(),
        ..ReplConfig::default()
    };

    // Every Monkey call nests several evaluator frames.
    let interpreter = thread::Builder::new()
        .name("monkey".to_owned())
        .stack_size(INTERPRETER_STACK_SIZE)
        .spawn(move || match file {
            Some(path) => run_file(&path),
            None => run_repl(&config),
        });

    match interpreter.map(|handle| handle.join()) {
        Ok(Ok(code)) => code,
        Ok(Err(_)) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("could not start interpreter: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run_repl(config: &ReplConfig) -> ExitCode {
    println!("This is the Monkey programming language!");
    println!("Feel free to type in commands");

    let stdin = io::stdin();
    match repl::start(stdin.lock(), io::stdout(), config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("I/O error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run_file(path: &str) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("could not read {}: {}", path, err);
            return ExitCode::FAILURE;
        }
    };
    debug!(path, bytes = source.len(), "running file");

    let (program, errors) = monkey_interpreter::parse(&source);
    if !errors.is_empty() {
        for error in errors {
            eprintln!("{}", error);
        }
        return ExitCode::FAILURE;
    }

    let mut env = Environment::new();
    match monkey_interpreter::evaluate(&program, &mut env) {
        Object::Null => ExitCode::SUCCESS,
        obj if obj.is_error() => {
            eprintln!("{}", obj);
            ExitCode::FAILURE
        }
        obj => {
            println!("{}", obj);
            ExitCode::SUCCESS
        }
    }
}
