use std::fs;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use basic_core::host::Host;
use basic_core::interpreter::{OutputSink, RuntimeConfig};
use basic_core::lexer::tokenize;
use basic_core::parser::parse;
use basic_core::peripherals::Peripherals;

#[derive(Parser)]
#[command(name = "basicrt", about = "A line-numbered BASIC interpreter runtime")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load and RUN a program.
    Run {
        file: String,
        /// Dump the execution trace to stderr after the run completes.
        #[arg(long)]
        trace: bool,
        /// Dump the profiling report to stderr after the run completes.
        #[arg(long)]
        profile: bool,
        /// Stop the run after this many statements even if it hasn't
        /// reached END/STOP on its own.
        #[arg(long)]
        max_steps: Option<usize>,
    },
    /// Tokenize and parse a program without running it.
    Check { file: String },
}

struct Stdout;

impl OutputSink for Stdout {
    fn emit(&mut self, text: &str) {
        print!("{text}");
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Run { file, trace, profile, max_steps } => run(&file, trace, profile, max_steps),
        Command::Check { file } => check(&file),
    }
}

fn run(path: &str, trace: bool, profile: bool, max_steps: Option<usize>) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("failed to read {path}: {err}");
            return ExitCode::FAILURE;
        }
    };

    let config = RuntimeConfig { profiling_enabled: profile, max_steps, ..RuntimeConfig::default() };
    let mut host = Host::new(config);
    if let Err(errors) = host.load_source(&source) {
        for error in &errors {
            eprintln!("{error}");
        }
        return ExitCode::FAILURE;
    }

    let mut output = Stdout;
    let mut peripherals = Peripherals::default();
    let outcome = host.run(&mut output, &mut peripherals);

    if trace {
        eprintln!("--- trace ---");
        for entry in host.trace_entries() {
            eprintln!("{entry:?}");
        }
    }
    if profile {
        eprintln!("--- profile ---");
        eprintln!("{:#?}", host.profile_report());
    }

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn check(path: &str) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("failed to read {path}: {err}");
            return ExitCode::FAILURE;
        }
    };

    let lexed = tokenize(&source);
    for error in &lexed.errors {
        eprintln!("{error}");
    }

    let parsed = parse(&lexed.tokens);
    for error in &parsed.errors {
        eprintln!("{error}");
    }

    if lexed.errors.is_empty() && parsed.errors.is_empty() {
        println!("OK: {} statements", parsed.statements.len());
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
