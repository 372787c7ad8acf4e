//! # Host
//!
//! The façade a front end (a terminal REPL, an editor widget, a test
//! harness) drives instead of reaching into `Program`/`Interpreter`
//! directly. It owns the program text, the interpreter, and its debugger,
//! and exposes the small vocabulary §6 describes: load a program, edit a
//! line, run it against whatever peripherals the host has wired up, and
//! step the debugger.
//!
//! Run control that must work from a second thread while `run` blocks the
//! first one (`pause`/`resume`/`stop`/`provide_input`) goes through
//! [`RuntimeHandle`], cloned out of the live interpreter before `run` is
//! called.

use crate::debugger::profiler::ProfileReport;
use crate::debugger::trace::TraceEntry;
use crate::error::RuntimeError;
use crate::interpreter::control::CallFrame;
use crate::interpreter::{Interpreter, OutputSink, RuntimeConfig, RuntimeHandle};
use crate::lexer::tokenize;
use crate::parser::ast::Expr;
use crate::parser::parse;
use crate::peripherals::Peripherals;
use crate::program::Program;

/// Owns a program plus the interpreter it runs against. Re-created on
/// `load_source`/`clear_program`, since a fresh interpreter is required
/// whenever the statement vector it was built against changes shape.
pub struct Host {
    program: Program,
    interpreter: Interpreter,
    config: RuntimeConfig,
}

impl Host {
    pub fn new(config: RuntimeConfig) -> Self {
        let program = Program::new();
        let interpreter = Interpreter::new(&program, config.clone());
        Self { program, interpreter, config }
    }

    /// Replaces the whole program with freshly tokenized and parsed
    /// source, discarding whatever was loaded before. On a lex or parse
    /// error the host keeps its previous program untouched.
    pub fn load_source(&mut self, source: &str) -> Result<(), Vec<RuntimeError>> {
        let statements = parse_source(source)?;
        self.program = Program::from_statements(statements);
        self.interpreter = Interpreter::new(&self.program, self.config.clone());
        Ok(())
    }

    /// Immediate-mode line entry: parses one line of source (which must
    /// carry a leading line number) and splices it into the program via
    /// [`Program::set_line`], replacing any statement run already filed
    /// under that number. Rebuilds the interpreter, since its precomputed
    /// loop pairing and DATA pool are only valid for the statement vector
    /// they were built from.
    pub fn add_line(&mut self, source: &str) -> Result<(), Vec<RuntimeError>> {
        let statements = parse_source(source)?;
        let line_number = statements.first().and_then(|s| s.line_number).ok_or_else(|| {
            vec![RuntimeError::new(
                crate::error::ErrorKind::UnexpectedToken,
                "immediate-mode line entry requires a leading line number",
            )]
        })?;
        self.program.set_line(line_number, statements);
        self.interpreter = Interpreter::new(&self.program, self.config.clone());
        Ok(())
    }

    /// `NEW`: empties the program and resets the interpreter to match.
    pub fn clear_program(&mut self) {
        self.program.clear();
        self.interpreter = Interpreter::new(&self.program, self.config.clone());
    }

    /// `LIST`.
    pub fn list(&self) -> String {
        self.program.list()
    }

    pub fn is_empty(&self) -> bool {
        self.program.is_empty()
    }

    /// A cloneable, thread-safe remote control for the in-flight `run`
    /// call — take one of these before spawning the thread that calls
    /// `run`, since `run` itself borrows `self` mutably for its duration.
    pub fn handle(&self) -> RuntimeHandle {
        self.interpreter.handle()
    }

    /// Runs the loaded program to completion (`END`/`STOP`, falling off
    /// the end, a host-issued `stop`, or an error). Blocking; drive it
    /// from a dedicated thread if the host needs `pause`/`resume`/`stop`
    /// to interrupt it.
    pub fn run(
        &mut self,
        output: &mut dyn OutputSink,
        peripherals: &mut Peripherals,
    ) -> Result<(), RuntimeError> {
        self.interpreter.run(&self.program, output, peripherals)
    }

    /// `CLEAR`: resets variables and control stacks without touching the
    /// loaded program.
    pub fn clear_run_state(&mut self) {
        self.interpreter.clear_run_state();
    }

    pub fn set_breakpoint(&mut self, line: i32, condition: Option<Expr>) {
        self.interpreter.debugger.set_breakpoint(line, condition);
    }

    pub fn clear_breakpoint(&mut self, line: i32) {
        self.interpreter.debugger.clear_breakpoint(line);
    }

    pub fn set_watch(&mut self, name: impl Into<String>, expr: Expr) {
        self.interpreter.debugger.set_watch(name, expr);
    }

    pub fn clear_watch(&mut self, name: &str) {
        self.interpreter.debugger.clear_watch(name);
    }

    pub fn trace_entries(&self) -> impl Iterator<Item = &TraceEntry> {
        self.interpreter.debugger.trace_entries()
    }

    pub fn profile_report(&self) -> ProfileReport {
        self.interpreter.debugger.profile_report()
    }

    /// The live GOSUB/FOR call stack, most recent frame last. Lives on
    /// `ControlStacks` rather than `Debugger`, since it is control-flow
    /// bookkeeping the interpreter already maintains, not trace/profile
    /// data the debugger collects on the side.
    pub fn call_stack(&self) -> Vec<CallFrame> {
        self.interpreter.control.call_stack()
    }
}

fn parse_source(source: &str) -> Result<Vec<crate::parser::ast::Stmt>, Vec<RuntimeError>> {
    let lexed = tokenize(source);
    let mut errors = lexed.errors;
    let parsed = parse(&lexed.tokens);
    errors.extend(parsed.errors);
    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(parsed.statements)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct StringSink(String);

    impl OutputSink for StringSink {
        fn emit(&mut self, text: &str) {
            self.0.push_str(text);
        }
    }

    #[test]
    fn load_source_runs_to_completion() {
        let mut host = Host::new(RuntimeConfig::default());
        host.load_source("10 PRINT \"HI\"\n20 END\n").unwrap();
        let mut sink = StringSink::default();
        let mut peripherals = Peripherals::default();
        host.run(&mut sink, &mut peripherals).unwrap();
        assert_eq!(sink.0, "HI\n");
    }

    #[test]
    fn add_line_splices_into_an_existing_program() {
        let mut host = Host::new(RuntimeConfig::default());
        host.load_source("10 LET X = 1\n20 END\n").unwrap();
        host.add_line("10 LET X = 9\n").unwrap();
        let mut sink = StringSink::default();
        let mut peripherals = Peripherals::default();
        host.run(&mut sink, &mut peripherals).unwrap();
        assert!(host.list().contains("LET X"));
    }

    #[test]
    fn add_line_without_a_line_number_is_rejected() {
        let mut host = Host::new(RuntimeConfig::default());
        let err = host.add_line("PRINT 1\n").unwrap_err();
        assert!(!err.is_empty());
    }

    #[test]
    fn clear_program_empties_everything() {
        let mut host = Host::new(RuntimeConfig::default());
        host.load_source("10 END\n").unwrap();
        host.clear_program();
        assert!(host.is_empty());
    }

    #[test]
    fn load_source_with_a_parse_error_leaves_the_old_program_intact() {
        let mut host = Host::new(RuntimeConfig::default());
        host.load_source("10 END\n").unwrap();
        let err = host.load_source("10 NEXT I\n").unwrap_err();
        assert!(!err.is_empty());
        assert!(!host.is_empty());
    }
}
