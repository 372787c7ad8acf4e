//! # Debugger
//!
//! A passive observer of the interpreter's statement boundary (§4.5):
//! breakpoints, watches, a bounded trace, and a profiling table. The
//! interpreter calls [`Debugger::observe`] before every line-numbered
//! statement; everything else here is queried by the host between runs.

pub mod profiler;
pub mod trace;

use std::time::Duration;

use crate::error::{RuntimeError, Span};
use crate::eval::{self, EvalContext};
use crate::interpreter::functions::FunctionTable;
use crate::parser::ast::Expr;
use crate::value::Value;
use crate::variables::VariableStore;
use profiler::{ProfileReport, Profiler};
use trace::{TraceBuffer, TraceEntry};

#[derive(Debug, Clone, PartialEq)]
pub struct Breakpoint {
    pub line: i32,
    pub condition: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Watch {
    pub name: String,
    pub expr: Expr,
    pub last_value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatchChange {
    pub name: String,
    pub old: Option<Value>,
    pub new: Value,
}

/// What the interpreter should do after `observe` returns.
#[derive(Debug, Clone, Default)]
pub struct ObserveResult {
    pub should_pause: bool,
    pub watch_changes: Vec<WatchChange>,
}

pub struct Debugger {
    breakpoints: Vec<Breakpoint>,
    watches: Vec<Watch>,
    trace: TraceBuffer,
    profiler: Profiler,
}

const DEFAULT_TRACE_CAPACITY: usize = 1000;

impl Debugger {
    pub fn new(trace_capacity: usize, profiling_enabled: bool) -> Self {
        Self {
            breakpoints: Vec::new(),
            watches: Vec::new(),
            trace: TraceBuffer::new(trace_capacity),
            profiler: Profiler::new(profiling_enabled),
        }
    }

    pub fn reset_run_state(&mut self) {
        self.trace.clear();
        self.profiler.clear();
    }

    pub fn set_breakpoint(&mut self, line: i32, condition: Option<Expr>) {
        self.clear_breakpoint(line);
        self.breakpoints.push(Breakpoint { line, condition });
    }

    pub fn clear_breakpoint(&mut self, line: i32) {
        self.breakpoints.retain(|b| b.line != line);
    }

    pub fn set_watch(&mut self, name: impl Into<String>, expr: Expr) {
        let name = name.into();
        self.watches.retain(|w| w.name != name);
        self.watches.push(Watch { name, expr, last_value: None });
    }

    pub fn clear_watch(&mut self, name: &str) {
        self.watches.retain(|w| w.name != name);
    }

    pub fn trace_entries(&self) -> impl Iterator<Item = &TraceEntry> {
        self.trace.entries()
    }

    pub fn profile_report(&self) -> ProfileReport {
        self.profiler.report()
    }

    pub fn record_elapsed(&mut self, line: i32, elapsed: Duration) {
        self.profiler.record(line, elapsed);
    }

    /// Invoked before each line-numbered statement. Evaluates breakpoint
    /// conditions and re-evaluates watches against the current variable
    /// snapshot, and appends a trace entry stamped with `elapsed` (time
    /// since the run began, per §4.5's "(line, timestamp, variable
    /// snapshot)" — distinct from the per-statement duration the profiler
    /// tracks via `record_elapsed`).
    pub fn observe(
        &mut self,
        line: i32,
        elapsed: Duration,
        variables: &VariableStore,
        functions: &FunctionTable,
    ) -> ObserveResult {
        let ctx = EvalContext { variables, functions, graphics: None };
        let span = Span::default();

        let mut watch_changes = Vec::new();
        for watch in &mut self.watches {
            if let Ok(new_value) = eval::eval(&watch.expr, span, &ctx) {
                if watch.last_value.as_ref() != Some(&new_value) {
                    watch_changes.push(WatchChange {
                        name: watch.name.clone(),
                        old: watch.last_value.clone(),
                        new: new_value.clone(),
                    });
                    watch.last_value = Some(new_value);
                }
            }
        }

        let should_pause = self.breakpoints.iter().any(|bp| {
            bp.line == line
                && bp
                    .condition
                    .as_ref()
                    .map(|c| eval::eval(c, span, &ctx).map(|v| v.is_truthy()).unwrap_or(false))
                    .unwrap_or(true)
        });

        self.trace.push(TraceEntry {
            line,
            elapsed,
            variables: variables.scalars().map(|(n, v)| (n.to_string(), v.clone())).collect(),
        });

        for change in &watch_changes {
            log::debug!("watch {} changed: {:?} -> {:?}", change.name, change.old, change.new);
        }
        if should_pause {
            log::debug!("breakpoint hit at line {}", line);
        }

        ObserveResult { should_pause, watch_changes }
    }

    pub fn on_error(&self, error: &RuntimeError) {
        log::error!("runtime error: {}", error);
    }
}

impl Default for Debugger {
    fn default() -> Self {
        Self::new(DEFAULT_TRACE_CAPACITY, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::{BinOp, Expr};

    fn vars() -> VariableStore {
        VariableStore::new()
    }

    #[test]
    fn unconditional_breakpoint_always_pauses_on_its_line() {
        let mut debugger = Debugger::new(10, false);
        debugger.set_breakpoint(20, None);
        let result = debugger.observe(20, Duration::from_millis(0), &vars(), &FunctionTable::new());
        assert!(result.should_pause);
    }

    #[test]
    fn breakpoint_on_a_different_line_does_not_pause() {
        let mut debugger = Debugger::new(10, false);
        debugger.set_breakpoint(20, None);
        let result = debugger.observe(30, Duration::from_millis(0), &vars(), &FunctionTable::new());
        assert!(!result.should_pause);
    }

    #[test]
    fn conditional_breakpoint_only_pauses_when_its_condition_is_true() {
        let mut debugger = Debugger::new(10, false);
        let condition = Expr::Binary {
            op: BinOp::Gt,
            lhs: Box::new(Expr::Number(5.0)),
            rhs: Box::new(Expr::Number(1.0)),
        };
        debugger.set_breakpoint(20, Some(condition));
        let result = debugger.observe(20, Duration::from_millis(0), &vars(), &FunctionTable::new());
        assert!(result.should_pause);
    }

    #[test]
    fn clear_breakpoint_removes_it() {
        let mut debugger = Debugger::new(10, false);
        debugger.set_breakpoint(20, None);
        debugger.clear_breakpoint(20);
        let result = debugger.observe(20, Duration::from_millis(0), &vars(), &FunctionTable::new());
        assert!(!result.should_pause);
    }

    #[test]
    fn watch_reports_a_change_only_when_the_value_differs_from_last_observation() {
        let mut debugger = Debugger::new(10, false);
        debugger.set_watch("X", Expr::Var("X".into()));
        let mut store = vars();
        let first = debugger.observe(10, Duration::from_millis(0), &store, &FunctionTable::new());
        assert_eq!(first.watch_changes.len(), 1);

        let second = debugger.observe(20, Duration::from_millis(0), &store, &FunctionTable::new());
        assert!(second.watch_changes.is_empty());

        store.set_scalar("X", Value::Number(5.0));
        let third = debugger.observe(30, Duration::from_millis(0), &store, &FunctionTable::new());
        assert_eq!(third.watch_changes.len(), 1);
    }

    #[test]
    fn observe_stamps_the_trace_entry_with_the_given_elapsed() {
        let mut debugger = Debugger::new(10, false);
        debugger.observe(10, Duration::from_millis(42), &vars(), &FunctionTable::new());
        let entry = debugger.trace_entries().next().unwrap();
        assert_eq!(entry.elapsed, Duration::from_millis(42));
    }

    #[test]
    fn reset_run_state_clears_the_trace_and_profiler() {
        let mut debugger = Debugger::new(10, true);
        debugger.observe(10, Duration::from_millis(0), &vars(), &FunctionTable::new());
        debugger.record_elapsed(10, Duration::from_millis(1));
        debugger.reset_run_state();
        assert_eq!(debugger.trace_entries().count(), 0);
        assert_eq!(debugger.profile_report().total_time, Duration::ZERO);
    }
}
