//! # Statement interpreter
//!
//! The driver loop described in §4.3: walks a [`Program`]'s flat statement
//! vector in instruction-pointer order, dispatching each statement,
//! consulting the line-number map for jumps, and yielding cooperatively
//! every [`RuntimeConfig::yield_every`] statements so a host sharing the
//! thread can service I/O (§5).

pub mod control;
pub mod data;
pub mod functions;


use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::debugger::Debugger;
use crate::error::{ErrorKind, RuntimeError, Span};
use crate::eval::{self, EvalContext};
use crate::parser::ast::{
    ArrayTarget, AudioStatement, Expr, GraphicsStatement, LoopPolarity, PrintItem, PrintSep, Stmt,
    StatementKind,
};
use crate::peripherals::Peripherals;
use crate::program::Program;
use crate::value::Value;
use crate::variables::VariableStore;

use control::{ControlStacks, ForFrame};
use data::DataPool;
use functions::{FunctionDef, FunctionTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Ready,
    Running,
    Paused,
    Stopped,
    Error,
}

/// Sink the interpreter writes `PRINT` output to. A host's terminal/UI
/// layer (an external collaborator, §1) implements this.
pub trait OutputSink {
    fn emit(&mut self, text: &str);
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// How many statements the driver executes before checking in with the
    /// host for cancellation/pause (§5: "at least every 1000 statements").
    pub yield_every: usize,
    pub trace_capacity: usize,
    pub profiling_enabled: bool,
    /// A hard cap on statements executed in a single `run`, for hosts that
    /// want a runaway program to stop on its own rather than relying on an
    /// external `stop`. `None` runs to natural completion.
    pub max_steps: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { yield_every: 1000, trace_capacity: 1000, profiling_enabled: false, max_steps: None }
    }
}

/// A `GOSUB` nesting depth past this is treated as runaway recursion rather
/// than a legitimately deep call graph, and fails with `StackOverflow`
/// instead of growing the stack without bound.
pub const MAX_GOSUB_DEPTH: usize = 512;

/// Thread-safe handles a host keeps to mutate run state and deliver input
/// from its own thread while the interpreter's driver loop runs (§5,
/// "shared resources"): the host may only touch the run state (cancel /
/// resume) and append to the input queue; everything else is owned by the
/// driver loop exclusively.
#[derive(Clone)]
pub struct RuntimeHandle {
    state: Arc<Mutex<RunState>>,
    input_queue: Arc<Mutex<VecDeque<String>>>,
}

impl RuntimeHandle {
    pub fn get_state(&self) -> RunState {
        *self.state.lock().unwrap()
    }

    pub fn pause(&self) {
        let mut state = self.state.lock().unwrap();
        if *state == RunState::Running {
            *state = RunState::Paused;
        }
    }

    pub fn resume(&self) {
        let mut state = self.state.lock().unwrap();
        if *state == RunState::Paused {
            *state = RunState::Running;
        }
    }

    pub fn stop(&self) {
        *self.state.lock().unwrap() = RunState::Stopped;
    }

    pub fn provide_input(&self, values: Vec<String>) {
        let mut queue = self.input_queue.lock().unwrap();
        queue.extend(values);
    }
}

/// Bubbled out of statement execution (including nested `IF` bodies) to
/// tell the driver loop what to do next, without unwinding through a real
/// call stack that doesn't otherwise exist for nested blocks.
enum Flow {
    Next,
    Jump(usize),
    Halted,
}

/// Pre-computed, bidirectional pairing of sibling control statements
/// (`FOR`<->`NEXT`, `WHILE`<->`WEND`, `DO`<->`LOOP`) by statement-vector
/// index. Built once when a run starts; the statement vector does not
/// mutate during a run (§3 invariant), so the pairing never goes stale.
struct Pairs(HashMap<usize, usize>);

impl Pairs {
    fn build(program: &Program) -> Self {
        let mut map = HashMap::new();
        merge_pairs(&mut map, pair_of(program, is_for, is_next));
        merge_pairs(&mut map, pair_of(program, is_while, is_wend));
        merge_pairs(&mut map, pair_of(program, is_do, is_loop));
        Pairs(map)
    }

    fn get(&self, index: usize) -> Option<usize> {
        self.0.get(&index).copied()
    }
}

fn merge_pairs(into: &mut HashMap<usize, usize>, from: HashMap<usize, usize>) {
    into.extend(from);
}

fn is_for(k: &StatementKind) -> bool {
    matches!(k, StatementKind::For { .. })
}
fn is_next(k: &StatementKind) -> bool {
    matches!(k, StatementKind::Next { .. })
}
fn is_while(k: &StatementKind) -> bool {
    matches!(k, StatementKind::While { .. })
}
fn is_wend(k: &StatementKind) -> bool {
    matches!(k, StatementKind::Wend)
}
fn is_do(k: &StatementKind) -> bool {
    matches!(k, StatementKind::Do { .. })
}
fn is_loop(k: &StatementKind) -> bool {
    matches!(k, StatementKind::Loop { .. })
}

fn pair_of(
    program: &Program,
    is_open: impl Fn(&StatementKind) -> bool,
    is_close: impl Fn(&StatementKind) -> bool,
) -> HashMap<usize, usize> {
    let mut stack = Vec::new();
    let mut pairs = HashMap::new();
    for (i, stmt) in program.statements().iter().enumerate() {
        if is_open(&stmt.kind) {
            stack.push(i);
        } else if is_close(&stmt.kind) {
            if let Some(open_i) = stack.pop() {
                pairs.insert(open_i, i);
                pairs.insert(i, open_i);
            }
        }
    }
    pairs
}

pub struct Interpreter {
    pub variables: VariableStore,
    pub functions: FunctionTable,
    pub control: ControlStacks,
    pub data: DataPool,
    pub debugger: Debugger,
    config: RuntimeConfig,
    state: Arc<Mutex<RunState>>,
    input_queue: Arc<Mutex<VecDeque<String>>>,
    pairs: Pairs,
    ip: usize,
}

impl Interpreter {
    pub fn new(program: &Program, config: RuntimeConfig) -> Self {
        Self {
            variables: VariableStore::new(),
            functions: FunctionTable::new(),
            control: ControlStacks::new(),
            data: DataPool::build(program.statements()),
            debugger: Debugger::new(config.trace_capacity, config.profiling_enabled),
            pairs: Pairs::build(program),
            config,
            state: Arc::new(Mutex::new(RunState::Ready)),
            input_queue: Arc::new(Mutex::new(VecDeque::new())),
            ip: 0,
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle { state: self.state.clone(), input_queue: self.input_queue.clone() }
    }

    fn get_state(&self) -> RunState {
        *self.state.lock().unwrap()
    }

    fn set_state(&self, new: RunState) {
        *self.state.lock().unwrap() = new;
    }

    /// `CLEAR`: resets variables and control stacks without touching the
    /// program (§7 recovery). `NEW`-adjacent program reset is the host's
    /// job (`Program::clear`); this only resets run state.
    pub fn clear_run_state(&mut self) {
        self.variables.clear();
        self.functions.clear();
        self.control.clear();
        self.data.reset();
        self.debugger.reset_run_state();
        self.ip = 0;
        self.set_state(RunState::Ready);
    }

    /// Runs `program` to completion (`END`/`STOP`, falling off the end, or
    /// host cancellation). Returns `Ok(())` on normal termination.
    pub fn run(
        &mut self,
        program: &Program,
        output: &mut dyn OutputSink,
        peripherals: &mut Peripherals,
    ) -> Result<(), RuntimeError> {
        self.pairs = Pairs::build(program);
        self.ip = 0;
        self.set_state(RunState::Running);
        log::info!("run: READY -> RUNNING");

        let run_start = Instant::now();
        let mut steps_since_yield = 0usize;
        let mut total_steps = 0usize;
        let result = loop {
            if self.ip >= program.len() {
                break Ok(());
            }

            if let Some(limit) = self.config.max_steps {
                if total_steps >= limit {
                    log::warn!("run: stopping after reaching max_steps ({limit})");
                    break Ok(());
                }
            }

            match self.get_state() {
                RunState::Stopped => break Ok(()),
                RunState::Paused => {
                    self.wait_while_paused();
                    continue;
                }
                _ => {}
            }

            let stmt = program.get(self.ip).expect("ip bounds checked above");

            if let Some(line) = stmt.line_number {
                let observation =
                    self.debugger.observe(line, run_start.elapsed(), &self.variables, &self.functions);
                if observation.should_pause {
                    self.set_state(RunState::Paused);
                    log::info!("run: RUNNING -> PAUSED (breakpoint at line {})", line);
                    continue;
                }
            }

            let start = Instant::now();
            let outcome = self.execute(stmt, program, output, peripherals);
            if let Some(line) = stmt.line_number {
                self.debugger.record_elapsed(line, start.elapsed());
            }

            match outcome {
                Ok(Flow::Next) => self.ip += 1,
                Ok(Flow::Jump(index)) => self.ip = index,
                Ok(Flow::Halted) => break Ok(()),
                Err(err) => break Err(err),
            }

            steps_since_yield += 1;
            total_steps += 1;
            if steps_since_yield >= self.config.yield_every {
                steps_since_yield = 0;
                log::trace!("cooperative yield after {} statements", self.config.yield_every);
            }
        };

        match &result {
            Ok(()) => {
                self.set_state(RunState::Stopped);
                log::info!("run: -> STOPPED");
            }
            Err(err) => {
                self.set_state(RunState::Error);
                self.debugger.on_error(err);
                log::info!("run: -> ERROR");
            }
        }
        result
    }

    fn wait_while_paused(&self) {
        while self.get_state() == RunState::Paused {
            std::thread::yield_now();
        }
    }

    /// An evaluation context with no peripheral wired in — used wherever a
    /// statement's own arguments are evaluated in the same breath as a
    /// mutable borrow of that same peripheral (e.g. a `PSET` coordinate),
    /// so `POINT` is unavailable there but nothing else is affected.
    fn ctx_plain(&self) -> EvalContext {
        EvalContext { variables: &self.variables, functions: &self.functions, graphics: None }
    }

    /// An evaluation context with `POINT` wired to the attached graphics
    /// peripheral, for ordinary statement evaluation (`PRINT`, `LET`,
    /// `IF`, loop bounds, ...) where no conflicting mutable borrow of the
    /// peripheral is in flight.
    fn ctx_for<'a>(&'a self, peripherals: &'a Peripherals) -> EvalContext<'a> {
        let graphics = peripherals
            .graphics
            .as_deref()
            .map(|g| g as &dyn eval::PointSource);
        EvalContext { variables: &self.variables, functions: &self.functions, graphics }
    }

    fn eval(&self, expr: &Expr, span: Span, peripherals: &Peripherals) -> Result<Value, RuntimeError> {
        eval::eval(expr, span, &self.ctx_for(peripherals))
    }

    fn execute(
        &mut self,
        stmt: &Stmt,
        program: &Program,
        output: &mut dyn OutputSink,
        peripherals: &mut Peripherals,
    ) -> Result<Flow, RuntimeError> {
        let span = stmt.span;
        let line = stmt.line_number.unwrap_or(0);
        match &stmt.kind {
            StatementKind::Let { var, value } => {
                let v = self.eval(value, span, peripherals)?;
                self.variables.set_scalar(var, v);
                Ok(Flow::Next)
            }
            StatementKind::ArrayAssign { target, value } => {
                self.assign_array(target, value, span, peripherals)?;
                Ok(Flow::Next)
            }
            StatementKind::Print { items, file_num } => {
                self.exec_print(items, file_num.as_ref(), span, output, peripherals)?;
                Ok(Flow::Next)
            }
            StatementKind::Input { prompt, vars, file_num } => {
                self.exec_input(prompt.as_deref(), vars, file_num.as_ref(), span, output, peripherals)
            }
            StatementKind::If { cond, then_branch, else_branch } => {
                if self.eval(cond, span, peripherals)?.is_truthy() {
                    self.exec_block(then_branch, program, output, peripherals)
                } else if let Some(else_branch) = else_branch {
                    self.exec_block(else_branch, program, output, peripherals)
                } else {
                    Ok(Flow::Next)
                }
            }
            StatementKind::For { var, start, end, step } => {
                self.exec_for(var, start, end, step, span, peripherals)
            }
            StatementKind::Next { var } => self.exec_next(var, span),
            StatementKind::While { cond } => {
                if self.eval(cond, span, peripherals)?.is_truthy() {
                    Ok(Flow::Next)
                } else {
                    let wend = self.pairs.get(self.ip).expect("WHILE always paired by parser");
                    Ok(Flow::Jump(wend + 1))
                }
            }
            StatementKind::Wend => {
                let while_index = self.pairs.get(self.ip).expect("WEND always paired by parser");
                Ok(Flow::Jump(while_index))
            }
            StatementKind::Do { cond } => self.exec_do(cond.as_ref(), span, peripherals),
            StatementKind::Loop { cond } => self.exec_loop(cond.as_ref(), span, peripherals),
            StatementKind::Goto(target) => self.jump_to_line(*target, line, program),
            StatementKind::Gosub(target) => {
                if self.control.gosub_depth() >= MAX_GOSUB_DEPTH {
                    return Err(RuntimeError::at(ErrorKind::StackOverflow, "GOSUB nested too deeply", span)
                        .with_line(line));
                }
                self.control.push_gosub(self.ip + 1);
                self.jump_to_line(*target, line, program)
            }
            StatementKind::Return => {
                let return_index = self
                    .control
                    .pop_gosub()
                    .ok_or_else(|| RuntimeError::at(ErrorKind::ReturnWithoutGosub, "RETURN without GOSUB", span).with_line(line))?;
                Ok(Flow::Jump(return_index))
            }
            StatementKind::OnGoto { selector, targets } => {
                self.exec_on(selector, targets, false, line, span, program, peripherals)
            }
            StatementKind::OnGosub { selector, targets } => {
                self.exec_on(selector, targets, true, line, span, program, peripherals)
            }
            StatementKind::Dim { arrays } => {
                for (name, dims) in arrays {
                    let shape = eval::eval_indices(dims, span, &self.ctx_for(peripherals))?
                        .into_iter()
                        .map(|n| n + 1)
                        .collect();
                    self.variables.declare_array(name, shape, span)?;
                }
                Ok(Flow::Next)
            }
            StatementKind::Data(_) => Ok(Flow::Next),
            StatementKind::Read(vars) => {
                for var in vars {
                    let v = self.data.read_coerced(var).ok_or_else(|| {
                        RuntimeError::at(ErrorKind::OutOfData, "READ past end of DATA pool", span).with_line(line)
                    })?;
                    self.variables.set_scalar(var, v);
                }
                Ok(Flow::Next)
            }
            StatementKind::Restore(target) => {
                self.data.restore(*target);
                Ok(Flow::Next)
            }
            StatementKind::DefFn { name, param, body } => {
                self.functions.define(name, FunctionDef { param: param.clone(), body: body.clone() });
                Ok(Flow::Next)
            }
            StatementKind::End | StatementKind::Stop => Ok(Flow::Halted),
            StatementKind::Rem(_) => Ok(Flow::Next),
            StatementKind::Clear => {
                self.variables.clear();
                self.control.clear();
                self.data.reset();
                Ok(Flow::Next)
            }
            StatementKind::Run | StatementKind::List | StatementKind::New | StatementKind::Save(_)
            | StatementKind::Load(_) => {
                log::warn!("line {}: meta-command executed in program mode, ignored", line);
                Ok(Flow::Next)
            }
            StatementKind::Graphics(g) => {
                self.exec_graphics(g, span, peripherals)?;
                Ok(Flow::Next)
            }
            StatementKind::Audio(a) => {
                self.exec_audio(a, span, peripherals)?;
                Ok(Flow::Next)
            }
            StatementKind::FileOpen { mode, file_num, name, rec_len } => {
                self.exec_file_open(mode, file_num, name, rec_len.as_ref(), span, peripherals)?;
                Ok(Flow::Next)
            }
            StatementKind::FileClose { file_nums } => {
                self.exec_file_close(file_nums, span, peripherals)?;
                Ok(Flow::Next)
            }
        }
    }

    /// Executes a nested statement list (an `IF` branch). Propagates a
    /// `Jump`/`Halted` outcome from any statement in the list straight to
    /// the caller instead of continuing the list, since a `GOTO`/`RETURN`/
    /// `END` inside an `IF` branch must still reach the top-level driver.
    fn exec_block(
        &mut self,
        stmts: &[Stmt],
        program: &Program,
        output: &mut dyn OutputSink,
        peripherals: &mut Peripherals,
    ) -> Result<Flow, RuntimeError> {
        for stmt in stmts {
            match self.execute(stmt, program, output, peripherals)? {
                Flow::Next => continue,
                other => return Ok(other),
            }
        }
        Ok(Flow::Next)
    }

    fn jump_to_line(&mut self, target: i32, current_line: i32, program: &Program) -> Result<Flow, RuntimeError> {
        let index = program.index_of_line(target).ok_or_else(|| {
            RuntimeError::new(ErrorKind::UndefinedLine, format!("undefined line {}", target))
                .with_line(current_line)
        })?;
        self.control.trim_for_goto(index);
        Ok(Flow::Jump(index))
    }

    fn exec_for(
        &mut self,
        var: &str,
        start: &Expr,
        end: &Expr,
        step: &Option<Expr>,
        span: Span,
        peripherals: &Peripherals,
    ) -> Result<Flow, RuntimeError> {
        let start_v = self.eval(start, span, peripherals)?.as_number(span)?;
        let end_v = self.eval(end, span, peripherals)?.as_number(span)?;
        let step_v = match step {
            Some(e) => self.eval(e, span, peripherals)?.as_number(span)?,
            None => 1.0,
        };
        self.variables.set_scalar(var, Value::Number(start_v));

        let next_index = self
            .pairs
            .get(self.ip)
            .expect("FOR always paired with a NEXT by the parser");
        let body_start = self.ip + 1;

        let continues = if step_v >= 0.0 { start_v <= end_v } else { start_v >= end_v };
        if !continues {
            return Ok(Flow::Jump(next_index + 1));
        }
        self.control.push_for(ForFrame {
            variable: var.to_string(),
            end: end_v,
            step: step_v,
            body_start,
            next_index,
        });
        Ok(Flow::Next)
    }

    fn exec_next(&mut self, var: &Option<String>, span: Span) -> Result<Flow, RuntimeError> {
        let frame = self
            .control
            .top_for()
            .ok_or_else(|| RuntimeError::at(ErrorKind::NextWithoutFor, "NEXT without FOR", span))?
            .clone();
        if let Some(name) = var {
            if name != &frame.variable {
                return Err(RuntimeError::at(
                    ErrorKind::NextVariableMismatch,
                    format!("NEXT {} does not match FOR {}", name, frame.variable),
                    span,
                ));
            }
        }
        let current = self.variables.get_scalar(&frame.variable).as_number(span)? + frame.step;
        self.variables.set_scalar(&frame.variable, Value::Number(current));

        let continues = if frame.step >= 0.0 { current <= frame.end } else { current >= frame.end };
        if continues {
            Ok(Flow::Jump(frame.body_start))
        } else {
            self.control.pop_for();
            Ok(Flow::Next)
        }
    }

    fn exec_do(
        &mut self,
        cond: Option<&(LoopPolarity, Expr)>,
        span: Span,
        peripherals: &Peripherals,
    ) -> Result<Flow, RuntimeError> {
        match cond {
            None => Ok(Flow::Next),
            Some((polarity, expr)) => {
                let truth = self.eval(expr, span, peripherals)?.is_truthy();
                let exit = matches!(
                    (polarity, truth),
                    (LoopPolarity::Until, true) | (LoopPolarity::While, false)
                );
                if exit {
                    let loop_index = self.pairs.get(self.ip).expect("DO always paired by parser");
                    Ok(Flow::Jump(loop_index + 1))
                } else {
                    Ok(Flow::Next)
                }
            }
        }
    }

    fn exec_loop(
        &mut self,
        cond: Option<&(LoopPolarity, Expr)>,
        span: Span,
        peripherals: &Peripherals,
    ) -> Result<Flow, RuntimeError> {
        let do_index = self.pairs.get(self.ip).expect("LOOP always paired by parser");
        match cond {
            None => Ok(Flow::Jump(do_index)),
            Some((polarity, expr)) => {
                let truth = self.eval(expr, span, peripherals)?.is_truthy();
                let exit = matches!(
                    (polarity, truth),
                    (LoopPolarity::Until, true) | (LoopPolarity::While, false)
                );
                if exit {
                    Ok(Flow::Next)
                } else {
                    Ok(Flow::Jump(do_index))
                }
            }
        }
    }

    fn exec_on(
        &mut self,
        selector: &Expr,
        targets: &[i32],
        is_gosub: bool,
        line: i32,
        span: Span,
        program: &Program,
        peripherals: &Peripherals,
    ) -> Result<Flow, RuntimeError> {
        let n = self.eval(selector, span, peripherals)?.as_number(span)?.floor() as i64;
        if n < 1 || n as usize > targets.len() {
            log::warn!("line {}: ON selector {} out of range, falling through", line, n);
            return Ok(Flow::Next);
        }
        let target = targets[(n - 1) as usize];
        if is_gosub {
            if self.control.gosub_depth() >= MAX_GOSUB_DEPTH {
                return Err(RuntimeError::at(ErrorKind::StackOverflow, "GOSUB nested too deeply", span)
                    .with_line(line));
            }
            self.control.push_gosub(self.ip + 1);
        }
        self.jump_to_line(target, line, program)
    }

    fn assign_array(
        &mut self,
        target: &ArrayTarget,
        value: &Expr,
        span: Span,
        peripherals: &Peripherals,
    ) -> Result<(), RuntimeError> {
        let v = self.eval(value, span, peripherals)?;
        let idx = eval::eval_indices(&target.indices, span, &self.ctx_for(peripherals))?;
        self.variables.set_element(&target.name, &idx, v, span)
    }

    fn exec_print(
        &mut self,
        items: &[PrintItem],
        file_num: Option<&Expr>,
        span: Span,
        output: &mut dyn OutputSink,
        peripherals: &mut Peripherals,
    ) -> Result<(), RuntimeError> {
        let mut line = String::new();
        let mut trailing_newline = true;
        for item in items {
            let v = self.eval(&item.expr, span, peripherals)?;
            line.push_str(&v.to_display_string());
            match item.sep {
                Some(PrintSep::Comma) => line.push('\t'),
                Some(PrintSep::Semicolon) => {}
                None => trailing_newline = true,
            }
            if item.sep.is_some() {
                trailing_newline = false;
            }
        }
        if trailing_newline {
            line.push('\n');
        }

        match file_num {
            None => output.emit(&line),
            Some(expr) => {
                let n = self.eval(expr, span, peripherals)?.as_number(span)? as i32;
                let files = peripherals.files.as_deref_mut().ok_or_else(|| {
                    RuntimeError::at(ErrorKind::IllegalFunctionCall, "no file-system peripheral attached", span)
                })?;
                files.print(n, &line).map_err(|e| {
                    RuntimeError::at(ErrorKind::IllegalFunctionCall, e, span)
                })?;
            }
        }
        Ok(())
    }

    fn exec_input(
        &mut self,
        prompt: Option<&str>,
        vars: &[String],
        file_num: Option<&Expr>,
        span: Span,
        output: &mut dyn OutputSink,
        peripherals: &mut Peripherals,
    ) -> Result<Flow, RuntimeError> {
        if let Some(file_expr) = file_num {
            let n = self.eval(file_expr, span, peripherals)?.as_number(span)? as i32;
            let files = peripherals.files.as_deref_mut().ok_or_else(|| {
                RuntimeError::at(ErrorKind::IllegalFunctionCall, "no file-system peripheral attached", span)
            })?;
            for var in vars {
                let line = files
                    .input(n)
                    .map_err(|e| RuntimeError::at(ErrorKind::IllegalFunctionCall, e, span))?;
                self.variables.set_scalar(var, coerce_input(var, &line));
            }
            return Ok(Flow::Next);
        }

        if let Some(p) = prompt {
            output.emit(p);
        }
        for var in vars {
            loop {
                if self.get_state() == RunState::Stopped {
                    return Ok(Flow::Halted);
                }
                let next = self.input_queue.lock().unwrap().pop_front();
                match next {
                    Some(text) => {
                        self.variables.set_scalar(var, coerce_input(var, &text));
                        break;
                    }
                    None => std::thread::yield_now(),
                }
            }
        }
        Ok(Flow::Next)
    }

    fn exec_graphics(&mut self, g: &GraphicsStatement, span: Span, peripherals: &mut Peripherals) -> Result<(), RuntimeError> {
        let ctx = self.ctx_plain();
        let gfx = peripherals.graphics.as_deref_mut().ok_or_else(|| {
            RuntimeError::at(ErrorKind::IllegalFunctionCall, "no graphics peripheral attached", span)
        })?;
        let num = |e: &Expr| -> Result<i32, RuntimeError> { Ok(eval::eval(e, span, &ctx)?.as_number(span)? as i32) };
        let opt_num = |e: &Option<Expr>| -> Result<Option<i32>, RuntimeError> {
            e.as_ref().map(|e| num(e)).transpose()
        };
        match g {
            GraphicsStatement::Screen(mode) => gfx.set_screen_mode(num(mode)?),
            GraphicsStatement::Cls(mode) => gfx.cls(opt_num(mode)?),
            GraphicsStatement::Color { fg, bg, border } => {
                gfx.set_color(opt_num(fg)?, opt_num(bg)?, opt_num(border)?)
            }
            GraphicsStatement::PSet { x, y, color } => gfx.pset(num(x)?, num(y)?, opt_num(color)?),
            GraphicsStatement::PReset { x, y, color } => gfx.preset(num(x)?, num(y)?, opt_num(color)?),
            GraphicsStatement::Line { x1, y1, x2, y2, color, boxed, filled } => gfx.line(
                num(x1)?,
                num(y1)?,
                num(x2)?,
                num(y2)?,
                crate::peripherals::LineStyle { color: opt_num(color)?, boxed: *boxed, filled: *filled },
            ),
            GraphicsStatement::Circle { x, y, radius, color } => gfx.circle(
                num(x)?,
                num(y)?,
                num(radius)?,
                crate::peripherals::CircleStyle { color: opt_num(color)?, start: None, end: None, aspect: None },
            ),
            GraphicsStatement::Paint { x, y, paint_color, border_color } => gfx.paint(
                num(x)?,
                num(y)?,
                crate::peripherals::PaintColors {
                    paint_color: opt_num(paint_color)?,
                    border_color: opt_num(border_color)?,
                },
            ),
            GraphicsStatement::Get { x1, y1, x2, y2, array } => {
                let bytes = gfx.get_sprite(num(x1)?, num(y1)?, num(x2)?, num(y2)?);
                self.variables.set_scalar(array, Value::Bytes(bytes));
            }
            GraphicsStatement::Put { x, y, array } => {
                let v = self.variables.get_scalar(array);
                if let Value::Bytes(bytes) = v {
                    gfx.put_sprite(num(x)?, num(y)?, &bytes, None);
                } else {
                    return Err(RuntimeError::at(ErrorKind::TypeMismatch, "PUT requires a sprite byte array", span));
                }
            }
            GraphicsStatement::View(args) => gfx.set_view(&eval_f64_list(args, span, &ctx)?),
            GraphicsStatement::Window(args) => gfx.set_window(&eval_f64_list(args, span, &ctx)?),
            GraphicsStatement::Palette(args) => gfx.set_palette(&eval_f64_list(args, span, &ctx)?),
            GraphicsStatement::Draw(cmd) => {
                let s = eval::eval(cmd, span, &ctx)?.as_str(span)?.to_string();
                gfx.draw(&s);
            }
        }
        Ok(())
    }

    fn exec_audio(&mut self, a: &AudioStatement, span: Span, peripherals: &mut Peripherals) -> Result<(), RuntimeError> {
        let ctx = self.ctx_plain();
        let audio = peripherals.audio.as_deref_mut().ok_or_else(|| {
            RuntimeError::at(ErrorKind::IllegalFunctionCall, "no audio peripheral attached", span)
        })?;
        match a {
            AudioStatement::Sound { freq, duration } => {
                let f = eval::eval(freq, span, &ctx)?.as_number(span)?;
                let d = eval::eval(duration, span, &ctx)?.as_number(span)?;
                audio.sound(f, d);
            }
            AudioStatement::Play(mml) => {
                let s = eval::eval(mml, span, &ctx)?.as_str(span)?.to_string();
                audio.play(&s);
            }
        }
        Ok(())
    }

    fn exec_file_open(
        &mut self,
        mode: &Expr,
        file_num: &Expr,
        name: &Expr,
        rec_len: Option<&Expr>,
        span: Span,
        peripherals: &mut Peripherals,
    ) -> Result<(), RuntimeError> {
        let ctx = self.ctx_plain();
        let mode_s = eval::eval(mode, span, &ctx)?.as_str(span)?.to_string();
        let n = eval::eval(file_num, span, &ctx)?.as_number(span)? as i32;
        let name_s = eval::eval(name, span, &ctx)?.as_str(span)?.to_string();
        let rec_len_n = rec_len
            .map(|e| eval::eval(e, span, &ctx).and_then(|v| v.as_number(span)))
            .transpose()?
            .map(|n| n as i32);
        let files = peripherals.files.as_deref_mut().ok_or_else(|| {
            RuntimeError::at(ErrorKind::IllegalFunctionCall, "no file-system peripheral attached", span)
        })?;
        files
            .open(&mode_s, n, &name_s, rec_len_n)
            .map_err(|e| RuntimeError::at(ErrorKind::IllegalFunctionCall, e, span))
    }

    fn exec_file_close(&mut self, file_nums: &[Expr], span: Span, peripherals: &mut Peripherals) -> Result<(), RuntimeError> {
        let ctx = self.ctx_plain();
        let nums: Result<Vec<i32>, RuntimeError> = file_nums
            .iter()
            .map(|e| Ok(eval::eval(e, span, &ctx)?.as_number(span)? as i32))
            .collect();
        let nums = nums?;
        let files = peripherals.files.as_deref_mut().ok_or_else(|| {
            RuntimeError::at(ErrorKind::IllegalFunctionCall, "no file-system peripheral attached", span)
        })?;
        files.close(&nums);
        Ok(())
    }
}

fn eval_f64_list(exprs: &[Expr], span: Span, ctx: &EvalContext) -> Result<Vec<f64>, RuntimeError> {
    exprs.iter().map(|e| eval::eval(e, span, ctx)?.as_number(span)).collect()
}

fn coerce_input(var_name: &str, raw: &str) -> Value {
    if var_name.ends_with('$') {
        Value::Str(raw.to_string())
    } else {
        Value::Number(raw.trim().parse().unwrap_or(0.0))
    }
}
