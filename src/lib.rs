//! # basic-core
//!
//! A tree-walking interpreter for a classic line-numbered BASIC dialect.
//!
//! ## Pipeline
//!
//! Source text moves through the same stages a compiler would use, just
//! without a code-generation back end:
//!
//! 1. **Lexer** - tokenizes source lines into [`lexer::Token`]s
//! 2. **Parser** - recursive-descent parse into a flat [`parser::ast::Stmt`]
//!    vector, validated for FOR/NEXT, WHILE/WEND and DO/LOOP discipline
//! 3. **Program** - indexes the statement vector by line number and
//!    supports immediate-mode line editing
//! 4. **Interpreter** - walks the program statement by statement, forwarding
//!    graphics/audio/file/persistence operations to host-supplied
//!    [`peripherals`]
//!
//! [`host::Host`] wraps the last three stages into the single façade a
//! front end is expected to drive.
//!
//! ## Example
//!
//! ```rust,no_run
//! use basic_core::host::Host;
//! use basic_core::interpreter::{OutputSink, RuntimeConfig};
//! use basic_core::peripherals::Peripherals;
//!
//! struct Stdout;
//! impl OutputSink for Stdout {
//!     fn emit(&mut self, text: &str) {
//!         print!("{text}");
//!     }
//! }
//!
//! let source = std::fs::read_to_string("program.bas").unwrap();
//! let mut host = Host::new(RuntimeConfig::default());
//! host.load_source(&source).expect("program should parse");
//! let mut peripherals = Peripherals::default();
//! host.run(&mut Stdout, &mut peripherals).expect("program should run");
//! ```

pub mod debugger;
pub mod error;
pub mod eval;
pub mod host;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod peripherals;
pub mod program;
pub mod value;
pub mod variables;
