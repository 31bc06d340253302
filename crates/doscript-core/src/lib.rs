//! # doscript-core
//!
//! Interpreter for DoScript, a line-oriented automation language for file
//! housekeeping, process control and simple HTTP work.
//!
//! A script goes through three stages:
//!
//! 1. [`lexer`] splits source text into logical lines with comments removed.
//! 2. [`parser`] turns those lines into a [`ast::Program`], matching block
//!    openers with their closers.
//! 3. [`engine`] walks the tree. Expressions are evaluated by [`eval`],
//!    variables live in [`scope`], and every side effect goes through a
//!    [`host::Host`].
//!
//! ## Modules
//!
//! - [`error`] - `ScriptError`, its `ErrorKind` and the source origin attached to it
//! - [`value`] - Runtime values
//! - [`builtins`] - Registry of builtin commands and functions, plus the pure ones
//! - [`loader`] - Search path stack, include-once registry and filesystem enumeration
//! - [`system`] - `SystemHost`, the host backed by the real filesystem, processes and network
//! - [`config`] - `~/.doscript/config.json`
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use doscript_core::config::DoScriptConfig;
//! use doscript_core::engine::{Interpreter, RunOptions};
//! use doscript_core::system::SystemHost;
//!
//! let config = DoScriptConfig::load().expect("bad config");
//! let host = SystemHost::new(&config);
//! let mut interp = Interpreter::new(Box::new(host), RunOptions::default());
//! match interp.run_file(Path::new("cleanup.do")) {
//!     Ok(outcome) => std::process::exit(outcome.exit_code()),
//!     Err(e) => eprintln!("{}", e.report()),
//! }
//! ```

pub mod ast;
pub mod builtins;
pub mod config;
pub mod engine;
pub mod error;
pub mod eval;
pub mod host;
pub mod lexer;
pub mod loader;
pub mod parser;
pub mod scope;
pub mod system;
pub mod value;

pub use engine::{Interpreter, Outcome, RunOptions};
pub use error::{ErrorKind, ScriptError};
pub use value::Value;
