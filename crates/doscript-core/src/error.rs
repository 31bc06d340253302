//! Error taxonomy for DoScript programs.
//!
//! Every failure the engine can observe is a [`ScriptError`] tagged with an
//! [`ErrorKind`]. Kinds are what `catch` clauses match on, so the set is closed
//! and each kind has a fixed script-visible name (`FileError`, `DataError`, …).

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// The category of a [`ScriptError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Download, upload, HTTP and ping failures.
    Network,
    /// Filesystem failures, including unreadable includes.
    File,
    /// Failures spawning or signalling external processes.
    Process,
    /// Expression and type errors, undeclared identifiers, division by zero.
    Data,
    /// Structural and scope violations, parse errors.
    Generic,
}

impl ErrorKind {
    /// All kinds, in declaration order.
    pub const ALL: [ErrorKind; 5] = [
        ErrorKind::Network,
        ErrorKind::File,
        ErrorKind::Process,
        ErrorKind::Data,
        ErrorKind::Generic,
    ];

    /// The name a `catch` clause uses to select this kind.
    pub fn catch_name(self) -> &'static str {
        match self {
            ErrorKind::Network => "NetworkError",
            ErrorKind::File => "FileError",
            ErrorKind::Process => "ProcessError",
            ErrorKind::Data => "DataError",
            ErrorKind::Generic => "DoScriptError",
        }
    }

    /// Resolves a catch-clause name. Accepts both `FileError` and `File`.
    pub fn from_catch_name(name: &str) -> Option<ErrorKind> {
        ErrorKind::ALL.into_iter().find(|kind| {
            let full = kind.catch_name();
            name == full || name == short_name(*kind)
        })
    }
}

fn short_name(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Network => "Network",
        ErrorKind::File => "File",
        ErrorKind::Process => "Process",
        ErrorKind::Data => "Data",
        ErrorKind::Generic => "Generic",
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.catch_name())
    }
}

/// Where an error was raised: the statement's file, 1-based line and text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub file: PathBuf,
    pub line: usize,
    pub text: String,
}

/// A kind-tagged failure raised by the engine or by a builtin.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ScriptError {
    pub kind: ErrorKind,
    pub message: String,
    pub origin: Option<Origin>,
}

impl ScriptError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            origin: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn file(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::File, message)
    }

    pub fn process(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Process, message)
    }

    pub fn data(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Data, message)
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Generic, message)
    }

    /// Attaches an origin unless one is already present.
    ///
    /// The innermost statement wins: an error raised inside a function body
    /// keeps the location of the failing body statement, not the call site.
    pub fn located(mut self, origin: impl FnOnce() -> Origin) -> Self {
        if self.origin.is_none() {
            self.origin = Some(origin());
        }
        self
    }

    /// Multi-line report used by the CLI for uncaught errors.
    pub fn report(&self) -> String {
        match &self.origin {
            Some(origin) => format!(
                "DoScript Error: {}\n  --> {}:{}\n   | {}",
                self.message,
                origin.file.display(),
                origin.line,
                origin.text
            ),
            None => format!("DoScript Error: {}", self.message),
        }
    }
}

/// Non-local exit from expression evaluation or statement execution.
///
/// `Exit` is carried alongside errors so that `exit` inside a function that
/// was called from an expression still terminates the whole run.
#[derive(Debug, Clone, PartialEq)]
pub enum Interrupt {
    Raised(ScriptError),
    Exit(i32),
}

impl From<ScriptError> for Interrupt {
    fn from(e: ScriptError) -> Self {
        Interrupt::Raised(e)
    }
}
