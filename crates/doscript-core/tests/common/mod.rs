//! Shared test helpers for doscript-core integration tests.
//!
//! [`RecordingHost`] stands in for the real system: it records every builtin
//! invocation and answers with canned values, so scripts can be run without
//! touching processes or the network.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use doscript_core::engine::{Interpreter, Outcome, RunOptions};
use doscript_core::error::ScriptError;
use doscript_core::host::{CallForm, Host, HostCall};
use doscript_core::value::Value;

/// One recorded host invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub name: String,
    pub args: Vec<String>,
    pub form: CallForm,
    pub dry_run: bool,
    pub base_dir: PathBuf,
}

#[derive(Default)]
struct State {
    calls: Vec<Recorded>,
    replies: HashMap<String, Value>,
    failures: HashMap<String, ScriptError>,
}

/// A host that records calls. Clones share state.
#[derive(Clone, Default)]
pub struct RecordingHost {
    state: Rc<RefCell<State>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes builtin `name` return `value`.
    pub fn reply(&self, name: &str, value: impl Into<Value>) -> &Self {
        self.state.borrow_mut().replies.insert(name.to_string(), value.into());
        self
    }

    /// Makes builtin `name` fail with `error`.
    pub fn fail(&self, name: &str, error: ScriptError) -> &Self {
        self.state.borrow_mut().failures.insert(name.to_string(), error);
        self
    }

    pub fn calls(&self) -> Vec<Recorded> {
        self.state.borrow().calls.clone()
    }

    /// First argument of every call to `name`, in order.
    pub fn args_of(&self, name: &str) -> Vec<String> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| c.name == name)
            .map(|c| c.args.first().cloned().unwrap_or_default())
            .collect()
    }

    /// Everything passed to `say`.
    pub fn said(&self) -> Vec<String> {
        self.args_of("say")
    }
}

impl Host for RecordingHost {
    fn invoke(&mut self, call: &HostCall<'_>) -> Result<Value, ScriptError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Recorded {
            name: call.name.to_string(),
            args: call.args.iter().map(Value::to_string).collect(),
            form: call.form,
            dry_run: call.dry_run,
            base_dir: call.base_dir.to_path_buf(),
        });
        if let Some(error) = state.failures.get(call.name) {
            return Err(error.clone());
        }
        if let Some(value) = state.replies.get(call.name) {
            return Ok(value.clone());
        }
        Ok(match (call.name, call.form) {
            ("run", CallForm::Captured) => Value::Integer(0),
            ("capture", _) | ("ask", _) => Value::String(String::new()),
            _ => Value::Unit,
        })
    }
}

/// Builds an interpreter around a recording host.
pub fn interpreter(options: RunOptions) -> (Interpreter, RecordingHost) {
    let host = RecordingHost::new();
    let interp = Interpreter::new(Box::new(host.clone()), options);
    (interp, host)
}

/// Runs `source` as an in-memory script named `test.do`.
pub fn run_source(source: &str) -> (Result<Outcome, ScriptError>, RecordingHost) {
    let (mut interp, host) = interpreter(RunOptions::default());
    let result = interp.run_source(source, Path::new("test.do"));
    (result, host)
}

/// Writes `content` to `dir/name`, creating parent directories.
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}
