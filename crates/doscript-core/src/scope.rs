//! Variable tables: one global table plus a stack of call frames.
//!
//! Only the innermost frame is visible. A function called from another
//! function cannot see its caller's locals.
//!
//! Declared names start out unset. Reading an unset name is a `Data` error,
//! reported differently from reading a name that was never declared.

use std::collections::HashMap;

use crate::error::ScriptError;
use crate::value::Value;

type Table = HashMap<String, Option<Value>>;

/// Locals of one function invocation.
#[derive(Debug, Default, Clone)]
pub struct Frame {
    locals: Table,
}

impl Frame {
    /// Binds parameters positionally. Parameters without an argument stay
    /// declared but unset.
    pub fn with_params(params: &[String], args: Vec<Value>) -> Self {
        let mut args = args.into_iter();
        let locals = params
            .iter()
            .map(|p| (p.clone(), args.next()))
            .collect();
        Self { locals }
    }
}

#[derive(Debug, Default)]
pub struct Scope {
    globals: Table,
    frames: Vec<Frame>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares globals. Re-declaring an existing global keeps its value.
    pub fn declare_global(&mut self, names: &[String]) {
        for name in names {
            self.globals.entry(name.clone()).or_insert(None);
        }
    }

    /// Declares locals in the active frame.
    pub fn declare_local(&mut self, names: &[String]) -> Result<(), ScriptError> {
        let frame = self
            .frames
            .last_mut()
            .ok_or_else(|| {
                ScriptError::generic("local_variable can only be used inside functions")
            })?;
        for name in names {
            frame.locals.entry(name.clone()).or_insert(None);
        }
        Ok(())
    }

    fn find(&self, name: &str) -> Option<&Option<Value>> {
        self.frames
            .last()
            .and_then(|f| f.locals.get(name))
            .or_else(|| self.globals.get(name))
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn read(&self, name: &str) -> Result<Value, ScriptError> {
        match self.find(name) {
            Some(Some(value)) => Ok(value.clone()),
            Some(None) => Err(ScriptError::data(format!(
                "Variable '{}' is declared but has no value",
                name
            ))),
            None => Err(ScriptError::data(format!("Variable '{}' is not declared", name))),
        }
    }

    /// Assigns to the innermost declaration of `name`.
    pub fn write(&mut self, name: &str, value: Value) -> Result<(), ScriptError> {
        if let Some(slot) = self.frames.last_mut().and_then(|f| f.locals.get_mut(name)) {
            *slot = Some(value);
            return Ok(());
        }
        match self.globals.get_mut(name) {
            Some(slot) => {
                *slot = Some(value);
                Ok(())
            }
            None => Err(ScriptError::generic(format!(
                "Variable '{}' used before declaration",
                name
            ))),
        }
    }

    /// Writes a global, declaring it first if needed.
    pub fn set_global(&mut self, name: &str, value: Value) {
        self.globals.insert(name.to_string(), Some(value));
    }

    /// Writes `name` wherever it is visible, or declares it in the active
    /// frame (or globally, outside functions).
    pub fn write_or_declare(&mut self, name: &str, value: Value) {
        if self.is_declared(name) {
            // Declared somewhere visible, so the write cannot fail.
            let _ = self.write(name, value);
            return;
        }
        match self.frames.last_mut() {
            Some(frame) => {
                frame.locals.insert(name.to_string(), Some(value));
            }
            None => self.set_global(name, value),
        }
    }

    /// Writes `name` if visible, otherwise declares it as a global.
    pub fn write_or_declare_global(&mut self, name: &str, value: Value) {
        if self.is_declared(name) {
            let _ = self.write(name, value);
        } else {
            self.set_global(name, value);
        }
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name).and_then(Option::as_ref)
    }

    pub fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop_frame(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Detaches all frames so code runs at global level, e.g. an included file.
    pub fn suspend_frames(&mut self) -> Vec<Frame> {
        std::mem::take(&mut self.frames)
    }

    pub fn restore_frames(&mut self, frames: Vec<Frame>) {
        self.frames = frames;
    }
}
