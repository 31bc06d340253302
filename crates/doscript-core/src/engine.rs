//! Statement execution.
//!
//! Every statement produces a [`Signal`]. Blocks stop at the first signal that
//! is not [`Signal::Normal`] and hand it to their parent, which either absorbs
//! it (loops absorb `Breaking`/`Continuing`, `try` absorbs matching errors,
//! calls absorb `Returning`) or passes it on.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, info};

use crate::ast::*;
use crate::builtins::{self, Dispatch};
use crate::error::{Interrupt, ScriptError};
use crate::eval::{evaluate, EvalContext};
use crate::host::{CallForm, Host, HostCall};
use crate::loader::{has_glob_meta, EntryInfo, ModuleLoader};
use crate::parser;
use crate::scope::{Frame, Scope};
use crate::value::Value;

/// Nested user-function calls allowed before the run is aborted.
pub const MAX_CALL_DEPTH: usize = 256;

/// Outcome of executing one statement or block.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Normal,
    Returning(Value),
    Breaking,
    Continuing,
    Raised(ScriptError),
    /// `exit N`: unwinds everything, `try` included.
    Exit(i32),
}

/// How a run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Exited(i32),
}

impl Outcome {
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Completed => 0,
            Outcome::Exited(code) => code,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub dry_run: bool,
    /// Pushed onto the search path stack in order.
    pub search_paths: Vec<PathBuf>,
    /// Exposed to scripts as the global list `args`.
    pub args: Vec<String>,
}

/// Result of a command statement: a value, or the signal of an inline macro.
enum CommandOutcome {
    Value(Value),
    Macro(Signal),
}

/// One independent interpreter: its own globals, registries and host.
pub struct Interpreter {
    host: Box<dyn Host>,
    scope: Scope,
    functions: HashMap<String, Rc<FunctionDef>>,
    macros: HashMap<String, Rc<MacroDef>>,
    loader: ModuleLoader,
    dry_run: bool,
    loop_depth: usize,
    function_depth: usize,
}

impl Interpreter {
    pub fn new(host: Box<dyn Host>, options: RunOptions) -> Self {
        let mut loader = ModuleLoader::new();
        for dir in &options.search_paths {
            loader.push_search_path(dir);
        }
        let mut scope = Scope::new();
        let args = options.args.into_iter().map(Value::String).collect();
        scope.set_global("args", Value::List(args));

        Self {
            host,
            scope,
            functions: HashMap::new(),
            macros: HashMap::new(),
            loader,
            dry_run: options.dry_run,
            loop_depth: 0,
            function_depth: 0,
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn loader(&self) -> &ModuleLoader {
        &self.loader
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn has_macro(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    /// Runs a script file with its directory on top of the search path
    /// stack. The file counts as included, so including it again is a no-op.
    pub fn run_file(&mut self, path: &Path) -> Result<Outcome, ScriptError> {
        let program = ModuleLoader::load(path)?;
        self.loader.mark_included(path);

        let saved_len = self.loader.search_paths().len();
        let dir = path
            .canonicalize()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| self.loader.base_dir());
        self.loader.push_search_path(&dir);
        info!(script = %path.display(), "running script");

        let result = self.run_program(&program);
        self.loader.truncate_search_paths(saved_len);
        result
    }

    /// Parses and runs source text. `file` is used for diagnostics.
    pub fn run_source(&mut self, source: &str, file: &Path) -> Result<Outcome, ScriptError> {
        let program = parser::parse(source, file)?;
        self.run_program(&program)
    }

    pub fn run_program(&mut self, program: &Program) -> Result<Outcome, ScriptError> {
        match self.exec_block(&program.statements) {
            Signal::Normal => Ok(Outcome::Completed),
            Signal::Exit(code) => Ok(Outcome::Exited(code)),
            Signal::Raised(e) => Err(e),
            Signal::Returning(_) => Err(ScriptError::generic("'return' used outside a function")),
            Signal::Breaking | Signal::Continuing => {
                Err(ScriptError::generic("'break'/'continue' used outside a loop"))
            }
        }
    }

    fn exec_block(&mut self, statements: &[Statement]) -> Signal {
        for statement in statements {
            match self.exec_statement(statement) {
                Signal::Normal => {}
                signal => return signal,
            }
        }
        Signal::Normal
    }

    fn exec_statement(&mut self, statement: &Statement) -> Signal {
        let origin = || statement.location.origin();
        match self.run_statement(statement) {
            Ok(Signal::Raised(e)) | Err(Interrupt::Raised(e)) => Signal::Raised(e.located(origin)),
            Ok(signal) => signal,
            Err(Interrupt::Exit(code)) => Signal::Exit(code),
        }
    }

    fn eval(&mut self, expr: &Expression) -> Result<Value, Interrupt> {
        evaluate(expr, self)
    }

    fn run_statement(&mut self, statement: &Statement) -> Result<Signal, Interrupt> {
        match &statement.kind {
            StatementKind::Assign { target, value } => {
                let value = match value {
                    AssignValue::Expr(expr) => self.eval(expr)?,
                    AssignValue::Command(call) => {
                        match self.run_command(call, CallForm::Captured)? {
                            CommandOutcome::Value(v) => v,
                            CommandOutcome::Macro(Signal::Normal) => Value::Integer(0),
                            CommandOutcome::Macro(signal) => return Ok(signal),
                        }
                    }
                };
                self.scope.write(target, value)?;
                Ok(Signal::Normal)
            }

            StatementKind::DeclareGlobal(names) => {
                self.scope.declare_global(names);
                Ok(Signal::Normal)
            }

            StatementKind::DeclareLocal(names) => {
                self.scope.declare_local(names)?;
                Ok(Signal::Normal)
            }

            StatementKind::If {
                condition,
                then_block,
                else_block,
            } => {
                let taken = match self.eval(condition)? {
                    Value::Boolean(b) => b,
                    other => {
                        return Err(ScriptError::data(format!(
                            "Condition must be a boolean, got {}",
                            other.type_name()
                        ))
                        .into())
                    }
                };
                if taken {
                    Ok(self.exec_block(then_block))
                } else if let Some(block) = else_block {
                    Ok(self.exec_block(block))
                } else {
                    Ok(Signal::Normal)
                }
            }

            StatementKind::Repeat { count, body } => {
                let n = self.eval_count(count, "repeat")?;
                Ok(self.run_loop(0..n, body, |_, _| Ok(())))
            }

            StatementKind::Loop { count, body } => match count {
                LoopCount::Times(expr) => {
                    let n = self.eval_count(expr, "loop")?;
                    Ok(self.run_loop(0..n, body, |_, _| Ok(())))
                }
                LoopCount::Forever => Ok(self.run_loop(std::iter::repeat(()), body, |_, _| Ok(()))),
            },

            StatementKind::ForEach { prefix, source, body } => {
                let items = self.collect_for_each(source)?;
                debug!(prefix = %prefix, count = items.len(), "for_each");
                Ok(self.run_loop(items, body, |interp, item| interp.bind_for_each(prefix, item)))
            }

            StatementKind::ForEachLine { variable, file, body } => {
                let raw = self.eval(file)?.to_string();
                let path = self.loader.resolve(&raw);
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    ScriptError::file(format!("Failed to read file '{}': {}", raw, e))
                })?;
                let lines: Vec<Value> = content.lines().map(Value::from).collect();
                Ok(self.run_loop(lines, body, |interp, line| {
                    interp.scope.write_or_declare_global(variable, line);
                    Ok(())
                }))
            }

            StatementKind::Try { body, catches } => match self.exec_block(body) {
                Signal::Raised(e) => match catches.iter().find(|c| c.matches(e.kind)) {
                    Some(clause) => {
                        debug!(kind = %e.kind, message = %e.message, "error caught");
                        Ok(self.exec_block(&clause.body))
                    }
                    None => Ok(Signal::Raised(e)),
                },
                signal => Ok(signal),
            },

            StatementKind::FunctionDef(def) => {
                debug!(name = %def.name, params = def.params.len(), "function defined");
                self.functions.insert(def.name.clone(), Rc::clone(def));
                Ok(Signal::Normal)
            }

            StatementKind::MacroDef(def) => {
                debug!(name = %def.name, "macro defined");
                self.macros.insert(def.name.clone(), Rc::clone(def));
                Ok(Signal::Normal)
            }

            StatementKind::Return(expr) => {
                if self.function_depth == 0 {
                    return Err(ScriptError::generic("'return' used outside a function").into());
                }
                let value = match expr {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Unit,
                };
                Ok(Signal::Returning(value))
            }

            StatementKind::Break => {
                if self.loop_depth == 0 {
                    return Err(ScriptError::generic("'break' used outside a loop").into());
                }
                Ok(Signal::Breaking)
            }

            StatementKind::Continue => {
                if self.loop_depth == 0 {
                    return Err(ScriptError::generic("'continue' used outside a loop").into());
                }
                Ok(Signal::Continuing)
            }

            StatementKind::Include(expr) => {
                let raw = self.eval(expr)?.to_string();
                self.include(&raw)
            }

            StatementKind::ScriptPath(op) => {
                match op {
                    ScriptPathOp::Add(expr) => {
                        let dir = self.eval(expr)?.to_string();
                        self.loader.push_search_path(dir);
                    }
                    ScriptPathOp::Remove(expr) => {
                        let dir = self.eval(expr)?.to_string();
                        if !self.loader.remove_search_path(&dir) {
                            debug!(dir = %dir, "search path not present");
                        }
                    }
                    ScriptPathOp::List => {
                        let paths: Vec<String> = self
                            .loader
                            .search_paths()
                            .iter()
                            .map(|p| p.display().to_string())
                            .collect();
                        for path in paths {
                            self.call_host("say", &[Value::String(path)], CallForm::Statement)?;
                        }
                    }
                }
                Ok(Signal::Normal)
            }

            StatementKind::Ask { target, prompt } => {
                let prompt = self.eval(prompt)?.to_string();
                let answer = self.call_host("ask", &[Value::String(prompt)], CallForm::Captured)?;
                self.scope.write_or_declare(target, answer);
                Ok(Signal::Normal)
            }

            StatementKind::Exit(expr) => {
                let code = match expr {
                    None => 0,
                    Some(expr) => match self.eval(expr)? {
                        Value::Integer(n) => i32::try_from(n).map_err(|_| {
                            ScriptError::data(format!("Exit code out of range: {}", n))
                        })?,
                        other => {
                            return Err(ScriptError::data(format!(
                                "Exit code must be an integer, got {}",
                                other.type_name()
                            ))
                            .into())
                        }
                    },
                };
                Ok(Signal::Exit(code))
            }

            StatementKind::Call(call) => match self.run_command(call, CallForm::Statement)? {
                CommandOutcome::Value(_) => Ok(Signal::Normal),
                CommandOutcome::Macro(signal) => Ok(signal),
            },

            StatementKind::Expression(expr) => {
                self.eval(expr)?;
                Ok(Signal::Normal)
            }
        }
    }

    /// Evaluates a repeat/loop count. Negative counts run zero times.
    fn eval_count(&mut self, expr: &Expression, keyword: &str) -> Result<i64, Interrupt> {
        let n = match self.eval(expr)? {
            Value::Integer(n) => n,
            Value::Float(x) if x.is_finite() => x.trunc() as i64,
            other => {
                return Err(ScriptError::data(format!(
                    "'{}' count must be a number, got {}",
                    keyword,
                    other.type_name()
                ))
                .into())
            }
        };
        Ok(n.max(0))
    }

    /// Runs `body` once per item, absorbing `Breaking` and `Continuing`.
    fn run_loop<I, T, F>(&mut self, items: I, body: &[Statement], mut bind: F) -> Signal
    where
        I: IntoIterator<Item = T>,
        F: FnMut(&mut Self, T) -> Result<(), ScriptError>,
    {
        self.loop_depth += 1;
        let mut result = Signal::Normal;
        for item in items {
            if let Err(e) = bind(self, item) {
                result = Signal::Raised(e);
                break;
            }
            match self.exec_block(body) {
                Signal::Normal | Signal::Continuing => {}
                Signal::Breaking => break,
                signal => {
                    result = signal;
                    break;
                }
            }
        }
        self.loop_depth -= 1;
        result
    }

    fn collect_for_each(&mut self, source: &ForEachSource) -> Result<Vec<LoopItem>, Interrupt> {
        let entries = |paths: Vec<PathBuf>| -> Vec<LoopItem> {
            paths.into_iter().map(LoopItem::Entry).collect()
        };
        match source {
            ForEachSource::Scope(scope) => Ok(entries(self.loader.enumerate_scope(*scope)?)),
            ForEachSource::Pattern(expr) => {
                let pattern = self.eval(expr)?.to_string();
                Ok(entries(self.loader.enumerate(&pattern)?))
            }
            ForEachSource::Items(exprs) => {
                let mut values = Vec::with_capacity(exprs.len());
                for expr in exprs {
                    values.push(self.eval(expr)?);
                }
                if values.len() == 1 {
                    match values.pop() {
                        Some(Value::String(s)) if has_glob_meta(&s) => {
                            return Ok(entries(self.loader.enumerate(&s)?));
                        }
                        Some(Value::List(items)) => {
                            return Ok(items.into_iter().map(LoopItem::Value).collect());
                        }
                        Some(other) => values.push(other),
                        None => {}
                    }
                }
                Ok(values.into_iter().map(LoopItem::Value).collect())
            }
        }
    }

    fn bind_for_each(&mut self, prefix: &str, item: LoopItem) -> Result<(), ScriptError> {
        match item {
            LoopItem::Value(value) => {
                self.scope.write_or_declare_global(prefix, value);
            }
            LoopItem::Entry(path) => {
                let info = EntryInfo::describe(&path)?;
                self.scope.write_or_declare_global(prefix, Value::String(info.name.clone()));
                let size = i64::try_from(info.size).unwrap_or(i64::MAX);
                let fields = [
                    ("name", Value::String(info.name.clone())),
                    ("path", Value::String(info.path.clone())),
                    ("ext", Value::String(info.ext.clone())),
                    ("size", Value::Integer(size)),
                    ("size_kb", Value::Float(info.size_kb())),
                    ("size_mb", Value::Float(info.size_mb())),
                    ("is_dir", Value::Boolean(info.is_dir)),
                    ("is_empty", Value::Boolean(info.is_empty)),
                    ("created", Value::String(info.created)),
                    ("modified", Value::String(info.modified)),
                    ("age_days", Value::Integer(info.age_days)),
                    ("age_hours", Value::Integer(info.age_hours)),
                ];
                for (suffix, value) in fields {
                    self.scope.set_global(&format!("{}_{}", prefix, suffix), value);
                }
            }
        }
        Ok(())
    }

    /// Runs an included file at global level, once per canonical path.
    fn include(&mut self, raw: &str) -> Result<Signal, Interrupt> {
        let path = match self.loader.begin_include(raw)? {
            Some(path) => path,
            None => return Ok(Signal::Normal),
        };
        info!(path = %path.display(), "including file");
        let program = ModuleLoader::load(&path)?;

        let frames = self.scope.suspend_frames();
        let loop_depth = std::mem::replace(&mut self.loop_depth, 0);
        let function_depth = std::mem::replace(&mut self.function_depth, 0);

        let signal = self.exec_block(&program.statements);

        self.function_depth = function_depth;
        self.loop_depth = loop_depth;
        self.scope.restore_frames(frames);
        Ok(signal)
    }

    fn run_command(
        &mut self,
        call: &CommandCall,
        form: CallForm,
    ) -> Result<CommandOutcome, Interrupt> {
        let mut args = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            args.push(self.eval(arg)?);
        }

        if call.name == "run" {
            let target = args.first().and_then(Value::as_str);
            if let Some(def) = target.and_then(|name| self.macros.get(name)).cloned() {
                debug!(name = %def.name, "running macro");
                return Ok(CommandOutcome::Macro(self.exec_block(&def.body)));
            }
        }

        Ok(CommandOutcome::Value(self.call_host(&call.name, &args, form)?))
    }

    fn call_host(
        &mut self,
        name: &str,
        args: &[Value],
        form: CallForm,
    ) -> Result<Value, ScriptError> {
        let spec = builtins::lookup(name)
            .ok_or_else(|| ScriptError::generic(format!("Unknown builtin: {}", name)))?;
        spec.check_arity(args.len())?;
        let base_dir = self.loader.base_dir();
        let call = HostCall {
            name: spec.name,
            args,
            form,
            dry_run: self.dry_run && spec.mutating,
            base_dir: &base_dir,
        };
        self.host.invoke(&call)
    }

    fn call_user_function(
        &mut self,
        def: &FunctionDef,
        args: Vec<Value>,
    ) -> Result<Value, Interrupt> {
        if args.len() > def.params.len() {
            return Err(ScriptError::generic(format!(
                "Function '{}' takes {} argument{}, got {}",
                def.name,
                def.params.len(),
                if def.params.len() == 1 { "" } else { "s" },
                args.len()
            ))
            .into());
        }
        if self.scope.depth() >= MAX_CALL_DEPTH {
            return Err(ScriptError::generic(format!(
                "Maximum call depth ({}) exceeded in '{}'",
                MAX_CALL_DEPTH, def.name
            ))
            .into());
        }

        debug!(name = %def.name, args = args.len(), "calling function");
        self.scope.push_frame(Frame::with_params(&def.params, args));
        let loop_depth = std::mem::replace(&mut self.loop_depth, 0);
        self.function_depth += 1;

        let signal = self.exec_block(&def.body);

        self.function_depth -= 1;
        self.loop_depth = loop_depth;
        self.scope.pop_frame();

        match signal {
            Signal::Normal => Ok(Value::Unit),
            Signal::Returning(value) => Ok(value),
            Signal::Raised(e) => Err(Interrupt::Raised(e)),
            Signal::Exit(code) => Err(Interrupt::Exit(code)),
            Signal::Breaking | Signal::Continuing => {
                Err(ScriptError::generic("'break'/'continue' used outside a loop").into())
            }
        }
    }
}

enum LoopItem {
    Value(Value),
    Entry(PathBuf),
}

impl EvalContext for Interpreter {
    fn lookup(&self, name: &str) -> Result<Value, ScriptError> {
        self.scope.read(name)
    }

    fn call_function(&mut self, name: &str, args: Vec<Value>) -> Result<Value, Interrupt> {
        if let Some(spec) = builtins::function(name) {
            spec.check_arity(args.len())?;
            return match spec.dispatch {
                Dispatch::Pure(f) => Ok(f(&args)?),
                Dispatch::Host => Ok(self.call_host(name, &args, CallForm::Captured)?),
            };
        }
        match self.functions.get(name).cloned() {
            Some(def) => self.call_user_function(&def, args),
            None => Err(ScriptError::data(format!("Unknown function: {}", name)).into()),
        }
    }
}
