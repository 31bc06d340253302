//! Builtin registry.
//!
//! Every builtin the language knows is listed in [`BUILTINS`] with its arity,
//! whether it is a statement command or an expression function, and whether
//! the engine evaluates it itself (pure string and conversion helpers) or
//! forwards it to the [`Host`](crate::host::Host).

use chrono::Local;

use crate::error::ScriptError;
use crate::value::Value;

pub type PureFn = fn(&[Value]) -> Result<Value, ScriptError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinForm {
    /// Statement syntax: `say x`, `copy a to b`.
    Command,
    /// Call syntax inside expressions: `length(x)`.
    Function,
}

#[derive(Clone, Copy)]
pub enum Dispatch {
    Pure(PureFn),
    Host,
}

#[derive(Clone, Copy)]
pub struct BuiltinSpec {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    pub form: BuiltinForm,
    pub dispatch: Dispatch,
    /// Receives the dry-run flag.
    pub mutating: bool,
}

impl std::fmt::Debug for BuiltinSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinSpec")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .field("form", &self.form)
            .field("mutating", &self.mutating)
            .finish()
    }
}

impl BuiltinSpec {
    pub fn check_arity(&self, got: usize) -> Result<(), ScriptError> {
        if got >= self.min_args && got <= self.max_args {
            return Ok(());
        }
        let expected = if self.min_args == self.max_args {
            self.min_args.to_string()
        } else {
            format!("{} to {}", self.min_args, self.max_args)
        };
        Err(ScriptError::generic(format!(
            "'{}' expects {} argument{}, got {}",
            self.name,
            expected,
            if self.max_args == 1 { "" } else { "s" },
            got
        )))
    }
}

const fn command(
    name: &'static str,
    min_args: usize,
    max_args: usize,
    mutating: bool,
) -> BuiltinSpec {
    BuiltinSpec {
        name,
        min_args,
        max_args,
        form: BuiltinForm::Command,
        dispatch: Dispatch::Host,
        mutating,
    }
}

const fn host_fn(
    name: &'static str,
    min_args: usize,
    max_args: usize,
    mutating: bool,
) -> BuiltinSpec {
    BuiltinSpec {
        name,
        min_args,
        max_args,
        form: BuiltinForm::Function,
        dispatch: Dispatch::Host,
        mutating,
    }
}

const fn pure(name: &'static str, min_args: usize, max_args: usize, f: PureFn) -> BuiltinSpec {
    BuiltinSpec {
        name,
        min_args,
        max_args,
        form: BuiltinForm::Function,
        dispatch: Dispatch::Pure(f),
        mutating: false,
    }
}

pub static BUILTINS: &[BuiltinSpec] = &[
    // Output and interaction
    command("say", 1, 1, false),
    command("log", 1, 1, false),
    command("warn", 1, 1, false),
    command("error", 1, 1, false),
    command("ask", 1, 1, false),
    command("pause", 0, 0, false),
    command("wait", 1, 1, false),
    // Filesystem
    command("make_folder", 1, 1, true),
    command("make_file", 2, 2, true),
    command("copy", 2, 2, true),
    command("move", 2, 2, true),
    command("delete", 1, 1, true),
    // Network
    command("download", 2, 2, true),
    command("upload", 2, 2, true),
    command("ping", 1, 1, false),
    // Processes
    command("run", 1, 1, true),
    command("capture", 1, 1, true),
    command("kill", 1, 1, true),
    // Host-backed functions
    host_fn("exists", 1, 1, false),
    host_fn("read_file", 1, 1, false),
    host_fn("http_get", 1, 1, false),
    host_fn("http_post", 2, 2, true),
    host_fn("http_put", 2, 2, true),
    host_fn("http_delete", 1, 1, true),
    // Pure functions
    pure("date", 0, 0, date),
    pure("time", 0, 0, time),
    pure("datetime", 0, 0, datetime),
    pure("extension", 1, 1, extension),
    pure("substring", 2, 3, substring),
    pure("replace", 3, 3, replace),
    pure("length", 1, 1, length),
    pure("uppercase", 1, 1, uppercase),
    pure("lowercase", 1, 1, lowercase),
    pure("trim", 1, 1, trim),
    pure("contains", 2, 2, contains),
    pure("startswith", 2, 2, starts_with),
    pure("starts_with", 2, 2, starts_with),
    pure("endswith", 2, 2, ends_with),
    pure("ends_with", 2, 2, ends_with),
    pure("split", 1, 2, split),
    pure("join", 1, 2, join),
    pure("str", 1, 1, to_str),
    pure("int", 1, 1, to_int),
    pure("float", 1, 1, to_float),
];

pub fn lookup(name: &str) -> Option<&'static BuiltinSpec> {
    BUILTINS.iter().find(|spec| spec.name == name)
}

/// Looks up a builtin callable from an expression.
pub fn function(name: &str) -> Option<&'static BuiltinSpec> {
    lookup(name).filter(|spec| spec.form == BuiltinForm::Function)
}

fn text(args: &[Value], index: usize) -> String {
    args.get(index).map(Value::to_string).unwrap_or_default()
}

fn integer_arg(args: &[Value], index: usize, func: &str) -> Result<i64, ScriptError> {
    match args.get(index) {
        Some(Value::Integer(n)) => Ok(*n),
        Some(Value::Float(x)) if x.fract() == 0.0 && x.is_finite() => Ok(*x as i64),
        Some(other) => Err(ScriptError::data(format!(
            "{}() expects an integer for argument {}, got {}",
            func,
            index + 1,
            other.type_name()
        ))),
        None => Err(ScriptError::data(format!("{}() is missing argument {}", func, index + 1))),
    }
}

fn date(_: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::String(Local::now().format("%Y-%m-%d").to_string()))
}

fn time(_: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::String(Local::now().format("%H:%M:%S").to_string()))
}

fn datetime(_: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::String(Local::now().format("%Y-%m-%d %H:%M:%S").to_string()))
}

/// Extension of the final path component including the dot, ignoring
/// leading dots (`.bashrc` has no extension).
pub(crate) fn extension_of(path: &str) -> String {
    let name = path.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(path);
    let stem_start = name.len() - name.trim_start_matches('.').len();
    match name[stem_start..].rfind('.') {
        Some(dot) => name[stem_start + dot..].to_string(),
        None => String::new(),
    }
}

fn extension(args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::String(extension_of(&text(args, 0))))
}

/// Normalises a possibly negative index against `len`, counting from the end.
fn clamp_index(index: i64, len: usize) -> usize {
    let len = len as i64;
    let i = if index < 0 { len + index } else { index };
    i.clamp(0, len) as usize
}

fn substring(args: &[Value]) -> Result<Value, ScriptError> {
    let chars: Vec<char> = text(args, 0).chars().collect();
    let start_raw = integer_arg(args, 1, "substring")?;
    let start = clamp_index(start_raw, chars.len());
    let end = if args.len() > 2 {
        let count = integer_arg(args, 2, "substring")?;
        clamp_index(start_raw.saturating_add(count), chars.len())
    } else {
        chars.len()
    };
    if end <= start {
        return Ok(Value::String(String::new()));
    }
    Ok(Value::String(chars[start..end].iter().collect()))
}

fn replace(args: &[Value]) -> Result<Value, ScriptError> {
    let from = text(args, 1);
    if from.is_empty() {
        return Ok(Value::String(text(args, 0)));
    }
    Ok(Value::String(text(args, 0).replace(&from, &text(args, 2))))
}

fn length(args: &[Value]) -> Result<Value, ScriptError> {
    let n = match args.first() {
        Some(Value::List(items)) => items.len(),
        _ => text(args, 0).chars().count(),
    };
    Ok(Value::Integer(n as i64))
}

fn uppercase(args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::String(text(args, 0).to_uppercase()))
}

fn lowercase(args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::String(text(args, 0).to_lowercase()))
}

fn trim(args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::String(text(args, 0).trim().to_string()))
}

fn contains(args: &[Value]) -> Result<Value, ScriptError> {
    let found = match args.first() {
        Some(Value::List(items)) => match args.get(1) {
            Some(needle) => items.contains(needle),
            None => false,
        },
        _ => text(args, 0).contains(&text(args, 1)),
    };
    Ok(Value::Boolean(found))
}

fn starts_with(args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::Boolean(text(args, 0).starts_with(&text(args, 1))))
}

fn ends_with(args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::Boolean(text(args, 0).ends_with(&text(args, 1))))
}

fn split(args: &[Value]) -> Result<Value, ScriptError> {
    let s = text(args, 0);
    let parts: Vec<Value> = match args.get(1) {
        None => s.split_whitespace().map(Value::from).collect(),
        Some(sep) => {
            let sep = sep.to_string();
            if sep.is_empty() {
                return Err(ScriptError::data("split() separator must not be empty"));
            }
            s.split(sep.as_str()).map(Value::from).collect()
        }
    };
    Ok(Value::List(parts))
}

fn join(args: &[Value]) -> Result<Value, ScriptError> {
    let items = match args.first() {
        Some(Value::List(items)) => items,
        Some(other) => {
            return Err(ScriptError::data(format!(
                "join() expects a list, got {}",
                other.type_name()
            )))
        }
        None => return Err(ScriptError::data("join() is missing argument 1")),
    };
    let sep = args.get(1).map(Value::to_string).unwrap_or_else(|| " ".to_string());
    let joined = items.iter().map(Value::to_string).collect::<Vec<_>>().join(&sep);
    Ok(Value::String(joined))
}

fn to_str(args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::String(text(args, 0)))
}

fn to_int(args: &[Value]) -> Result<Value, ScriptError> {
    match args.first() {
        Some(Value::Integer(n)) => Ok(Value::Integer(*n)),
        Some(Value::Float(x)) => {
            let t = x.trunc();
            if t.is_finite() && t >= i64::MIN as f64 && t <= i64::MAX as f64 {
                Ok(Value::Integer(t as i64))
            } else {
                Err(ScriptError::data(format!("Cannot convert {} to integer", x)))
            }
        }
        Some(Value::Boolean(b)) => Ok(Value::Integer(i64::from(*b))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| ScriptError::data(format!("Cannot convert '{}' to integer", s))),
        Some(other) => Err(ScriptError::data(format!(
            "Cannot convert {} to integer",
            other.type_name()
        ))),
        None => Err(ScriptError::data("int() is missing argument 1")),
    }
}

fn to_float(args: &[Value]) -> Result<Value, ScriptError> {
    match args.first() {
        Some(Value::Integer(n)) => Ok(Value::Float(*n as f64)),
        Some(Value::Float(x)) => Ok(Value::Float(*x)),
        Some(Value::Boolean(b)) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| ScriptError::data(format!("Cannot convert '{}' to float", s))),
        Some(other) => Err(ScriptError::data(format!(
            "Cannot convert {} to float",
            other.type_name()
        ))),
        None => Err(ScriptError::data("float() is missing argument 1")),
    }
}
