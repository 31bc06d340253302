//! The boundary between the engine and the outside world.
//!
//! The engine never touches the filesystem, network or processes for builtin
//! commands itself. It validates the call against [`crate::builtins`] and
//! hands it to a [`Host`].

use std::path::Path;

use crate::error::ScriptError;
use crate::value::Value;

/// How the result of a host call is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallForm {
    /// Bare statement (`run "make"`); the result is discarded.
    Statement,
    /// Assignment or expression context (`code = run "make"`).
    Captured,
}

/// One validated builtin invocation.
#[derive(Debug)]
pub struct HostCall<'a> {
    pub name: &'a str,
    pub args: &'a [Value],
    pub form: CallForm,
    /// Set only for mutating builtins when the run is a dry run.
    pub dry_run: bool,
    /// Directory relative paths are resolved against.
    pub base_dir: &'a Path,
}

impl HostCall<'_> {
    /// String form of argument `index`, or an empty string if absent.
    pub fn arg(&self, index: usize) -> String {
        self.args.get(index).map(Value::to_string).unwrap_or_default()
    }

    /// Resolves a path argument against [`HostCall::base_dir`].
    pub fn path_arg(&self, index: usize) -> std::path::PathBuf {
        let raw = self.arg(index);
        let path = Path::new(&raw);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

/// Implements the side-effecting builtins.
pub trait Host {
    fn invoke(&mut self, call: &HostCall<'_>) -> Result<Value, ScriptError>;
}

impl<H: Host + ?Sized> Host for Box<H> {
    fn invoke(&mut self, call: &HostCall<'_>) -> Result<Value, ScriptError> {
        (**self).invoke(call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_arg_resolution() {
        let args = [Value::from("out/a.txt"), Value::from("/abs/b.txt")];
        let call = HostCall {
            name: "copy",
            args: &args,
            form: CallForm::Statement,
            dry_run: false,
            base_dir: Path::new("/work"),
        };
        assert_eq!(call.path_arg(0), Path::new("/work/out/a.txt"));
        assert_eq!(call.path_arg(1), Path::new("/abs/b.txt"));
        assert_eq!(call.arg(5), "");
    }
}
