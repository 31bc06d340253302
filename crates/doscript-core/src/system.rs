//! The default [`Host`]: real filesystem, processes, HTTP and terminal I/O.

use std::fmt::Display;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use ureq::{Agent, AgentBuilder};

use crate::config::DoScriptConfig;
use crate::error::ScriptError;
use crate::host::{CallForm, Host, HostCall};
use crate::value::Value;

pub struct SystemHost {
    out: Box<dyn Write>,
    err: Box<dyn Write>,
    input: Box<dyn BufRead>,
    agent: Agent,
    shell: Vec<String>,
}

fn default_shell() -> Vec<String> {
    if cfg!(windows) {
        vec!["cmd".to_string(), "/C".to_string()]
    } else {
        vec!["sh".to_string(), "-c".to_string()]
    }
}

fn file_err(action: &str, target: &str, e: impl Display) -> ScriptError {
    ScriptError::file(format!("Failed to {} '{}': {}", action, target, e))
}

fn network_err(action: &str, target: &str, e: impl Display) -> ScriptError {
    ScriptError::network(format!("Failed to {} '{}': {}", action, target, e))
}

fn process_err(action: &str, target: &str, e: impl Display) -> ScriptError {
    ScriptError::process(format!("Failed to {} '{}': {}", action, target, e))
}

fn output_err(e: io::Error) -> ScriptError {
    ScriptError::file(format!("Failed to write output: {}", e))
}

impl SystemHost {
    pub fn new(config: &DoScriptConfig) -> Self {
        let agent = AgentBuilder::new()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build();
        let shell = match config.shell.as_deref() {
            Some(shell) if !shell.trim().is_empty() => {
                shell.split_whitespace().map(str::to_string).collect()
            }
            _ => default_shell(),
        };
        Self {
            out: Box::new(io::stdout()),
            err: Box::new(io::stderr()),
            input: Box::new(io::BufReader::new(io::stdin())),
            agent,
            shell,
        }
    }

    /// Replaces the terminal streams, e.g. to capture output in tests.
    pub fn with_io(
        mut self,
        out: Box<dyn Write>,
        err: Box<dyn Write>,
        input: Box<dyn BufRead>,
    ) -> Self {
        self.out = out;
        self.err = err;
        self.input = input;
        self
    }

    fn shell_command(&self, command: &str) -> Command {
        let (program, flags) = match self.shell.split_first() {
            Some((program, flags)) => (program.as_str(), flags),
            None => ("sh", &[][..]),
        };
        let mut cmd = Command::new(program);
        cmd.args(flags).arg(command);
        cmd
    }

    fn read_line(&mut self) -> Result<String, ScriptError> {
        let mut line = String::new();
        self.input
            .read_line(&mut line)
            .map_err(|e| ScriptError::file(format!("Failed to read input: {}", e)))?;
        Ok(line.trim_end_matches(&['\r', '\n'][..]).to_string())
    }

    fn simulate(&mut self, call: &HostCall<'_>) -> Result<Value, ScriptError> {
        let args: Vec<String> = call.args.iter().map(|a| format!("\"{}\"", a)).collect();
        info!(builtin = call.name, "dry run");
        writeln!(self.out, "[dry-run] {} {}", call.name, args.join(" ")).map_err(output_err)?;
        Ok(match (call.name, call.form) {
            ("run", CallForm::Captured) => Value::Integer(0),
            ("capture", _) | ("http_post", _) | ("http_put", _) | ("http_delete", _) => {
                Value::String(String::new())
            }
            _ => Value::Unit,
        })
    }

    fn http(&self, method: &str, url: &str, body: Option<&str>) -> Result<Value, ScriptError> {
        let request = self.agent.request(method, url);
        let response = match body {
            Some(body) => request.send_string(body),
            None => request.call(),
        };
        let response = response.map_err(|e| network_err(&method.to_lowercase(), url, e))?;
        let text = response
            .into_string()
            .map_err(|e| network_err("read response from", url, e))?;
        Ok(Value::String(text))
    }

    fn download(&self, url: &str, dest: &Path) -> Result<(), ScriptError> {
        let response = self.agent.get(url).call().map_err(|e| network_err("download", url, e))?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| file_err("create folder", &parent.display().to_string(), e))?;
        }
        let target = dest.display().to_string();
        let mut file = fs::File::create(dest).map_err(|e| file_err("create file", &target, e))?;
        io::copy(&mut response.into_reader(), &mut file)
            .map_err(|e| network_err("download", url, e))?;
        Ok(())
    }

    fn run(&self, command: &str, form: CallForm) -> Result<Value, ScriptError> {
        let status = self
            .shell_command(command)
            .status()
            .map_err(|e| process_err("run", command, e))?;
        let code = status.code().unwrap_or(-1);
        if !status.success() {
            debug!(command, code, "command exited with non-zero status");
        }
        Ok(match form {
            CallForm::Captured => Value::Integer(i64::from(code)),
            CallForm::Statement => Value::Unit,
        })
    }

    fn capture(&self, command: &str) -> Result<Value, ScriptError> {
        let output = self
            .shell_command(command)
            .stderr(Stdio::inherit())
            .output()
            .map_err(|e| process_err("capture", command, e))?;
        Ok(Value::String(String::from_utf8_lossy(&output.stdout).trim().to_string()))
    }

    fn ping(&self, host: &str) -> Result<(), ScriptError> {
        let count_flag = if cfg!(windows) { "-n" } else { "-c" };
        let status = Command::new("ping")
            .args([count_flag, "1", host])
            .stdout(Stdio::null())
            .status()
            .map_err(|e| network_err("ping", host, e))?;
        if !status.success() {
            return Err(network_err("ping", host, "host unreachable"));
        }
        Ok(())
    }

    fn kill(&self, name: &str) -> Result<(), ScriptError> {
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("taskkill");
            c.args(["/F", "/IM", name]);
            c
        } else {
            let mut c = Command::new("pkill");
            c.arg(name);
            c
        };
        let status = cmd.status().map_err(|e| process_err("kill", name, e))?;
        if !status.success() {
            return Err(process_err("kill", name, "no matching process"));
        }
        Ok(())
    }
}

fn copy_recursive(src: &Path, dst: &Path) -> io::Result<()> {
    if src.is_dir() {
        fs::create_dir_all(dst)?;
        for entry in fs::read_dir(src)? {
            let entry = entry?;
            copy_recursive(&entry.path(), &dst.join(entry.file_name()))?;
        }
        Ok(())
    } else {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(src, dst).map(|_| ())
    }
}

impl Host for SystemHost {
    fn invoke(&mut self, call: &HostCall<'_>) -> Result<Value, ScriptError> {
        debug!(builtin = call.name, args = call.args.len(), "host call");

        if call.dry_run {
            return self.simulate(call);
        }

        match call.name {
            "say" => {
                writeln!(self.out, "{}", call.arg(0)).map_err(output_err)?;
            }
            "log" => {
                let msg = call.arg(0);
                info!(target: "doscript::script", "{}", msg);
                writeln!(self.out, "[LOG] {}", msg).map_err(output_err)?;
            }
            "warn" => {
                let msg = call.arg(0);
                warn!(target: "doscript::script", "{}", msg);
                writeln!(self.err, "[WARN] {}", msg).map_err(output_err)?;
            }
            "error" => {
                let msg = call.arg(0);
                error!(target: "doscript::script", "{}", msg);
                writeln!(self.err, "[ERROR] {}", msg).map_err(output_err)?;
            }
            "ask" => {
                write!(self.out, "{} ", call.arg(0)).map_err(output_err)?;
                self.out.flush().map_err(output_err)?;
                return Ok(Value::String(self.read_line()?));
            }
            "pause" => {
                write!(self.out, "Press Enter to continue...").map_err(output_err)?;
                self.out.flush().map_err(output_err)?;
                self.read_line()?;
            }
            "wait" => {
                let secs = call
                    .args
                    .first()
                    .and_then(Value::as_f64)
                    .ok_or_else(|| ScriptError::data("wait expects a number of seconds"))?;
                let duration = Duration::try_from_secs_f64(secs).map_err(|e| {
                    ScriptError::data(format!("Invalid wait duration {}: {}", secs, e))
                })?;
                thread::sleep(duration);
            }
            "make_folder" => {
                let path = call.path_arg(0);
                fs::create_dir_all(&path).map_err(|e| file_err("create folder", &call.arg(0), e))?;
            }
            "make_file" => {
                let path = call.path_arg(0);
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)
                        .map_err(|e| file_err("create file", &call.arg(0), e))?;
                }
                fs::write(&path, call.arg(1))
                    .map_err(|e| file_err("create file", &call.arg(0), e))?;
            }
            "copy" => {
                copy_recursive(&call.path_arg(0), &call.path_arg(1)).map_err(|e| {
                    ScriptError::file(format!(
                        "Failed to copy '{}' to '{}': {}",
                        call.arg(0),
                        call.arg(1),
                        e
                    ))
                })?;
            }
            "move" => {
                let dst = call.path_arg(1);
                let result = dst
                    .parent()
                    .map_or(Ok(()), fs::create_dir_all)
                    .and_then(|_| fs::rename(call.path_arg(0), &dst));
                result.map_err(|e| {
                    ScriptError::file(format!(
                        "Failed to move '{}' to '{}': {}",
                        call.arg(0),
                        call.arg(1),
                        e
                    ))
                })?;
            }
            "delete" => {
                let path = call.path_arg(0);
                let result = if path.is_dir() {
                    fs::remove_dir_all(&path)
                } else {
                    fs::remove_file(&path)
                };
                result.map_err(|e| file_err("delete", &call.arg(0), e))?;
            }
            "download" => self.download(&call.arg(0), &call.path_arg(1))?,
            "upload" => {
                let data =
                    fs::read(call.path_arg(0)).map_err(|e| file_err("read", &call.arg(0), e))?;
                let url = call.arg(1);
                self.agent
                    .post(&url)
                    .send_bytes(&data)
                    .map_err(|e| network_err("upload", &call.arg(0), e))?;
            }
            "ping" => self.ping(&call.arg(0))?,
            "run" => return self.run(&call.arg(0), call.form),
            "capture" => return self.capture(&call.arg(0)),
            "kill" => self.kill(&call.arg(0))?,
            "exists" => return Ok(Value::Boolean(call.path_arg(0).exists())),
            "read_file" => {
                return fs::read_to_string(call.path_arg(0))
                    .map(Value::String)
                    .map_err(|e| file_err("read file", &call.arg(0), e));
            }
            "http_get" => return self.http("GET", &call.arg(0), None),
            "http_post" => return self.http("POST", &call.arg(0), Some(&call.arg(1))),
            "http_put" => return self.http("PUT", &call.arg(0), Some(&call.arg(1))),
            "http_delete" => return self.http("DELETE", &call.arg(0), None),
            other => {
                return Err(ScriptError::generic(format!("Unknown builtin: {}", other)));
            }
        }

        Ok(Value::Unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.borrow()).into_owned()
        }
    }

    fn host_with(input: &str) -> (SystemHost, SharedBuf, SharedBuf) {
        let out = SharedBuf::default();
        let err = SharedBuf::default();
        let host = SystemHost::new(&DoScriptConfig::default()).with_io(
            Box::new(out.clone()),
            Box::new(err.clone()),
            Box::new(io::Cursor::new(input.as_bytes().to_vec())),
        );
        (host, out, err)
    }

    fn call<'a>(name: &'a str, args: &'a [Value], base: &'a Path) -> HostCall<'a> {
        HostCall {
            name,
            args,
            form: CallForm::Statement,
            dry_run: false,
            base_dir: base,
        }
    }

    #[test]
    fn test_output_streams() {
        let (mut host, out, err) = host_with("");
        let base = Path::new(".");
        host.invoke(&call("say", &[Value::from("hello")], base)).unwrap();
        host.invoke(&call("log", &[Value::from("step")], base)).unwrap();
        host.invoke(&call("warn", &[Value::from("careful")], base)).unwrap();
        host.invoke(&call("error", &[Value::from("bad")], base)).unwrap();
        assert_eq!(out.text(), "hello\n[LOG] step\n");
        assert_eq!(err.text(), "[WARN] careful\n[ERROR] bad\n");
    }

    #[test]
    fn test_ask_reads_a_line() {
        let (mut host, out, _) = host_with("Ada\nrest\n");
        let answer = host
            .invoke(&call("ask", &[Value::from("Name?")], Path::new(".")))
            .unwrap();
        assert_eq!(answer, Value::from("Ada"));
        assert_eq!(out.text(), "Name? ");
    }

    #[test]
    fn test_file_operations() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path();
        let (mut host, _, _) = host_with("");

        host.invoke(&call("make_folder", &[Value::from("out/nested")], base)).unwrap();
        assert!(base.join("out/nested").is_dir());

        host.invoke(&call("make_file", &[Value::from("out/a.txt"), Value::from("alpha")], base))
            .unwrap();
        assert_eq!(fs::read_to_string(base.join("out/a.txt")).unwrap(), "alpha");

        host.invoke(&call("copy", &[Value::from("out/a.txt"), Value::from("copy/b.txt")], base))
            .unwrap();
        assert!(base.join("copy/b.txt").is_file());

        host.invoke(&call("move", &[Value::from("copy/b.txt"), Value::from("moved/c.txt")], base))
            .unwrap();
        assert!(!base.join("copy/b.txt").exists());
        assert!(base.join("moved/c.txt").is_file());

        let read = host
            .invoke(&call("read_file", &[Value::from("moved/c.txt")], base))
            .unwrap();
        assert_eq!(read, Value::from("alpha"));

        host.invoke(&call("delete", &[Value::from("out")], base)).unwrap();
        let exists = host.invoke(&call("exists", &[Value::from("out")], base)).unwrap();
        assert_eq!(exists, Value::Boolean(false));
    }

    #[test]
    fn test_file_errors_are_file_kind() {
        let dir = tempfile::tempdir().unwrap();
        let (mut host, _, _) = host_with("");
        let err = host
            .invoke(&call("read_file", &[Value::from("missing.txt")], dir.path()))
            .unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::File);
        let err = host
            .invoke(&call("delete", &[Value::from("missing.txt")], dir.path()))
            .unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::File);
    }

    #[test]
    fn test_dry_run_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let (mut host, out, _) = host_with("");
        let args = [Value::from("created")];
        let mut dry = call("make_folder", &args, dir.path());
        dry.dry_run = true;
        assert_eq!(host.invoke(&dry).unwrap(), Value::Unit);
        assert!(!dir.path().join("created").exists());

        let cmd = [Value::from("exit 3")];
        let mut run = call("run", &cmd, dir.path());
        run.dry_run = true;
        run.form = CallForm::Captured;
        assert_eq!(host.invoke(&run).unwrap(), Value::Integer(0));

        assert!(out.text().contains("[dry-run] make_folder \"created\""));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_and_capture() {
        let (mut host, _, _) = host_with("");
        let base = Path::new(".");
        let cmd = [Value::from("exit 3")];
        let mut run = call("run", &cmd, base);
        run.form = CallForm::Captured;
        assert_eq!(host.invoke(&run).unwrap(), Value::Integer(3));

        let echo = [Value::from("echo '  hi  '")];
        assert_eq!(host.invoke(&call("capture", &echo, base)).unwrap(), Value::from("hi"));
    }

    #[test]
    fn test_wait_rejects_non_numbers() {
        let (mut host, _, _) = host_with("");
        let err = host
            .invoke(&call("wait", &[Value::from("soon")], Path::new(".")))
            .unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Data);
        for secs in [1e20, -1.0, f64::NAN] {
            let err = host
                .invoke(&call("wait", &[Value::Float(secs)], Path::new(".")))
                .unwrap_err();
            assert_eq!(err.kind, crate::error::ErrorKind::Data);
            assert!(err.message.starts_with("Invalid wait duration"));
        }
        host.invoke(&call("wait", &[Value::Float(0.0)], Path::new("."))).unwrap();
    }
}
