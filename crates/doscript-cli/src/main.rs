//! Command-line runner for DoScript scripts.
//!
//! # Usage
//!
//! ```bash
//! # Run a script
//! doscript cleanup.do
//!
//! # Show what would change without touching anything
//! doscript cleanup.do --dry-run
//!
//! # Pass arguments, available to the script as the list `args`
//! doscript deploy.do staging v1.4
//!
//! # Debug logging to a file, and give up after five minutes
//! doscript nightly.do -v --log-file nightly.log --timeout 300
//! ```
//!
//! # Exit codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0    | Script finished |
//! | N    | Script ran `exit N` |
//! | 1    | Uncaught script error |
//! | 2    | Missing script or unusable config |
//! | 124  | `--timeout` elapsed |
//! | 130  | Interrupted with Ctrl-C |

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use doscript_core::config::{ConfigError, DoScriptConfig};
use doscript_core::engine::{Interpreter, Outcome, RunOptions};
use doscript_core::error::ScriptError;
use doscript_core::system::SystemHost;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Engine recursion runs on its own thread with room for deep call chains.
const WORKER_STACK_SIZE: usize = 256 * 1024 * 1024;

/// Run a DoScript automation script.
#[derive(Parser)]
#[command(name = "doscript")]
#[command(about = "Run a DoScript automation script")]
#[command(version)]
struct Cli {
    /// Script file to run
    script: PathBuf,

    /// Print mutating operations instead of performing them
    #[arg(long)]
    dry_run: bool,

    /// Enable debug logging for the interpreter
    #[arg(short, long)]
    verbose: bool,

    /// Config file (defaults to ~/.doscript/config.json)
    #[arg(short, long, env = "DOSCRIPT_CONFIG")]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Abort the script after this many seconds
    #[arg(short, long, env = "DOSCRIPT_TIMEOUT")]
    timeout: Option<u64>,

    /// Arguments passed to the script
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[derive(Debug)]
enum CliError {
    Startup(String),
    Script(ScriptError),
    TimedOut(u64),
    Interrupted,
}

impl CliError {
    fn code(&self) -> u8 {
        match self {
            CliError::Startup(_) => 2,
            CliError::Script(_) => 1,
            CliError::TimedOut(_) => 124,
            CliError::Interrupted => 130,
        }
    }

    fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Startup(msg) => write!(f, "Error: {}", msg),
            CliError::Script(e) => f.write_str(&e.report()),
            CliError::TimedOut(secs) => write!(f, "Script timed out after {}s", secs),
            CliError::Interrupted => f.write_str("Script interrupted by user"),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Startup(e.to_string())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = match init_tracing(cli.verbose, cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{}", e);
            return e.exit_code();
        }
    };

    match run(cli).await {
        Ok(outcome) => ExitCode::from(status_byte(outcome)),
        Err(e) => {
            eprintln!("{}", e);
            e.exit_code()
        }
    }
}

/// Script exit code as a process status, wrapped the way the OS wraps it.
fn status_byte(outcome: Outcome) -> u8 {
    outcome.exit_code() as u8
}

fn init_tracing(verbose: bool, log_file: Option<&Path>) -> Result<Option<WorkerGuard>, CliError> {
    let default_filter = if verbose {
        "warn,doscript=debug,doscript_core=debug"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    match log_file {
        Some(path) => {
            let dir = match path.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
                _ => PathBuf::from("."),
            };
            let name = path
                .file_name()
                .ok_or_else(|| CliError::Startup(format!("Invalid log file: {}", path.display())))?;
            std::fs::create_dir_all(&dir).map_err(|e| {
                CliError::Startup(format!(
                    "Cannot create log directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
            let file_appender = tracing_appender::rolling::never(&dir, name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(non_blocking)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<DoScriptConfig, CliError> {
    let config = match path {
        Some(path) => DoScriptConfig::load_from(path)?,
        None => DoScriptConfig::load()?,
    };
    debug!(?config, "config loaded");
    Ok(config)
}

async fn run(cli: Cli) -> Result<Outcome, CliError> {
    if !cli.script.is_file() {
        return Err(CliError::Startup(format!(
            "Script file not found: {}",
            cli.script.display()
        )));
    }
    let config = load_config(cli.config.as_deref())?;
    let timeout_secs = cli.timeout;

    let options = RunOptions {
        dry_run: cli.dry_run || config.dry_run,
        search_paths: config.search_paths.clone(),
        args: cli.args,
    };
    if options.dry_run {
        info!("dry run: mutating commands will only be printed");
    }

    let (tx, rx) = oneshot::channel();
    let script = cli.script.clone();
    std::thread::Builder::new()
        .name("doscript-engine".to_string())
        .stack_size(WORKER_STACK_SIZE)
        .spawn(move || {
            let host = SystemHost::new(&config);
            let mut interp = Interpreter::new(Box::new(host), options);
            let _ = tx.send(interp.run_file(&script));
        })
        .map_err(|e| CliError::Startup(format!("Failed to start interpreter: {}", e)))?;

    let timeout = async {
        match timeout_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        result = rx => match result {
            Ok(Ok(outcome)) => {
                info!(code = outcome.exit_code(), "script finished");
                Ok(outcome)
            }
            Ok(Err(e)) => Err(CliError::Script(e)),
            Err(_) => Err(CliError::Startup("Interpreter thread stopped unexpectedly".to_string())),
        },
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted");
            Err(CliError::Interrupted)
        }
        _ = timeout => {
            let secs = timeout_secs.unwrap_or_default();
            warn!(secs, "timeout elapsed");
            Err(CliError::TimedOut(secs))
        }
    }
}
