//! User configuration for the interpreter.
//!
//! Stored in `~/.doscript/config.json`. Every field is optional:
//!
//! ```json
//! {
//!   "search_paths": ["/home/me/doscript-lib"],
//!   "dry_run": false,
//!   "http_timeout_secs": 30,
//!   "shell": "bash -c"
//! }
//! ```

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_DIR: &str = ".doscript";
const CONFIG_FILENAME: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read config {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("Invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoScriptConfig {
    /// Pushed onto the search path stack before the script's own directory.
    pub search_paths: Vec<PathBuf>,
    /// Run every script as a dry run unless overridden.
    pub dry_run: bool,
    pub http_timeout_secs: u64,
    /// Shell used by `run` and `capture`, e.g. `"bash -c"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
}

impl Default for DoScriptConfig {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            dry_run: false,
            http_timeout_secs: 30,
            shell: None,
        }
    }
}

/// `~/.doscript/config.json`, if a home directory is known.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(CONFIG_FILENAME))
}

impl DoScriptConfig {
    /// Loads the default config file. A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Loads an explicitly named config file, which must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ConfigError::NotFound(path.to_path_buf()),
            _ => ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
