//! Path resolution, include-once bookkeeping and filesystem enumeration.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use tracing::debug;

use crate::ast::{Program, ScopeKeyword};
use crate::builtins::extension_of;
use crate::error::ScriptError;
use crate::parser;

/// Characters that make a path string a glob pattern.
const GLOB_META: &[char] = &['*', '?', '['];

pub fn has_glob_meta(s: &str) -> bool {
    s.contains(GLOB_META)
}

#[derive(Debug, Default)]
pub struct ModuleLoader {
    search_paths: Vec<PathBuf>,
    included: HashSet<PathBuf>,
}

impl ModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory relative paths resolve against: the most recently added
    /// search path, or the working directory.
    pub fn base_dir(&self) -> PathBuf {
        match self.search_paths.last() {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    pub fn resolve(&self, raw: &str) -> PathBuf {
        let path = Path::new(raw);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir().join(path)
        }
    }

    /// Pushes `dir` in absolute form (relative to the working directory).
    pub fn push_search_path(&mut self, dir: impl AsRef<Path>) {
        let dir = absolute(dir.as_ref());
        debug!(dir = %dir.display(), "search path added");
        self.search_paths.push(dir);
    }

    /// Removes the first entry equal to the absolute form of `dir`.
    pub fn remove_search_path(&mut self, dir: impl AsRef<Path>) -> bool {
        let dir = absolute(dir.as_ref());
        match self.search_paths.iter().position(|p| *p == dir) {
            Some(index) => {
                self.search_paths.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Drops every search path above `len`, undoing pushes made since.
    pub fn truncate_search_paths(&mut self, len: usize) {
        self.search_paths.truncate(len);
    }

    pub fn is_included(&self, canonical: &Path) -> bool {
        self.included.contains(canonical)
    }

    /// Marks a file as loaded. Used for the entry script so that including it
    /// again is a no-op.
    pub fn mark_included(&mut self, path: &Path) {
        if let Ok(canonical) = path.canonicalize() {
            self.included.insert(canonical);
        }
    }

    /// Resolves an `include` target and registers it.
    ///
    /// Returns `None` when the file was already included, otherwise its
    /// canonical path. Registration happens before the file runs, so an
    /// include cycle terminates.
    pub fn begin_include(&mut self, raw: &str) -> Result<Option<PathBuf>, ScriptError> {
        let resolved = self.resolve(raw);
        let canonical = resolved.canonicalize().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                ScriptError::file(format!("Included file not found: '{}'", raw))
            }
            _ => ScriptError::file(format!("Cannot resolve include '{}': {}", raw, e)),
        })?;
        if !self.included.insert(canonical.clone()) {
            debug!(path = %canonical.display(), "already included");
            return Ok(None);
        }
        Ok(Some(canonical))
    }

    /// Reads and parses a script file.
    pub fn load(path: &Path) -> Result<Program, ScriptError> {
        let source = fs::read_to_string(path)
            .map_err(|e| ScriptError::file(format!("Failed to read '{}': {}", path.display(), e)))?;
        parser::parse(&source, path)
    }

    /// Entries matched by a path or glob pattern, sorted by path.
    ///
    /// A pattern without glob characters that names a directory yields the
    /// directory's children; naming a file yields just that file.
    pub fn enumerate(&self, pattern: &str) -> Result<Vec<PathBuf>, ScriptError> {
        if has_glob_meta(pattern) {
            let full = self.glob_pattern(pattern);
            let paths = glob::glob(&full)
                .map_err(|e| ScriptError::data(format!("Invalid pattern '{}': {}", pattern, e)))?;
            let mut matched = Vec::new();
            for entry in paths {
                match entry {
                    Ok(path) => matched.push(path),
                    Err(e) => debug!(error = %e, "skipping unreadable glob entry"),
                }
            }
            matched.sort();
            return Ok(matched);
        }

        let path = self.resolve(pattern);
        if path.is_dir() {
            list_dir(&path)
        } else if path.exists() {
            Ok(vec![path])
        } else {
            Err(ScriptError::file(format!("No such file or directory: '{}'", pattern)))
        }
    }

    /// Joins a relative pattern onto the escaped base directory, so glob
    /// characters in the base path match literally.
    fn glob_pattern(&self, pattern: &str) -> String {
        if Path::new(pattern).is_absolute() {
            return pattern.to_string();
        }
        let base = glob::Pattern::escape(&self.base_dir().to_string_lossy());
        Path::new(&base).join(pattern).to_string_lossy().into_owned()
    }

    /// Entries for the `here` / `deep` keywords, relative to [`Self::base_dir`].
    pub fn enumerate_scope(&self, scope: ScopeKeyword) -> Result<Vec<PathBuf>, ScriptError> {
        let base = self.base_dir();
        match scope {
            ScopeKeyword::Here => list_dir(&base),
            ScopeKeyword::Deep => {
                let mut out = Vec::new();
                walk(&base, &mut out)?;
                Ok(out)
            }
        }
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, ScriptError> {
    let read = fs::read_dir(dir)
        .map_err(|e| ScriptError::file(format!("Failed to list '{}': {}", dir.display(), e)))?;
    let mut entries = Vec::new();
    for entry in read {
        let entry = entry.map_err(|e| {
            ScriptError::file(format!("Failed to list '{}': {}", dir.display(), e))
        })?;
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}

/// Pre-order walk: each directory is listed before its contents.
fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), ScriptError> {
    for path in list_dir(dir)? {
        let is_dir = fs::symlink_metadata(&path).map(|m| m.is_dir()).unwrap_or(false);
        out.push(path.clone());
        if is_dir {
            walk(&path, out)?;
        }
    }
    Ok(())
}

/// Metadata exposed to scripts for each enumerated entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryInfo {
    pub name: String,
    pub path: String,
    pub ext: String,
    pub size: u64,
    pub is_dir: bool,
    pub is_empty: bool,
    pub created: String,
    pub modified: String,
    pub age_days: i64,
    pub age_hours: i64,
}

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn format_time(t: SystemTime) -> String {
    DateTime::<Local>::from(t).format(TIMESTAMP_FORMAT).to_string()
}

impl EntryInfo {
    pub fn describe(path: &Path) -> Result<EntryInfo, ScriptError> {
        let meta = fs::metadata(path)
            .map_err(|e| ScriptError::file(format!("Failed to stat '{}': {}", path.display(), e)))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let is_dir = meta.is_dir();
        let size = if is_dir { 0 } else { meta.len() };
        let is_empty = if is_dir {
            fs::read_dir(path).map(|mut it| it.next().is_none()).unwrap_or(false)
        } else {
            size == 0
        };
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let created = meta.created().unwrap_or(modified);
        let age = SystemTime::now()
            .duration_since(modified)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        Ok(EntryInfo {
            ext: if is_dir { String::new() } else { extension_of(&name) },
            name,
            path: path.to_string_lossy().into_owned(),
            size,
            is_dir,
            is_empty,
            created: format_time(created),
            modified: format_time(modified),
            age_days: age / 86_400,
            age_hours: age / 3_600,
        })
    }

    pub fn size_kb(&self) -> f64 {
        round2(self.size as f64 / 1024.0)
    }

    pub fn size_mb(&self) -> f64 {
        round2(self.size as f64 / (1024.0 * 1024.0))
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
