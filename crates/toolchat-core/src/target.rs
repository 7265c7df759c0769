//! Tool server targets
//!
//! A target names the tool server a session connects to: either a script
//! path whose interpreter is picked from its extension, or an explicit
//! command line.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::LauncherConfig;
use crate::error::ConnectionError;

/// Where to find a tool server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetRef {
    /// A script or executable, launched according to its extension
    Path(PathBuf),
    /// An explicit command and arguments
    Command { command: String, args: Vec<String> },
}

impl TargetRef {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    pub fn command(command: impl Into<String>, args: Vec<String>) -> Self {
        Self::Command {
            command: command.into(),
            args,
        }
    }

    /// Parse a user-supplied target string
    ///
    /// An existing file is always a path, spaces included. Otherwise a string
    /// containing whitespace is split into a command line and anything else
    /// is treated as a path.
    pub fn parse(raw: &str) -> Result<Self, ConnectionError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ConnectionError::InvalidTarget("empty target".to_string()));
        }
        if Path::new(raw).is_file() {
            return Ok(Self::path(raw));
        }

        let mut parts = raw.split_whitespace();
        match (parts.next(), parts.clone().next()) {
            (Some(command), Some(_)) => Ok(Self::command(command, parts.map(String::from).collect())),
            _ => Ok(Self::path(raw)),
        }
    }

    /// Short label used in log lines and user-facing notices
    pub fn label(&self) -> String {
        match self {
            Self::Path(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            Self::Command { command, .. } => command.clone(),
        }
    }

    /// The command line that starts this target
    pub fn resolve(&self, launcher: &LauncherConfig) -> Result<(String, Vec<String>), ConnectionError> {
        match self {
            Self::Command { command, args } => {
                if command.is_empty() {
                    return Err(ConnectionError::InvalidTarget("empty command".to_string()));
                }
                Ok((command.clone(), args.clone()))
            }
            Self::Path(path) => {
                let as_arg = path.to_string_lossy().into_owned();
                if as_arg.is_empty() {
                    return Err(ConnectionError::InvalidTarget("empty path".to_string()));
                }
                let resolved = match path.extension().and_then(|e| e.to_str()) {
                    Some("py") => (launcher.python_command.clone(), vec![as_arg]),
                    Some("js") => (launcher.node_command.clone(), vec![as_arg]),
                    _ => (as_arg, Vec::new()),
                };
                debug!(target_path = %path.display(), command = %resolved.0, "Resolved tool server target");
                Ok(resolved)
            }
        }
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Command { command, args } if args.is_empty() => f.write_str(command),
            Self::Command { command, args } => write!(f, "{} {}", command, args.join(" ")),
        }
    }
}

fn is_server_script(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let lower = name.to_lowercase();
    matches!(path.extension().and_then(|e| e.to_str()), Some("py" | "js")) && lower.contains("server")
}

/// Candidate tool server scripts in a directory, sorted by path
pub fn discover_targets(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for ext in ["py", "js"] {
        let pattern = dir.join(format!("*.{}", ext));
        let Some(pattern) = pattern.to_str() else {
            continue;
        };
        let Ok(paths) = glob::glob(pattern) else {
            continue;
        };
        found.extend(paths.flatten().filter(|p| p.is_file() && is_server_script(p)));
    }
    found.sort();
    found
}
