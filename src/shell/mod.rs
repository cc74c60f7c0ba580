//! Interpreter process layer.
//!
//! This module owns the one long-lived interpreter: spawning it with piped
//! stdio, framing commands with sentinels, and supervising its lifecycle.

mod dialect;
mod framing;
mod manager;
mod pipe;
mod process;

pub use dialect::Dialect;
pub use framing::{Frame, Sentinel, StreamCapture};
pub use manager::{SessionInfo, SessionLease, SessionManager};
pub use pipe::PipeReader;
pub use process::{Exchange, ShellProcess};

use std::time::Duration;

/// Default time allowed for a fresh interpreter to answer its probe.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Get the default interpreter for the current platform.
pub fn default_shell() -> String {
    #[cfg(unix)]
    {
        "/bin/bash".to_string()
    }
    #[cfg(windows)]
    {
        "pwsh.exe".to_string()
    }
}

/// Get the interpreter tried when the default cannot be launched.
pub fn default_fallback_shell() -> String {
    #[cfg(unix)]
    {
        "/bin/sh".to_string()
    }
    #[cfg(windows)]
    {
        r"C:\Windows\System32\WindowsPowerShell\v1.0\powershell.exe".to_string()
    }
}

/// How to launch the interpreter.
#[derive(Debug, Clone, PartialEq)]
pub struct ShellConfig {
    /// Executable path or name.
    pub path: String,
    /// Tried when `path` is missing or not executable.
    pub fallback_path: Option<String>,
    /// Framing dialect; detected from the executable name when `None`.
    pub dialect: Option<Dialect>,
    /// Readiness probe deadline.
    pub startup_timeout: Duration,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            path: default_shell(),
            fallback_path: Some(default_fallback_shell()),
            dialect: None,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }
}

impl ShellConfig {
    /// Config for a specific interpreter without a fallback.
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            fallback_path: None,
            ..Default::default()
        }
    }
}
