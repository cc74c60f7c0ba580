//! Execution result types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ShellRelayError;
use crate::output::Trimmer;
use crate::security::ValidationError;
use crate::shell::Dialect;

/// Outcome classification of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandStatus {
    /// Exit code 0.
    #[serde(rename = "ok")]
    Ok,
    /// Non-zero exit code.
    #[serde(rename = "powershell-error")]
    ShellError,
    /// Deadline passed; the interpreter was discarded.
    #[serde(rename = "timeout")]
    Timeout,
    /// Rejected before reaching the interpreter.
    #[serde(rename = "invalid-command")]
    InvalidCommand,
    /// Spawn failure, broken pipe or any other engine fault.
    #[serde(rename = "internal-error")]
    InternalError,
}

impl CommandStatus {
    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::ShellError => "powershell-error",
            Self::Timeout => "timeout",
            Self::InvalidCommand => "invalid-command",
            Self::InternalError => "internal-error",
        }
    }
}

impl std::fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured response for `Execute` and `SetCwd`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Outcome classification.
    pub status: CommandStatus,
    /// Present only when the command ran to completion.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub exit_code: Option<i32>,
    /// Decoded standard output.
    pub stdout: String,
    /// Decoded standard error.
    pub stderr: String,
    /// Human-readable summary.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,
    /// Deadline that expired, timeouts only.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub timeout_sec: Option<f64>,
    /// Wall-clock time spent, including waiting for the lock.
    #[serde(default)]
    pub duration_ms: u64,
}

impl CommandResult {
    fn new(status: CommandStatus, stdout: String, stderr: String) -> Self {
        Self {
            status,
            exit_code: None,
            stdout,
            stderr,
            message: None,
            timeout_sec: None,
            duration_ms: 0,
        }
    }

    /// The command finished and reported `exit_code`.
    pub fn completed(dialect: Dialect, exit_code: i32, stdout: String, stderr: String) -> Self {
        let status = if exit_code == 0 {
            CommandStatus::Ok
        } else {
            CommandStatus::ShellError
        };
        let mut result = Self::new(status, stdout, stderr);
        result.exit_code = Some(exit_code);
        if exit_code != 0 {
            result.message = Some(format!("{} exited with code {}", dialect.label(), exit_code));
        }
        result
    }

    /// The deadline passed; carries whatever output arrived.
    pub fn timeout(timeout: Duration, stdout: String, stderr: String) -> Self {
        let mut result = Self::new(CommandStatus::Timeout, stdout, stderr);
        result.message = Some(ShellRelayError::Timeout(timeout).to_string());
        result.timeout_sec = Some(timeout.as_secs_f64());
        result
    }

    /// The request was rejected before reaching the interpreter.
    pub fn invalid(error: &ValidationError) -> Self {
        let mut result = Self::new(CommandStatus::InvalidCommand, String::new(), String::new());
        result.message = Some(format!("error: invalid-command: {}", error));
        result
    }

    /// Engine fault; carries whatever output arrived.
    pub fn internal_error(error: &ShellRelayError, stdout: String, stderr: String) -> Self {
        let mut result = Self::new(CommandStatus::InternalError, stdout, stderr);
        result.message = Some(format!("error: {}: {}", error.kind_name(), error));
        result
    }

    /// Classify an engine error. Validation failures stay `invalid-command`.
    pub fn from_error(error: &ShellRelayError) -> Self {
        match error {
            ShellRelayError::Validation(e) => Self::invalid(e),
            other => Self::internal_error(other, String::new(), String::new()),
        }
    }

    /// Replace the message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Set the elapsed time.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Bound both streams to `max_chars` characters each.
    ///
    /// A completed command that printed nothing at all gets a placeholder
    /// on stdout so the caller never sees an empty response.
    pub fn trimmed(mut self, max_chars: usize) -> Self {
        match self.exit_code {
            Some(code) if self.stdout.is_empty() && self.stderr.is_empty() => {
                self.stdout = Trimmer::placeholder(code);
            }
            _ => {
                self.stdout = Trimmer::trim(&self.stdout, max_chars).into_owned();
                self.stderr = Trimmer::trim(&self.stderr, max_chars).into_owned();
            }
        }
        self
    }

    /// Check if the command succeeded.
    pub fn success(&self) -> bool {
        self.status == CommandStatus::Ok
    }
}
