//! Error types for shell-relay.

use std::time::Duration;

use thiserror::Error;

use crate::security::ValidationError;
use crate::session::LifecycleState;

/// Main error type for shell-relay operations.
#[derive(Error, Debug)]
pub enum ShellRelayError {
    /// Request was rejected before touching the interpreter.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Interpreter executable could not be launched or never became ready.
    #[error("failed to launch interpreter '{path}': {reason}")]
    Spawn { path: String, reason: String },

    /// Command did not finish before its deadline.
    #[error("timeout after {}s", format_secs(.0))]
    Timeout(Duration),

    /// Pipe broke or the interpreter exited while a command was in flight.
    #[error("interpreter process failed: {0}")]
    ProcessFailure(String),

    /// Invalid lifecycle transition attempted.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    /// Engine has been shut down.
    #[error("session terminated")]
    SessionTerminated,

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShellRelayError {
    /// Stable name of the error kind, used in result messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::Spawn { .. } => "SpawnError",
            Self::Timeout(_) => "ExecutionTimeout",
            Self::ProcessFailure(_) => "ProcessFailure",
            Self::InvalidStateTransition { .. } => "InvalidStateTransition",
            Self::SessionTerminated => "SessionTerminated",
            Self::LockPoisoned => "LockPoisoned",
            Self::Io(_) => "IoError",
        }
    }
}

/// Render seconds without a trailing `.0` for whole values.
pub(crate) fn format_secs(duration: &Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs.fract() == 0.0 {
        format!("{}", secs as u64)
    } else {
        format!("{}", secs)
    }
}

/// Convenience Result type for shell-relay operations.
pub type Result<T> = std::result::Result<T, ShellRelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_display() {
        let err = ShellRelayError::Spawn {
            path: "/nonexistent/sh".into(),
            reason: "No such file or directory".into(),
        };
        assert!(err.to_string().contains("/nonexistent/sh"));
        assert_eq!(err.kind_name(), "SpawnError");
    }

    #[test]
    fn test_timeout_display() {
        let err = ShellRelayError::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "timeout after 30s");

        let err = ShellRelayError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "timeout after 1.5s");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: ShellRelayError = io_err.into();
        assert!(matches!(err, ShellRelayError::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_validation_conversion() {
        let err: ShellRelayError = ValidationError::EmptyCommand.into();
        assert_eq!(err.kind_name(), "ValidationError");
        assert_eq!(err.to_string(), "command must not be empty");
    }
}
