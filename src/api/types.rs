//! API request and response types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ShellRelayError;
use crate::security::ValidationError;
use crate::shell::SessionInfo;

/// Request to execute a command.
///
/// Fields are kept as raw JSON so a wrongly typed value can be answered
/// with an `invalid-command` result instead of a deserialization failure.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteRequest {
    /// The command text.
    #[serde(default)]
    pub command: Value,
    /// Timeout in seconds.
    #[serde(default)]
    pub timeout_sec: Value,
    /// Per-stream trim length.
    #[serde(default)]
    pub trim_chars: Value,
}

impl ExecuteRequest {
    /// Timeout override; `null` or absent means the configured default.
    pub fn timeout_secs(&self) -> Result<Option<f64>, ValidationError> {
        match &self.timeout_sec {
            Value::Null => Ok(None),
            value => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| ValidationError::TimeoutNotNumber(value.to_string())),
        }
    }

    /// Trim override; `null` or absent means the configured default.
    pub fn trim_chars(&self) -> Result<Option<usize>, ValidationError> {
        match &self.trim_chars {
            Value::Null => Ok(None),
            value => value
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| ValidationError::InvalidTrim(value.to_string())),
        }
    }
}

/// Request to change the working directory.
#[derive(Debug, Clone, Deserialize)]
pub struct SetCwdRequest {
    /// Target directory, absolute or relative to the tracked cwd.
    pub path: String,
}

/// Tracked working directory.
#[derive(Debug, Clone, Serialize)]
pub struct CwdResponse {
    pub cwd: String,
}

/// Request to set an overlay variable.
#[derive(Debug, Clone, Deserialize)]
pub struct SetEnvRequest {
    pub value: String,
}

/// Value of one environment variable.
#[derive(Debug, Clone, Serialize)]
pub struct EnvResponse {
    pub name: String,
    /// `null` when the variable is set nowhere.
    pub value: Option<String>,
}

/// Acknowledgement for state-changing operations.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionInfo>,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok",
            session: None,
        }
    }

    pub fn with_session(mut self, session: SessionInfo) -> Self {
        self.session = Some(session);
        self
    }
}

/// Generic API error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "INVALID_REQUEST").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    /// Map an engine error, keeping its kind name as details.
    pub fn from_error(error: &ShellRelayError) -> Self {
        let response = match error {
            ShellRelayError::Validation(e) => Self::bad_request(e.to_string()),
            ShellRelayError::SessionTerminated => Self::new("SESSION_TERMINATED", error.to_string()),
            other => Self::internal_error(other.to_string()),
        };
        response.with_details(error.kind_name())
    }
}
