//! Command requests.

use std::time::Duration;

/// A command to run in the session's interpreter.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    /// The command text, passed to the interpreter unmodified.
    pub command: String,
    /// Per-call deadline override, in seconds.
    pub timeout_secs: Option<f64>,
    /// Per-call trim length override, in characters.
    pub trim_chars: Option<usize>,
}

impl CommandRequest {
    /// Create a request with engine defaults for timeout and trim.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout_secs: None,
            trim_chars: None,
        }
    }

    /// Set the deadline in seconds. Validated when the request runs.
    pub fn timeout_secs(mut self, secs: f64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Set the deadline.
    pub fn timeout(self, duration: Duration) -> Self {
        self.timeout_secs(duration.as_secs_f64())
    }

    /// Set the trim length.
    pub fn trim_chars(mut self, chars: usize) -> Self {
        self.trim_chars = Some(chars);
        self
    }
}

impl Default for CommandRequest {
    fn default() -> Self {
        Self::new("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_new() {
        let request = CommandRequest::new("ls -la");
        assert_eq!(request.command, "ls -la");
        assert!(request.timeout_secs.is_none());
        assert!(request.trim_chars.is_none());
    }

    #[test]
    fn test_request_builder() {
        let request = CommandRequest::new("sleep 1")
            .timeout(Duration::from_millis(1500))
            .trim_chars(80);
        assert_eq!(request.timeout_secs, Some(1.5));
        assert_eq!(request.trim_chars, Some(80));
    }

    #[test]
    fn test_request_default() {
        assert_eq!(CommandRequest::default().command, "");
    }
}
