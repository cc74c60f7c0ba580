//! Request validation.

use std::time::Duration;

/// Validation configuration.
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Maximum command length in characters.
    pub max_command_chars: usize,
    /// Maximum accepted per-call timeout.
    pub max_timeout: Duration,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_command_chars: 8192,
            max_timeout: Duration::from_secs(3600), // 1 hour
        }
    }
}

/// Request validator.
#[derive(Debug, Clone, Default)]
pub struct CommandValidator {
    config: ValidationConfig,
}

impl CommandValidator {
    /// Create a new validator with the given config.
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Validate a command string.
    pub fn validate_command(&self, command: &str) -> Result<(), ValidationError> {
        if command.trim().is_empty() {
            return Err(ValidationError::EmptyCommand);
        }

        let length = command.chars().count();
        if length > self.config.max_command_chars {
            return Err(ValidationError::CommandTooLong {
                length,
                max: self.config.max_command_chars,
            });
        }

        if command.contains('\0') {
            return Err(ValidationError::InvalidCharacter('\0'));
        }

        Ok(())
    }

    /// Validate a timeout override given in seconds.
    pub fn validate_timeout(&self, timeout_secs: f64) -> Result<Duration, ValidationError> {
        if !timeout_secs.is_finite() || timeout_secs <= 0.0 {
            return Err(ValidationError::InvalidTimeout(timeout_secs));
        }

        let max = self.config.max_timeout.as_secs_f64();
        if timeout_secs > max {
            return Err(ValidationError::TimeoutTooLong {
                value: timeout_secs,
                max,
            });
        }

        Ok(Duration::from_secs_f64(timeout_secs))
    }

    /// Validate a working directory path.
    ///
    /// Only the shape is checked; whether the directory exists is left to
    /// the interpreter.
    pub fn validate_path(&self, path: &str) -> Result<(), ValidationError> {
        if path.trim().is_empty() {
            return Err(ValidationError::EmptyPath);
        }
        if path.contains('\0') {
            return Err(ValidationError::InvalidCharacter('\0'));
        }
        Ok(())
    }

    /// Validate an environment variable name and value.
    pub fn validate_env(&self, name: &str, value: &str) -> Result<(), ValidationError> {
        if !is_env_name(name) {
            return Err(ValidationError::InvalidEnvName(name.to_string()));
        }
        if value.contains('\0') {
            return Err(ValidationError::InvalidCharacter('\0'));
        }
        Ok(())
    }

    /// Get the configured maximum command length.
    pub fn max_command_chars(&self) -> usize {
        self.config.max_command_chars
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`, the portable subset every dialect can export.
fn is_env_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validation errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Command is empty or whitespace.
    EmptyCommand,
    /// Command exceeds maximum length.
    CommandTooLong { length: usize, max: usize },
    /// Command was not text.
    NotText,
    /// Input contains a character the interpreter cannot receive.
    InvalidCharacter(char),
    /// Timeout is zero, negative or not a number.
    InvalidTimeout(f64),
    /// Timeout was given but is not a number.
    TimeoutNotNumber(String),
    /// Trim length was given but is not a non-negative integer.
    InvalidTrim(String),
    /// Timeout exceeds the configured maximum.
    TimeoutTooLong { value: f64, max: f64 },
    /// Path is empty.
    EmptyPath,
    /// Environment variable name is not portable.
    InvalidEnvName(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyCommand => write!(f, "command must not be empty"),
            Self::CommandTooLong { max, .. } => {
                write!(f, "command exceeds {} characters", max)
            }
            Self::NotText => write!(f, "command must be a string"),
            Self::InvalidCharacter(c) => {
                write!(f, "input contains invalid character: {:?}", c)
            }
            Self::InvalidTimeout(value) => {
                write!(f, "timeout must be a positive number of seconds, got {}", value)
            }
            Self::TimeoutNotNumber(raw) => {
                write!(f, "timeout must be a positive number of seconds, got {}", raw)
            }
            Self::InvalidTrim(raw) => {
                write!(f, "trim_chars must be a non-negative integer, got {}", raw)
            }
            Self::TimeoutTooLong { value, max } => {
                write!(f, "timeout too long: {}s (max: {}s)", value, max)
            }
            Self::EmptyPath => write!(f, "path must not be empty"),
            Self::InvalidEnvName(name) => {
                write!(f, "invalid environment variable name: '{}'", name)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Shorten a command for log lines.
pub fn sanitize_for_display(command: &str) -> String {
    command
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .take(120)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_config_default() {
        let config = ValidationConfig::default();
        assert_eq!(config.max_command_chars, 8192);
        assert_eq!(config.max_timeout, Duration::from_secs(3600));
    }

    #[test]
    fn test_validate_command_ok() {
        let validator = CommandValidator::default();

        assert!(validator.validate_command("ls -la").is_ok());
        assert!(validator.validate_command("Get-ChildItem -Path C:/Temp").is_ok());
        assert!(validator.validate_command("echo one\necho two").is_ok());
    }

    #[test]
    fn test_validate_command_empty() {
        let validator = CommandValidator::default();

        assert_eq!(
            validator.validate_command(""),
            Err(ValidationError::EmptyCommand)
        );
        assert_eq!(
            validator.validate_command("   "),
            Err(ValidationError::EmptyCommand)
        );
    }

    #[test]
    fn test_validate_command_too_long() {
        let validator = CommandValidator::new(ValidationConfig {
            max_command_chars: 100,
            ..Default::default()
        });

        let err = validator.validate_command(&"x".repeat(9000)).unwrap_err();
        assert_eq!(err.to_string(), "command exceeds 100 characters");

        assert!(validator.validate_command(&"x".repeat(100)).is_ok());
    }

    #[test]
    fn test_length_counts_characters() {
        let validator = CommandValidator::new(ValidationConfig {
            max_command_chars: 4,
            ..Default::default()
        });

        // 4 characters, 12 bytes
        assert!(validator.validate_command("你好你好").is_ok());
    }

    #[test]
    fn test_validate_null_byte() {
        let validator = CommandValidator::default();

        assert_eq!(
            validator.validate_command("ls\0 -la"),
            Err(ValidationError::InvalidCharacter('\0'))
        );
    }

    #[test]
    fn test_validate_timeout() {
        let validator = CommandValidator::default();

        assert_eq!(validator.validate_timeout(30.0), Ok(Duration::from_secs(30)));
        assert_eq!(
            validator.validate_timeout(0.5),
            Ok(Duration::from_millis(500))
        );

        assert!(matches!(
            validator.validate_timeout(0.0),
            Err(ValidationError::InvalidTimeout(_))
        ));
        assert!(matches!(
            validator.validate_timeout(-1.0),
            Err(ValidationError::InvalidTimeout(_))
        ));
        assert!(matches!(
            validator.validate_timeout(f64::NAN),
            Err(ValidationError::InvalidTimeout(_))
        ));
        assert!(matches!(
            validator.validate_timeout(7200.0),
            Err(ValidationError::TimeoutTooLong { .. })
        ));
    }

    #[test]
    fn test_validate_path() {
        let validator = CommandValidator::default();

        assert!(validator.validate_path("/tmp").is_ok());
        assert!(validator.validate_path("../relative").is_ok());
        assert_eq!(validator.validate_path(""), Err(ValidationError::EmptyPath));
        assert_eq!(
            validator.validate_path("/tmp\0x"),
            Err(ValidationError::InvalidCharacter('\0'))
        );
    }

    #[test]
    fn test_validate_env() {
        let validator = CommandValidator::default();

        assert!(validator.validate_env("FOO", "bar").is_ok());
        assert!(validator.validate_env("_private_1", "").is_ok());

        assert!(matches!(
            validator.validate_env("1FOO", "bar"),
            Err(ValidationError::InvalidEnvName(_))
        ));
        assert!(matches!(
            validator.validate_env("FOO;rm", "bar"),
            Err(ValidationError::InvalidEnvName(_))
        ));
        assert!(matches!(
            validator.validate_env("", "bar"),
            Err(ValidationError::InvalidEnvName(_))
        ));
    }

    #[test]
    fn test_sanitize_for_display() {
        assert_eq!(sanitize_for_display("hello"), "hello");
        assert_eq!(sanitize_for_display("hello\x00world"), "helloworld");

        let long = "a".repeat(2000);
        assert_eq!(sanitize_for_display(&long).len(), 120);
    }
}
