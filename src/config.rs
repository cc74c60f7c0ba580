//! Configuration management for shell-relay.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::ServerConfig;
use crate::cli::Args;
use crate::engine::EngineConfig;
use crate::execution::{ExecutionLimits, DEFAULT_TIMEOUT, DEFAULT_TRIM_CHARS};
use crate::security::{ApiKeyStore, ValidationConfig};
use crate::shell::{self, Dialect, ShellConfig};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerSection,
    /// Interpreter configuration.
    pub shell: ShellSection,
    /// Per-request limits.
    pub limits: LimitsSection,
    /// Security configuration.
    pub security: SecuritySection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Enable graceful shutdown.
    pub graceful_shutdown: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            graceful_shutdown: true,
        }
    }
}

/// Dialect selection in the config file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectSetting {
    /// Detect from the executable name.
    #[default]
    Auto,
    /// POSIX `sh` family.
    Posix,
    /// PowerShell.
    PowerShell,
}

impl DialectSetting {
    fn resolve(self) -> Option<Dialect> {
        match self {
            Self::Auto => None,
            Self::Posix => Some(Dialect::Posix),
            Self::PowerShell => Some(Dialect::PowerShell),
        }
    }
}

/// Interpreter configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellSection {
    /// Interpreter executable.
    pub path: String,
    /// Interpreter tried when `path` cannot be launched.
    pub fallback_path: Option<String>,
    /// Framing dialect.
    pub dialect: DialectSetting,
    /// Starting working directory.
    pub initial_cwd: Option<String>,
    /// Readiness probe deadline in seconds.
    pub startup_timeout_secs: u64,
    /// Adopt the cwd an `execute` leaves behind.
    pub track_cwd: bool,
}

impl Default for ShellSection {
    fn default() -> Self {
        Self {
            path: shell::default_shell(),
            fallback_path: Some(shell::default_fallback_shell()),
            dialect: DialectSetting::Auto,
            initial_cwd: None,
            startup_timeout_secs: shell::DEFAULT_STARTUP_TIMEOUT.as_secs(),
            track_cwd: false,
        }
    }
}

/// Per-request limits section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsSection {
    /// Default command deadline in seconds.
    pub timeout_secs: f64,
    /// Default per-stream trim length.
    pub trim_chars: usize,
    /// Longest accepted command, in characters.
    pub max_command_chars: usize,
    /// Longest accepted per-call deadline, in seconds.
    pub max_timeout_secs: u64,
}

impl Default for LimitsSection {
    fn default() -> Self {
        let validation = ValidationConfig::default();
        Self {
            timeout_secs: DEFAULT_TIMEOUT.as_secs_f64(),
            trim_chars: DEFAULT_TRIM_CHARS,
            max_command_chars: validation.max_command_chars,
            max_timeout_secs: validation.max_timeout.as_secs(),
        }
    }
}

/// Security configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySection {
    /// Authentication settings.
    pub auth: AuthSection,
}

/// Authentication configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    /// Enable authentication.
    pub enabled: bool,
    /// API keys.
    pub api_keys: Vec<String>,
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
    /// Directory for the request log; no request log when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    ///
    /// Numeric values that do not parse are ignored.
    pub fn apply_env(&mut self) {
        if let Some(host) = env_var("SHELL_RELAY_HOST") {
            self.server.host = host;
        }

        if let Some(port) = env_var("SHELL_RELAY_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }

        if let Some(key) = env_var("SHELL_RELAY_API_KEY") {
            self.add_api_key(key);
        }

        if let Some(level) = env_var("SHELL_RELAY_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Some(level) = env_var("RUST_LOG") {
            self.logging.level = level;
        }

        if let Some(dir) = env_var("SHELL_RELAY_LOG_DIR") {
            self.logging.dir = Some(PathBuf::from(dir));
        }

        if let Some(path) = env_var("SHELL_RELAY_SHELL") {
            self.shell.path = path;
        }

        if let Some(path) = env_var("SHELL_RELAY_SHELL_FALLBACK") {
            self.shell.fallback_path = Some(path);
        }

        if let Some(cwd) = env_var("SHELL_RELAY_CWD") {
            self.shell.initial_cwd = Some(cwd);
        }

        if let Some(secs) = env_var("SHELL_RELAY_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.limits.timeout_secs = secs;
        }

        if let Some(chars) = env_var("SHELL_RELAY_TRIM_CHARS").and_then(|v| v.parse().ok()) {
            self.limits.trim_chars = chars;
        }

        if let Some(chars) = env_var("SHELL_RELAY_MAX_COMMAND_CHARS").and_then(|v| v.parse().ok()) {
            self.limits.max_command_chars = chars;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(host) = args.host {
            self.server.host = host.to_string();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }

        if let Some(ref key) = args.api_key {
            self.add_api_key(key.clone());
        }

        if args.no_auth {
            self.security.auth.enabled = false;
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }

        if let Some(ref dir) = args.log_dir {
            self.logging.dir = Some(dir.clone());
        }

        if let Some(ref shell) = args.shell {
            self.shell.path = shell.clone();
        }
    }

    fn add_api_key(&mut self, key: String) {
        self.security.auth.enabled = true;
        if !self.security.auth.api_keys.contains(&key) {
            self.security.auth.api_keys.push(key);
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match args.config {
            Some(ref path) => Config::from_file(path)?,
            None => Config::default(),
        };

        config.apply_env();
        config.apply_args(args);
        config.validate()?;

        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let timeout = self.limits.timeout_secs;
        if !timeout.is_finite() || timeout <= 0.0 || timeout > self.limits.max_timeout_secs as f64 {
            return Err(ConfigError::InvalidValue(
                "limits.timeout_secs",
                timeout.to_string(),
            ));
        }
        if self.shell.path.trim().is_empty() {
            return Err(ConfigError::InvalidValue("shell.path", self.shell.path.clone()));
        }
        if self.shell.startup_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "shell.startup_timeout_secs",
                "0".to_string(),
            ));
        }
        Ok(())
    }

    /// Convert to the engine's configuration.
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            shell: ShellConfig {
                path: self.shell.path.clone(),
                fallback_path: self.shell.fallback_path.clone(),
                dialect: self.shell.dialect.resolve(),
                startup_timeout: Duration::from_secs(self.shell.startup_timeout_secs),
            },
            limits: ExecutionLimits {
                default_timeout: Duration::from_secs_f64(self.limits.timeout_secs),
                default_trim_chars: self.limits.trim_chars,
            },
            validation: ValidationConfig {
                max_command_chars: self.limits.max_command_chars,
                max_timeout: Duration::from_secs(self.limits.max_timeout_secs),
            },
            initial_cwd: self.shell.initial_cwd.clone(),
            track_cwd: self.shell.track_cwd,
        }
    }

    /// Convert to ServerConfig for the API server.
    pub fn to_server_config(&self) -> Result<ServerConfig, ConfigError> {
        let host: IpAddr = self
            .server
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(self.server.host.clone()))?;

        let auth = if self.security.auth.enabled {
            ApiKeyStore::new(self.security.auth.api_keys.iter().cloned())
        } else {
            ApiKeyStore::disabled()
        };

        let mut server_config = ServerConfig::new(host, self.server.port).with_auth(auth);
        if !self.server.graceful_shutdown {
            server_config = server_config.without_graceful_shutdown();
        }

        Ok(server_config)
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Invalid host address.
    InvalidHost(String),
    /// A setting is out of range.
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidHost(host) => write!(f, "invalid host address: {}", host),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for {}: '{}'", name, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert!(!config.security.auth.enabled);
        assert_eq!(config.limits.timeout_secs, 30.0);
        assert_eq!(config.limits.trim_chars, 500);
        assert_eq!(config.limits.max_command_chars, 8192);
        assert!(!config.shell.track_cwd);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "server": {
                "host": "0.0.0.0",
                "port": 8080
            },
            "shell": {
                "path": "/usr/bin/pwsh",
                "dialect": "powershell",
                "initial_cwd": "/srv",
                "track_cwd": true
            },
            "limits": {
                "timeout_secs": 5,
                "trim_chars": 0
            },
            "security": {
                "auth": {
                    "enabled": true,
                    "api_keys": ["key1", "key2"]
                }
            }
        }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.shell.dialect, DialectSetting::PowerShell);
        assert!(config.security.auth.enabled);
        assert_eq!(config.security.auth.api_keys.len(), 2);

        let engine = config.to_engine_config();
        assert_eq!(engine.shell.path, "/usr/bin/pwsh");
        assert_eq!(engine.shell.dialect, Some(Dialect::PowerShell));
        assert_eq!(engine.initial_cwd.as_deref(), Some("/srv"));
        assert_eq!(engine.limits.default_timeout, Duration::from_secs(5));
        assert_eq!(engine.limits.default_trim_chars, 0);
        assert!(engine.track_cwd);
    }

    #[test]
    fn test_config_partial_json() {
        let json = r#"{
            "server": {
                "port": 9000
            }
        }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.host, "127.0.0.1"); // Default
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.shell.dialect, DialectSetting::Auto);
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        let args = Args {
            host: Some("192.168.1.1".parse().unwrap()),
            port: Some(5000),
            api_key: Some("test-key".to_string()),
            shell: Some("/bin/dash".to_string()),
            log_dir: Some(PathBuf::from("/var/log/relay")),
            ..Args::default()
        };

        config.apply_args(&args);

        assert_eq!(config.server.host, "192.168.1.1");
        assert_eq!(config.server.port, 5000);
        assert!(config.security.auth.enabled);
        assert!(config
            .security
            .auth
            .api_keys
            .contains(&"test-key".to_string()));
        assert_eq!(config.shell.path, "/bin/dash");
        assert_eq!(config.logging.dir, Some(PathBuf::from("/var/log/relay")));
    }

    #[test]
    fn test_args_without_values_keep_file_settings() {
        let mut config = Config::default();
        config.server.port = 9000;
        config.apply_args(&Args::default());
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn test_apply_no_auth() {
        let mut config = Config::default();
        config.security.auth.enabled = true;

        let args = Args {
            no_auth: true,
            ..Args::default()
        };

        config.apply_args(&args);
        assert!(!config.security.auth.enabled);
    }

    #[test]
    fn test_to_server_config() {
        let config = Config::default();
        let server_config = config.to_server_config().unwrap();

        assert_eq!(server_config.host.to_string(), "127.0.0.1");
        assert_eq!(server_config.port, 3000);
        assert!(!server_config.auth.is_enabled());
        assert!(server_config.graceful_shutdown);
    }

    #[test]
    fn test_to_server_config_with_keys() {
        let mut config = Config::default();
        config.security.auth.enabled = true;
        config.security.auth.api_keys = vec!["k".to_string()];
        let server_config = config.to_server_config().unwrap();
        assert!(server_config.auth.is_enabled());
        assert_eq!(server_config.auth.count(), 1);
    }

    #[test]
    fn test_invalid_host() {
        let mut config = Config::default();
        config.server.host = "not-an-ip".to_string();

        let result = config.to_server_config();
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_bad_timeout() {
        let mut config = Config::default();
        config.limits.timeout_secs = 0.0;
        assert!(config.validate().is_err());

        config.limits.timeout_secs = 7200.0;
        assert!(config.validate().is_err());

        config.limits.timeout_secs = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"host\""));
        assert!(json.contains("\"trim_chars\""));
        assert!(json.contains("\"auto\""));
    }
}
