//! Command-line interface for shell-relay.
//!
//! Uses lexopt for minimal binary size overhead.

use std::ffi::OsString;
use std::net::IpAddr;
use std::path::PathBuf;

/// Command-line arguments.
///
/// Unset options leave lower-priority sources (environment, config file)
/// in effect.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Host address to bind to.
    pub host: Option<IpAddr>,
    /// Port to listen on.
    pub port: Option<u16>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// API key for authentication (overrides config file).
    pub api_key: Option<String>,
    /// Disable authentication.
    pub no_auth: bool,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Interpreter executable.
    pub shell: Option<String>,
    /// Request log directory.
    pub log_dir: Option<PathBuf>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('H') | Long("host") => {
                let value: String = parser.value()?.parse()?;
                result.host = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("host", value))?,
                );
            }
            Short('p') | Long("port") => {
                let value: String = parser.value()?.parse()?;
                result.port = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("port", value))?,
                );
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('k') | Long("api-key") => {
                result.api_key = Some(parser.value()?.parse()?);
            }
            Long("no-auth") => {
                result.no_auth = true;
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Short('s') | Long("shell") => {
                let value: String = parser.value()?.parse()?;
                if value.trim().is_empty() {
                    return Err(ArgsError::InvalidValue("shell", value));
                }
                result.shell = Some(value);
            }
            Long("log-dir") => {
                result.log_dir = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"shell-relay {version}
Bounded access to one long-lived shell for LLM tool callers

USAGE:
    shell-relay [OPTIONS]

OPTIONS:
    -H, --host <ADDR>       Host address to bind [default: 127.0.0.1]
    -p, --port <PORT>       Port to listen on [default: 3000]
    -c, --config <FILE>     Path to configuration file (JSON)
    -k, --api-key <KEY>     API key for authentication
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
    -s, --shell <PATH>      Interpreter executable [default: /bin/bash]
        --log-dir <DIR>     Write the request log to this directory
        --no-auth           Disable authentication
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    SHELL_RELAY_HOST              Host address (overrides config)
    SHELL_RELAY_PORT              Port number (overrides config)
    SHELL_RELAY_API_KEY           API key (overrides config)
    SHELL_RELAY_LOG_LEVEL         Log level (overrides config)
    SHELL_RELAY_LOG_DIR           Request log directory
    SHELL_RELAY_SHELL             Interpreter executable
    SHELL_RELAY_SHELL_FALLBACK    Interpreter used when the first cannot start
    SHELL_RELAY_CWD               Initial working directory
    SHELL_RELAY_TIMEOUT_SECS      Default command timeout [default: 30]
    SHELL_RELAY_TRIM_CHARS        Default output trim length [default: 500]
    SHELL_RELAY_MAX_COMMAND_CHARS Longest accepted command [default: 8192]
    RUST_LOG                      Alternative log level setting

EXAMPLES:
    # Start with defaults (localhost:3000, no auth)
    shell-relay

    # Start on all interfaces with API key
    shell-relay -H 0.0.0.0 -p 8080 -k my-secret-key

    # Drive PowerShell and keep a request log
    shell-relay -s pwsh --log-dir ./logs

    # Start with config file
    shell-relay -c /etc/shell-relay/config.json
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("shell-relay {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
