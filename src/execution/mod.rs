//! Command execution.
//!
//! This module runs commands in the session's interpreter:
//! - Request validation
//! - Sentinel-framed exchange with a deadline
//! - Result classification and trimming
//!
//! # Example
//!
//! ```no_run
//! use shell_relay::execution::CommandRequest;
//! use std::time::Duration;
//!
//! let request = CommandRequest::new("cargo build")
//!     .timeout(Duration::from_secs(60))
//!     .trim_chars(2000);
//! ```

mod executor;
mod request;
mod result;

pub use executor::{CommandExecutor, ExecutionLimits, DEFAULT_TIMEOUT, DEFAULT_TRIM_CHARS};
pub use request::CommandRequest;
pub use result::{CommandResult, CommandStatus};
