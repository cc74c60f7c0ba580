//! # shell-relay
//!
//! Bounded access to one long-lived shell for LLM tool callers.
//!
//! The engine keeps a single interpreter process (bash/sh or PowerShell)
//! alive across calls, frames every command with a random sentinel so its
//! output and exit code can be told apart from the interpreter's, and
//! answers every call with a classified, trimmed [`CommandResult`].
//!
//! ## Features
//!
//! - **Persistent session**: working directory and environment overlay
//!   survive interpreter crashes and restarts
//! - **Bounded calls**: per-command timeouts that kill and respawn the
//!   interpreter, and per-stream output trimming
//! - **Robust decoding**: UTF-8, UTF-16 and legacy code page output
//! - **REST API**: the same operations over HTTP with API-key auth
//!
//! ## Quick Start
//!
//! ```no_run
//! use shell_relay::{CommandRequest, EngineConfig, ShellEngine};
//!
//! #[tokio::main]
//! async fn main() -> shell_relay::Result<()> {
//!     shell_relay::logging::try_init().ok();
//!
//!     let engine = ShellEngine::new(EngineConfig::default());
//!
//!     let result = engine.execute(&CommandRequest::new("echo hello")).await;
//!     println!("{}: {}", result.status, result.stdout);
//!
//!     engine.set_env("GREETING", "hi")?;
//!     let cd = engine.set_cwd("/tmp").await;
//!     println!("{:?}", cd.message);
//!
//!     engine.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod execution;
pub mod logging;
pub mod output;
pub mod security;
pub mod session;
pub mod shell;

// Re-export commonly used types
pub use engine::{EngineConfig, ShellEngine};
pub use error::{Result, ShellRelayError};
pub use execution::{CommandExecutor, CommandRequest, CommandResult, CommandStatus, ExecutionLimits};
pub use logging::{ExecutionRecord, JsonlSink, RecordSink};
pub use output::{OutputCodec, Trimmer};
pub use session::{LifecycleState, SessionContext, StateStore};
pub use shell::{Dialect, SessionInfo, SessionManager, ShellConfig};
