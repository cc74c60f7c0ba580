//! The engine facade.
//!
//! [`ShellEngine`] composes the state store, session manager and executor
//! into the operations exposed to callers. Each instance owns its own
//! interpreter, so independent engines can coexist (tests rely on this).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::error::ShellRelayError;
use crate::execution::{CommandExecutor, CommandRequest, CommandResult, CommandStatus, ExecutionLimits};
use crate::logging::{ExecutionRecord, NullSink, RecordSink};
use crate::security::{CommandValidator, ValidationConfig, ValidationError};
use crate::session::StateStore;
use crate::shell::{SessionInfo, SessionManager, ShellConfig};
use crate::Result;

/// Everything needed to build a [`ShellEngine`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Interpreter launch settings.
    pub shell: ShellConfig,
    /// Default timeout and trim length.
    pub limits: ExecutionLimits,
    /// Request validation bounds.
    pub validation: ValidationConfig,
    /// Starting cwd; the engine's own cwd when `None`.
    pub initial_cwd: Option<String>,
    /// Adopt the cwd an `execute` leaves behind.
    pub track_cwd: bool,
}

/// Session execution engine.
pub struct ShellEngine {
    store: Arc<StateStore>,
    manager: Arc<SessionManager>,
    executor: CommandExecutor,
    validator: CommandValidator,
    sink: Arc<dyn RecordSink>,
}

impl ShellEngine {
    /// Create an engine that discards request records.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_sink(config, Arc::new(NullSink))
    }

    /// Create an engine that hands request records to `sink`.
    pub fn with_sink(config: EngineConfig, sink: Arc<dyn RecordSink>) -> Self {
        let store = Arc::new(match config.initial_cwd {
            Some(cwd) => StateStore::new(cwd),
            None => StateStore::from_process_cwd(),
        });
        let manager = Arc::new(SessionManager::new(config.shell, Arc::clone(&store)));
        let validator = CommandValidator::new(config.validation);
        let executor = CommandExecutor::new(
            Arc::clone(&manager),
            Arc::clone(&store),
            validator.clone(),
            config.limits,
            Arc::clone(&sink),
        )
        .track_cwd(config.track_cwd);

        Self {
            store,
            manager,
            executor,
            validator,
            sink,
        }
    }

    /// Run a command. See [`CommandExecutor::execute`].
    pub async fn execute(&self, request: &CommandRequest) -> CommandResult {
        self.executor.execute(request).await
    }

    /// Record and return a rejection for a request whose fields could not
    /// be read, such as a non-text command or a negative trim length.
    pub fn reject(&self, command: &str, error: &ValidationError, trim_chars: Option<usize>) -> CommandResult {
        self.executor.reject(command, error, trim_chars)
    }

    /// The tracked working directory.
    pub fn cwd(&self) -> Result<String> {
        self.store.cwd()
    }

    /// Change the tracked working directory via the interpreter.
    pub async fn set_cwd(&self, path: &str) -> CommandResult {
        self.executor.change_directory(path).await
    }

    /// Overlay value, else inherited value, else `None`.
    pub fn env(&self, name: &str) -> Result<Option<String>> {
        self.store.env(name)
    }

    /// Set an overlay variable, applied from the next command on.
    pub fn set_env(&self, name: &str, value: &str) -> Result<()> {
        let started = Instant::now();
        let cwd = self.store.cwd().unwrap_or_default();

        let outcome = self
            .validator
            .validate_env(name, value)
            .map_err(ShellRelayError::from)
            .and_then(|()| self.store.set_env(name, value));

        let (status, message) = match &outcome {
            Ok(()) => (CommandStatus::Ok, None),
            Err(ShellRelayError::Validation(e)) => (
                CommandStatus::InvalidCommand,
                Some(format!("error: invalid-command: {}", e)),
            ),
            Err(e) => (
                CommandStatus::InternalError,
                Some(format!("error: {}: {}", e.kind_name(), e)),
            ),
        };
        self.sink.record(&ExecutionRecord::operation(
            "set_env",
            name,
            cwd,
            status,
            message,
            started.elapsed(),
        ));

        if outcome.is_ok() {
            info!(name, "Environment overlay updated");
        }
        outcome
    }

    /// The whole environment overlay.
    pub fn env_overlay(&self) -> Result<BTreeMap<String, String>> {
        self.store.overlay()
    }

    /// Kill the interpreter and start a fresh one. State survives.
    pub async fn reset(&self) -> Result<SessionInfo> {
        let started = Instant::now();
        let outcome = self.manager.reset().await;

        let (status, message) = match &outcome {
            Ok(info) => (
                CommandStatus::Ok,
                Some(format!("interpreter restarted, generation {}", info.generation)),
            ),
            Err(e) => {
                warn!(error = %e, "Reset failed");
                (
                    CommandStatus::InternalError,
                    Some(format!("error: {}: {}", e.kind_name(), e)),
                )
            }
        };
        self.sink.record(&ExecutionRecord::operation(
            "reset",
            "",
            self.store.cwd().unwrap_or_default(),
            status,
            message,
            started.elapsed(),
        ));
        outcome
    }

    /// Lifecycle snapshot of the interpreter.
    pub fn session_info(&self) -> Result<SessionInfo> {
        self.manager.info()
    }

    /// Liveness check of the engine itself; does not touch the interpreter.
    pub fn ping(&self) -> &'static str {
        "pong"
    }

    /// Kill the interpreter for good. Later commands fail with
    /// `SessionTerminated`.
    pub async fn shutdown(&self) {
        self.manager.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemorySink;
    use crate::session::LifecycleState;

    fn engine_with_sink() -> (ShellEngine, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let config = EngineConfig {
            shell: ShellConfig::with_path("/bin/sh"),
            initial_cwd: Some("/".to_string()),
            ..Default::default()
        };
        (ShellEngine::with_sink(config, sink.clone()), sink)
    }

    #[test]
    fn test_new_engine_is_idle() {
        let (engine, _) = engine_with_sink();
        assert_eq!(engine.ping(), "pong");
        assert_eq!(engine.cwd().unwrap(), "/");
        assert_eq!(
            engine.session_info().unwrap().state,
            LifecycleState::Uninitialized
        );
    }

    #[test]
    fn test_default_cwd_is_process_cwd() {
        let engine = ShellEngine::new(EngineConfig::default());
        let expected = std::env::current_dir().unwrap();
        assert_eq!(engine.cwd().unwrap(), expected.to_string_lossy());
    }

    #[test]
    fn test_set_env_validates_and_records() {
        let (engine, sink) = engine_with_sink();

        engine.set_env("FOO", "bar").unwrap();
        assert_eq!(engine.env("FOO").unwrap().as_deref(), Some("bar"));

        let err = engine.set_env("1BAD", "x").unwrap_err();
        assert_eq!(err.kind_name(), "ValidationError");
        assert_eq!(engine.env_overlay().unwrap().len(), 1);

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].operation, "set_env");
        assert_eq!(records[1].status, CommandStatus::InvalidCommand);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_reset_records() {
        let (engine, sink) = engine_with_sink();
        let info = engine.reset().await.unwrap();
        assert_eq!(info.state, LifecycleState::Ready);
        assert_eq!(sink.records()[0].operation, "reset");
        engine.shutdown().await;
    }
}
