//! Command execution engine.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::request::CommandRequest;
use super::result::{CommandResult, CommandStatus};
use crate::error::ShellRelayError;
use crate::logging::{ExecutionRecord, RecordSink};
use crate::security::{sanitize_for_display, CommandValidator, ValidationError};
use crate::session::StateStore;
use crate::shell::{Exchange, Sentinel, SessionManager};

/// Default execution timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default per-stream trim length.
pub const DEFAULT_TRIM_CHARS: usize = 500;

/// Defaults applied when a request does not override them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionLimits {
    /// Deadline for commands without an explicit timeout.
    pub default_timeout: Duration,
    /// Trim length for requests without an explicit one.
    pub default_trim_chars: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            default_trim_chars: DEFAULT_TRIM_CHARS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Execute,
    ChangeDirectory,
}

impl Operation {
    fn name(&self) -> &'static str {
        match self {
            Operation::Execute => "execute",
            Operation::ChangeDirectory => "set_cwd",
        }
    }
}

/// Untrimmed outcome plus what the record needs.
struct Run {
    result: CommandResult,
    cwd: String,
    generation: Option<u64>,
}

/// Runs framed commands against the session's interpreter.
pub struct CommandExecutor {
    manager: Arc<SessionManager>,
    store: Arc<StateStore>,
    validator: CommandValidator,
    limits: ExecutionLimits,
    track_cwd: bool,
    sink: Arc<dyn RecordSink>,
}

impl CommandExecutor {
    /// Create a new command executor.
    pub fn new(
        manager: Arc<SessionManager>,
        store: Arc<StateStore>,
        validator: CommandValidator,
        limits: ExecutionLimits,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            manager,
            store,
            validator,
            limits,
            track_cwd: false,
            sink,
        }
    }

    /// Fold the cwd a command leaves behind into the tracked cwd.
    pub fn track_cwd(mut self, enabled: bool) -> Self {
        self.track_cwd = enabled;
        self
    }

    /// Run one command.
    ///
    /// Never fails: every outcome, including rejected input, is a
    /// classified [`CommandResult`] with both streams trimmed.
    pub async fn execute(&self, request: &CommandRequest) -> CommandResult {
        let started = Instant::now();
        let trim_chars = request.trim_chars.unwrap_or(self.limits.default_trim_chars);

        let run = match self.validate(request) {
            Ok(timeout) => {
                self.run(Operation::Execute, &request.command, timeout)
                    .await
            }
            Err(e) => self.rejected(&e),
        };
        self.finish(Operation::Execute, &request.command, run, started, trim_chars)
    }

    /// Change the tracked working directory by running a framed `cd`.
    ///
    /// Relative paths resolve against the current tracked cwd. The tracked
    /// cwd only changes when the interpreter accepted the directory.
    pub async fn change_directory(&self, path: &str) -> CommandResult {
        let started = Instant::now();

        let mut run = match self.validator.validate_path(path) {
            Ok(()) => {
                self.run(Operation::ChangeDirectory, path, self.limits.default_timeout)
                    .await
            }
            Err(e) => self.rejected(&e),
        };
        if run.result.success() {
            if let Ok(cwd) = self.store.cwd() {
                run.result = run
                    .result
                    .with_message(format!("working directory is now {}", cwd));
            }
        }
        self.finish(
            Operation::ChangeDirectory,
            path,
            run,
            started,
            self.limits.default_trim_chars,
        )
    }

    /// Record and return a rejection for input that never made it into a
    /// [`CommandRequest`], such as a non-text command.
    pub fn reject(&self, command: &str, error: &ValidationError, trim_chars: Option<usize>) -> CommandResult {
        let trim_chars = trim_chars.unwrap_or(self.limits.default_trim_chars);
        self.finish(
            Operation::Execute,
            command,
            self.rejected(error),
            Instant::now(),
            trim_chars,
        )
    }

    fn validate(&self, request: &CommandRequest) -> Result<Duration, ValidationError> {
        self.validator.validate_command(&request.command)?;
        match request.timeout_secs {
            Some(secs) => self.validator.validate_timeout(secs),
            None => Ok(self.limits.default_timeout),
        }
    }

    fn rejected(&self, error: &ValidationError) -> Run {
        Run {
            result: CommandResult::invalid(error),
            cwd: self.store.cwd().unwrap_or_default(),
            generation: None,
        }
    }

    async fn run(&self, op: Operation, argument: &str, timeout: Duration) -> Run {
        let mut lease = self.manager.acquire().await;

        if let Err(e) = lease.ensure_live().await {
            return Run {
                result: CommandResult::from_error(&e),
                cwd: self.store.cwd().unwrap_or_default(),
                generation: None,
            };
        }
        let generation = lease.generation().ok();

        let ctx = match self.store.snapshot() {
            Ok(ctx) => ctx,
            Err(e) => {
                return Run {
                    result: CommandResult::from_error(&e),
                    cwd: String::new(),
                    generation,
                }
            }
        };
        let cwd = ctx.cwd().to_string();

        if let Err(e) = lease.begin_command() {
            return Run {
                result: CommandResult::from_error(&e),
                cwd,
                generation,
            };
        }

        let sentinel = Sentinel::new();
        let (dialect, exchange) = match lease.process_mut() {
            Ok(process) => {
                let dialect = process.dialect();
                let script = match op {
                    Operation::Execute => dialect.frame_command(&ctx, argument, &sentinel),
                    Operation::ChangeDirectory => dialect.frame_change_dir(&ctx, argument, &sentinel),
                };
                (dialect, process.exchange(&script, &sentinel, timeout).await)
            }
            Err(e) => {
                let reason = e.to_string();
                lease.mark_dead(&reason).await;
                return Run {
                    result: CommandResult::internal_error(
                        &ShellRelayError::ProcessFailure(reason),
                        String::new(),
                        String::new(),
                    ),
                    cwd,
                    generation,
                };
            }
        };

        let result = match exchange {
            Exchange::Completed { stdout, stderr } => {
                if let Err(e) = lease.end_command() {
                    warn!(error = %e, "Failed to mark session ready");
                }
                let exit_code = stdout.exit_code;
                self.observe_cwd(op, exit_code, stdout.cwd.as_deref());
                if let Err(e) = self.store.update(|ctx| ctx.record_execution(Some(exit_code))) {
                    warn!(error = %e, "Failed to record execution");
                }
                CommandResult::completed(dialect, exit_code, stdout.body, stderr.body)
            }
            Exchange::TimedOut { stdout, stderr } => {
                lease.mark_dead("command timed out").await;
                CommandResult::timeout(timeout, stdout, stderr)
            }
            Exchange::Failed {
                reason,
                stdout,
                stderr,
            } => {
                lease.mark_dead(&reason).await;
                CommandResult::internal_error(&ShellRelayError::ProcessFailure(reason), stdout, stderr)
            }
        };

        Run {
            result,
            cwd,
            generation,
        }
    }

    fn observe_cwd(&self, op: Operation, exit_code: i32, observed: Option<&str>) {
        let Some(cwd) = observed else {
            return;
        };
        let adopt = match op {
            Operation::ChangeDirectory => exit_code == 0,
            Operation::Execute => self.track_cwd,
        };
        if !adopt {
            return;
        }
        match self.store.set_cwd(cwd) {
            Ok(()) => debug!(cwd, "Tracked cwd updated"),
            Err(e) => warn!(error = %e, "Failed to update tracked cwd"),
        }
    }

    fn finish(
        &self,
        op: Operation,
        argument: &str,
        run: Run,
        started: Instant,
        trim_chars: usize,
    ) -> CommandResult {
        let result = run.result.with_duration(started.elapsed());

        self.sink.record(&ExecutionRecord::new(
            op.name(),
            argument,
            run.cwd,
            &result,
            run.generation,
        ));

        let command = sanitize_for_display(argument);
        match result.status {
            CommandStatus::Ok | CommandStatus::ShellError => info!(
                operation = op.name(),
                status = %result.status,
                exit_code = ?result.exit_code,
                duration_ms = result.duration_ms,
                %command,
                "Command finished"
            ),
            _ => warn!(
                operation = op.name(),
                status = %result.status,
                message = ?result.message,
                duration_ms = result.duration_ms,
                %command,
                "Command failed"
            ),
        }

        result.trimmed(trim_chars)
    }
}
