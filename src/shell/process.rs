//! The supervised interpreter process.

use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::framing::{Frame, Sentinel, StreamCapture};
use super::pipe::PipeReader;
use super::{Dialect, ShellConfig};
use crate::error::ShellRelayError;
use crate::session::SessionContext;
use crate::Result;

/// Capacity of each pipe's chunk channel.
const CHANNEL_CAPACITY: usize = 256;

/// How long to wait for a killed process to be reaped.
const KILL_GRACE: Duration = Duration::from_secs(5);

/// Outcome of writing a framed script and waiting for its trailers.
#[derive(Debug)]
pub enum Exchange {
    /// Both trailers arrived.
    Completed { stdout: Frame, stderr: Frame },
    /// Deadline passed first; carries whatever arrived.
    TimedOut { stdout: String, stderr: String },
    /// Stdin write failed or a pipe closed mid-exchange.
    Failed {
        reason: String,
        stdout: String,
        stderr: String,
    },
}

/// A live interpreter with piped stdio.
pub struct ShellProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: mpsc::Receiver<Vec<u8>>,
    stderr: mpsc::Receiver<Vec<u8>>,
    pid: Option<u32>,
    path: String,
    dialect: Dialect,
    spawned_at: Instant,
}

impl ShellProcess {
    /// Spawn the configured interpreter and wait until it answers a probe.
    ///
    /// The fallback path is tried when the primary executable is missing or
    /// not executable.
    pub async fn spawn(config: &ShellConfig, ctx: &SessionContext) -> Result<Self> {
        let mut candidates = vec![config.path.as_str()];
        if let Some(fallback) = config.fallback_path.as_deref() {
            if fallback != config.path {
                candidates.push(fallback);
            }
        }

        let mut last_error = None;
        for path in candidates {
            let dialect = config.dialect.unwrap_or_else(|| Dialect::detect(path));
            match Self::launch(path, dialect, ctx) {
                Ok(mut process) => {
                    process.probe(config.startup_timeout).await?;
                    info!(
                        pid = ?process.pid,
                        path = %process.path,
                        dialect = %process.dialect,
                        "Interpreter ready"
                    );
                    return Ok(process);
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
                    ) =>
                {
                    warn!(path, error = %e, "Interpreter not launchable, trying next candidate");
                    last_error = Some(ShellRelayError::Spawn {
                        path: path.to_string(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    return Err(ShellRelayError::Spawn {
                        path: path.to_string(),
                        reason: e.to_string(),
                    })
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ShellRelayError::Spawn {
            path: config.path.clone(),
            reason: "no interpreter configured".to_string(),
        }))
    }

    fn launch(path: &str, dialect: Dialect, ctx: &SessionContext) -> io::Result<Self> {
        let mut command = Command::new(path);
        command
            .args(dialect.args(path))
            .envs(ctx.env())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // A vanished directory is surfaced by the first framed `cd` instead.
        if Path::new(ctx.cwd()).is_dir() {
            command.current_dir(ctx.cwd());
        }

        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("stdin was not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("stderr was not captured"))?;

        let (out_tx, out_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (err_tx, err_rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(PipeReader::new(stdout, out_tx, "stdout").run());
        tokio::spawn(PipeReader::new(stderr, err_tx, "stderr").run());

        let pid = child.id();
        debug!(?pid, path, "Interpreter spawned");

        Ok(Self {
            child,
            stdin,
            stdout: out_rx,
            stderr: err_rx,
            pid,
            path: path.to_string(),
            dialect,
            spawned_at: Instant::now(),
        })
    }

    async fn probe(&mut self, timeout: Duration) -> Result<()> {
        let sentinel = Sentinel::new();
        let script = self.dialect.frame_probe(&sentinel);
        let reason = match self.exchange(&script, &sentinel, timeout).await {
            Exchange::Completed { .. } => return Ok(()),
            Exchange::TimedOut { .. } => {
                format!("not ready within {}s", crate::error::format_secs(&timeout))
            }
            Exchange::Failed { reason, stderr, .. } if !stderr.trim().is_empty() => {
                format!("{}: {}", reason, stderr.trim())
            }
            Exchange::Failed { reason, .. } => reason,
        };
        self.kill().await;
        Err(ShellRelayError::Spawn {
            path: self.path.clone(),
            reason,
        })
    }

    /// Write `script` and collect both streams until their trailers arrive
    /// or `timeout` elapses.
    pub async fn exchange(&mut self, script: &str, sentinel: &Sentinel, timeout: Duration) -> Exchange {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut out = StreamCapture::new(sentinel);
        let mut err = StreamCapture::new(sentinel);

        self.discard_stale_output();
        if let Err(e) = self.write_script(script).await {
            return Exchange::Failed {
                reason: format!("write to interpreter stdin failed: {}", e),
                stdout: String::new(),
                stderr: String::new(),
            };
        }

        let sleep = tokio::time::sleep_until(deadline);
        tokio::pin!(sleep);

        while !(out.is_complete() && err.is_complete()) {
            tokio::select! {
                _ = &mut sleep => {
                    return Exchange::TimedOut {
                        stdout: out.partial_text(),
                        stderr: err.partial_text(),
                    };
                }
                chunk = self.stdout.recv(), if !out.is_complete() => match chunk {
                    Some(bytes) => {
                        out.push(&bytes);
                    }
                    None => return closed("stdout", &out, &err),
                },
                chunk = self.stderr.recv(), if !err.is_complete() => match chunk {
                    Some(bytes) => {
                        err.push(&bytes);
                    }
                    None => return closed("stderr", &out, &err),
                },
            }
        }

        match (out.into_frame(), err.into_frame()) {
            (Some(stdout), Some(stderr)) => Exchange::Completed { stdout, stderr },
            _ => Exchange::Failed {
                reason: "trailer lost".to_string(),
                stdout: String::new(),
                stderr: String::new(),
            },
        }
    }

    // Background jobs from earlier commands may still be writing.
    fn discard_stale_output(&mut self) {
        let mut stale = 0;
        while let Ok(chunk) = self.stdout.try_recv() {
            stale += chunk.len();
        }
        while let Ok(chunk) = self.stderr.try_recv() {
            stale += chunk.len();
        }
        if stale > 0 {
            debug!(bytes = stale, "Discarded output produced between commands");
        }
    }

    async fn write_script(&mut self, script: &str) -> io::Result<()> {
        self.stdin.write_all(script.as_bytes()).await?;
        self.stdin.flush().await
    }

    /// Kill the interpreter and everything it started, then reap it.
    ///
    /// Safe to call on a process that has already exited.
    pub async fn kill(&mut self) {
        // The group id is the child's pid because of process_group(0).
        #[cfg(unix)]
        if let Some(pid) = self.pid {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                debug!(pid, error = %e, "killpg on interpreter group");
            }
        }

        if let Err(e) = self.child.start_kill() {
            debug!(error = %e, "start_kill on interpreter");
        }
        match tokio::time::timeout(KILL_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => debug!(?status, pid = ?self.pid, "Interpreter reaped"),
            Ok(Err(e)) => warn!(error = %e, "Failed to reap interpreter"),
            Err(_) => warn!(pid = ?self.pid, "Interpreter not reaped within grace period"),
        }
    }

    /// Whether the process has already exited.
    pub fn has_exited(&mut self) -> bool {
        !matches!(self.child.try_wait(), Ok(None))
    }

    /// OS process id.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Path of the executable that was actually launched.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Framing dialect in use.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// When the process was spawned.
    pub fn spawned_at(&self) -> Instant {
        self.spawned_at
    }
}

impl std::fmt::Debug for ShellProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellProcess")
            .field("pid", &self.pid)
            .field("path", &self.path)
            .field("dialect", &self.dialect)
            .finish()
    }
}

fn closed(stream: &str, out: &StreamCapture, err: &StreamCapture) -> Exchange {
    Exchange::Failed {
        reason: format!("interpreter closed {}", stream),
        stdout: out.partial_text(),
        stderr: err.partial_text(),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh_config() -> ShellConfig {
        ShellConfig {
            path: "/bin/sh".to_string(),
            fallback_path: None,
            dialect: None,
            startup_timeout: Duration::from_secs(10),
        }
    }

    fn ctx() -> SessionContext {
        SessionContext::with_cwd("/")
    }

    #[tokio::test]
    async fn test_spawn_and_exchange() {
        let mut process = ShellProcess::spawn(&sh_config(), &ctx()).await.unwrap();
        assert!(process.pid().is_some());
        assert_eq!(process.dialect(), Dialect::Posix);

        let sentinel = Sentinel::new();
        let script = process
            .dialect()
            .frame_command(&ctx(), "echo out; echo err >&2; exit 4", &sentinel);

        match process.exchange(&script, &sentinel, Duration::from_secs(10)).await {
            Exchange::Completed { stdout, stderr } => {
                assert_eq!(stdout.body, "out\n");
                assert_eq!(stderr.body, "err\n");
                assert_eq!(stdout.exit_code, 4);
                assert_eq!(stderr.exit_code, 4);
                assert_eq!(stdout.cwd.as_deref(), Some("/"));
            }
            other => panic!("unexpected exchange: {:?}", other),
        }

        assert!(!process.has_exited());
        process.kill().await;
        assert!(process.has_exited());
    }

    #[tokio::test]
    async fn test_exchange_timeout_keeps_partial_output() {
        let mut process = ShellProcess::spawn(&sh_config(), &ctx()).await.unwrap();

        let sentinel = Sentinel::new();
        let script = process
            .dialect()
            .frame_command(&ctx(), "echo early; sleep 30", &sentinel);

        match process.exchange(&script, &sentinel, Duration::from_millis(500)).await {
            Exchange::TimedOut { stdout, .. } => assert_eq!(stdout, "early\n"),
            other => panic!("unexpected exchange: {:?}", other),
        }
        process.kill().await;
    }

    #[tokio::test]
    async fn test_fallback_path() {
        let config = ShellConfig {
            path: "/nonexistent/shell-relay-test-shell".to_string(),
            fallback_path: Some("/bin/sh".to_string()),
            ..sh_config()
        };
        let mut process = ShellProcess::spawn(&config, &ctx()).await.unwrap();
        assert_eq!(process.path(), "/bin/sh");
        process.kill().await;
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let config = ShellConfig {
            path: "/nonexistent/shell-relay-test-shell".to_string(),
            ..sh_config()
        };
        let err = ShellProcess::spawn(&config, &ctx()).await.unwrap_err();
        assert!(matches!(err, ShellRelayError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_exchange_after_exit_fails() {
        let mut process = ShellProcess::spawn(&sh_config(), &ctx()).await.unwrap();

        let sentinel = Sentinel::new();
        match process.exchange("exit 0\n", &sentinel, Duration::from_secs(5)).await {
            Exchange::Failed { .. } => {}
            other => panic!("unexpected exchange: {:?}", other),
        }
        process.kill().await;
    }
}
