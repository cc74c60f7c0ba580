//! Logging initialization and the request log.
//!
//! Diagnostics go through `tracing` to stderr. Request records, carrying
//! the full untrimmed output of every operation, go to a [`RecordSink`].

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::execution::{CommandResult, CommandStatus};

/// Filter used when neither `RUST_LOG` nor a level is configured.
pub const DEFAULT_FILTER: &str = "shell_relay=info";

/// File name of the request log inside the log directory.
pub const REQUEST_LOG_FILE: &str = "shell-relay-requests.jsonl";

fn build_filter(level: Option<&str>) -> EnvFilter {
    match level {
        // Full directives such as `shell_relay=debug,tower_http=trace` pass
        // through; a bare level applies to this crate only.
        Some(level) if level.contains('=') || level.contains(',') => {
            EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
        }
        Some(level) => EnvFilter::try_new(format!("shell_relay={}", level))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    }
}

/// Initialize the logging system.
///
/// An explicit `level` wins over `RUST_LOG`; without either the filter is
/// `shell_relay=info`. Output goes to stderr.
///
/// # Panics
///
/// Panics if another tracing subscriber has already been set.
pub fn init(level: Option<&str>) {
    tracing_subscriber::registry()
        .with(build_filter(level))
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Try to initialize the logging system.
///
/// Returns `Err` if logging has already been initialized.
pub fn try_init() -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(build_filter(None))
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .try_init()
}

/// One request/response pair, as handed to the request log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionRecord {
    /// Unix time in milliseconds.
    pub timestamp_ms: u64,
    /// Operation name (`execute`, `set_cwd`, `set_env`, `reset`).
    pub operation: &'static str,
    /// Command text or operation argument.
    pub command: String,
    /// Working directory the operation ran in.
    pub cwd: String,
    /// Outcome classification.
    pub status: CommandStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Untrimmed standard output.
    pub stdout: String,
    /// Untrimmed standard error.
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Spawn generation of the interpreter that served the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<u64>,
    pub duration_ms: u64,
}

impl ExecutionRecord {
    /// Build a record from an untrimmed result.
    pub fn new(
        operation: &'static str,
        command: impl Into<String>,
        cwd: impl Into<String>,
        result: &CommandResult,
        generation: Option<u64>,
    ) -> Self {
        Self {
            timestamp_ms: unix_millis(),
            operation,
            command: command.into(),
            cwd: cwd.into(),
            status: result.status,
            exit_code: result.exit_code,
            stdout: result.stdout.clone(),
            stderr: result.stderr.clone(),
            message: result.message.clone(),
            generation,
            duration_ms: result.duration_ms,
        }
    }

    /// Record for an operation that produced no command output.
    pub fn operation(
        operation: &'static str,
        detail: impl Into<String>,
        cwd: impl Into<String>,
        status: CommandStatus,
        message: Option<String>,
        duration: Duration,
    ) -> Self {
        Self {
            timestamp_ms: unix_millis(),
            operation,
            command: detail.into(),
            cwd: cwd.into(),
            status,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            message,
            generation: None,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Destination for request records.
///
/// Implementations must not fail the request: write errors are logged and
/// swallowed.
pub trait RecordSink: Send + Sync {
    /// Persist one record.
    fn record(&self, record: &ExecutionRecord);
}

/// Discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl RecordSink for NullSink {
    fn record(&self, _record: &ExecutionRecord) {}
}

/// Appends one JSON object per line to a file.
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlSink {
    /// Open (creating if needed) the request log inside `dir`.
    pub fn open(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(REQUEST_LOG_FILE);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for JsonlSink {
    fn record(&self, record: &ExecutionRecord) {
        let mut line = match serde_json::to_vec(record) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to serialize request record");
                return;
            }
        };
        line.push(b'\n');

        let Ok(mut file) = self.file.lock() else {
            warn!("Request log lock poisoned");
            return;
        };
        if let Err(e) = file.write_all(&line) {
            warn!(path = %self.path.display(), error = %e, "Failed to write request record");
        }
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<ExecutionRecord>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record so far.
    pub fn records(&self) -> Vec<ExecutionRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl RecordSink for MemorySink {
    fn record(&self, record: &ExecutionRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record.clone());
        }
    }
}
