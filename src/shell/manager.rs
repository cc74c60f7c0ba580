//! Session supervision.
//!
//! The manager owns the single interpreter slot behind a fair async mutex.
//! Holding a [`SessionLease`] is holding the execution lock; everything that
//! touches the process goes through one.

use std::sync::{Arc, RwLock};
use std::time::Instant;

use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{error, info, warn};

use super::{ShellConfig, ShellProcess};
use crate::error::ShellRelayError;
use crate::session::{LifecycleState, StateStore};
use crate::Result;

/// Point-in-time view of the supervised interpreter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    /// Lifecycle state.
    pub state: LifecycleState,
    /// Spawn generation; 0 until the first successful spawn.
    pub generation: u64,
    /// OS process id of the live interpreter.
    pub pid: Option<u32>,
    /// Executable actually launched.
    pub interpreter: Option<String>,
    /// Number of spawns after the first.
    pub restart_count: u64,
    /// Seconds since the live interpreter was spawned.
    pub uptime_secs: Option<f64>,
    /// Exit code of the last command that ran to completion.
    pub last_exit_code: Option<i32>,
    /// Commands that ran to completion, across all generations.
    pub execution_count: u64,
}

#[derive(Debug, Default)]
struct Supervision {
    state: LifecycleState,
    generation: u64,
    pid: Option<u32>,
    interpreter: Option<String>,
    spawned_at: Option<Instant>,
}

/// Owns the interpreter process and its lifecycle.
#[derive(Debug)]
pub struct SessionManager {
    config: ShellConfig,
    store: Arc<StateStore>,
    slot: Mutex<Option<ShellProcess>>,
    supervision: RwLock<Supervision>,
}

impl SessionManager {
    /// Create a manager. Nothing is spawned until the first lease asks for a
    /// live process.
    pub fn new(config: ShellConfig, store: Arc<StateStore>) -> Self {
        Self {
            config,
            store,
            slot: Mutex::new(None),
            supervision: RwLock::new(Supervision::default()),
        }
    }

    /// Wait for exclusive access to the interpreter. Waiters are served in
    /// arrival order.
    pub async fn acquire(&self) -> SessionLease<'_> {
        SessionLease {
            manager: self,
            slot: self.slot.lock().await,
        }
    }

    /// Kill the current interpreter and spawn a fresh one.
    pub async fn reset(&self) -> Result<SessionInfo> {
        let mut lease = self.acquire().await;
        lease.restart().await?;
        self.info()
    }

    /// Kill the interpreter permanently.
    pub async fn shutdown(&self) {
        let mut lease = self.acquire().await;
        lease.terminate().await;
    }

    /// Current lifecycle state, readable without the execution lock.
    pub fn state(&self) -> Result<LifecycleState> {
        let supervision = self
            .supervision
            .read()
            .map_err(|_| ShellRelayError::LockPoisoned)?;
        Ok(supervision.state)
    }

    /// Snapshot of the supervision record, readable without the execution
    /// lock.
    pub fn info(&self) -> Result<SessionInfo> {
        let (last_exit_code, execution_count) = self.store.activity()?;
        let supervision = self
            .supervision
            .read()
            .map_err(|_| ShellRelayError::LockPoisoned)?;
        Ok(SessionInfo {
            state: supervision.state,
            generation: supervision.generation,
            pid: supervision.pid,
            interpreter: supervision.interpreter.clone(),
            restart_count: supervision.generation.saturating_sub(1),
            uptime_secs: supervision
                .spawned_at
                .map(|at| at.elapsed().as_secs_f64()),
            last_exit_code,
            execution_count,
        })
    }

    fn transition(&self, target: LifecycleState) -> Result<()> {
        let mut supervision = self
            .supervision
            .write()
            .map_err(|_| ShellRelayError::LockPoisoned)?;
        supervision.state.transition_to(target)
    }

    fn record_spawn(&self, process: &ShellProcess) -> Result<u64> {
        let mut supervision = self
            .supervision
            .write()
            .map_err(|_| ShellRelayError::LockPoisoned)?;
        supervision.generation += 1;
        supervision.pid = process.pid();
        supervision.interpreter = Some(process.path().to_string());
        supervision.spawned_at = Some(process.spawned_at());
        supervision.state.transition_to(LifecycleState::Ready)?;
        Ok(supervision.generation)
    }

    fn clear_process(&self) -> Result<()> {
        let mut supervision = self
            .supervision
            .write()
            .map_err(|_| ShellRelayError::LockPoisoned)?;
        supervision.pid = None;
        supervision.spawned_at = None;
        Ok(())
    }
}

/// Exclusive access to the interpreter slot.
pub struct SessionLease<'a> {
    manager: &'a SessionManager,
    slot: MutexGuard<'a, Option<ShellProcess>>,
}

impl SessionLease<'_> {
    /// Make sure a responsive interpreter is in the slot, spawning one if
    /// there is none, it has exited, or it was marked dead.
    pub async fn ensure_live(&mut self) -> Result<()> {
        let state = self.manager.state()?;
        if state.is_terminal() {
            return Err(ShellRelayError::SessionTerminated);
        }

        self.recover_abandoned().await?;
        if let Some(process) = self.slot.as_mut() {
            if process.has_exited() {
                self.mark_dead("interpreter exited between commands").await;
            }
        }

        if self.slot.is_some() && !self.manager.state()?.needs_spawn() {
            return Ok(());
        }
        self.spawn().await
    }

    /// Kill whatever is running and spawn a fresh interpreter.
    pub async fn restart(&mut self) -> Result<()> {
        if self.manager.state()?.is_terminal() {
            return Err(ShellRelayError::SessionTerminated);
        }
        self.recover_abandoned().await?;
        self.spawn().await
    }

    // A lease dropped mid-command or mid-spawn (its future was cancelled)
    // leaves the state Busy or Starting with unread output in the pipes.
    async fn recover_abandoned(&mut self) -> Result<()> {
        if matches!(
            self.manager.state()?,
            LifecycleState::Busy | LifecycleState::Starting
        ) {
            self.mark_dead("previous command was abandoned").await;
        }
        Ok(())
    }

    async fn spawn(&mut self) -> Result<()> {
        if let Some(mut old) = self.slot.take() {
            old.kill().await;
            self.manager.clear_process()?;
        }

        self.manager.transition(LifecycleState::Starting)?;
        let ctx = self.manager.store.snapshot()?;

        match ShellProcess::spawn(&self.manager.config, &ctx).await {
            Ok(process) => {
                let generation = self.manager.record_spawn(&process)?;
                info!(generation, pid = ?process.pid(), "Session ready");
                *self.slot = Some(process);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to start interpreter");
                self.manager.transition(LifecycleState::Crashed)?;
                Err(e)
            }
        }
    }

    /// The live interpreter.
    pub fn process_mut(&mut self) -> Result<&mut ShellProcess> {
        self.slot
            .as_mut()
            .ok_or_else(|| ShellRelayError::ProcessFailure("no live interpreter".to_string()))
    }

    /// Current spawn generation.
    pub fn generation(&self) -> Result<u64> {
        Ok(self.manager.info()?.generation)
    }

    /// Mark the interpreter busy with a command.
    pub fn begin_command(&self) -> Result<()> {
        self.manager.transition(LifecycleState::Busy)
    }

    /// Mark the command finished with the interpreter still healthy.
    pub fn end_command(&self) -> Result<()> {
        self.manager.transition(LifecycleState::Ready)
    }

    /// Kill and reap the interpreter tree and mark the session crashed.
    /// Idempotent.
    pub async fn mark_dead(&mut self, reason: &str) {
        if let Some(mut process) = self.slot.take() {
            warn!(reason, pid = ?process.pid(), "Discarding interpreter");
            process.kill().await;
        }
        if let Err(e) = self.manager.clear_process() {
            warn!(error = %e, "Failed to clear process record");
        }
        if let Ok(state) = self.manager.state() {
            if !state.is_terminal() && state != LifecycleState::Crashed {
                if let Err(e) = self.manager.transition(LifecycleState::Crashed) {
                    warn!(error = %e, "Failed to mark session crashed");
                }
            }
        }
    }

    /// Kill the interpreter and refuse further spawns.
    pub async fn terminate(&mut self) {
        if let Some(mut process) = self.slot.take() {
            process.kill().await;
        }
        if let Err(e) = self.manager.clear_process() {
            warn!(error = %e, "Failed to clear process record");
        }
        match self.manager.transition(LifecycleState::Terminated) {
            Ok(()) => info!("Session terminated"),
            Err(e) => warn!(error = %e, "Session already terminated"),
        }
    }
}
