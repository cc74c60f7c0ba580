//! Interpreter lifecycle state machine.

use serde::Serialize;

/// Lifecycle state of the supervised interpreter process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// No process has been spawned yet.
    #[default]
    Uninitialized,
    /// A process is being spawned and probed.
    Starting,
    /// Process is live and waiting for commands.
    Ready,
    /// A command is in flight.
    Busy,
    /// Process died, hung, or failed to start; the next call respawns.
    Crashed,
    /// Engine shut down; no further transitions possible.
    Terminated,
}

impl LifecycleState {
    /// Check if transition to target state is valid.
    ///
    /// Valid transitions:
    /// - Uninitialized | Crashed | Ready -> Starting
    /// - Starting -> Ready | Crashed
    /// - Ready -> Busy, Busy -> Ready
    /// - Ready | Busy -> Crashed
    /// - any non-terminal -> Terminated
    pub fn can_transition_to(&self, target: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (*self, target),
            (Uninitialized, Starting)
                | (Crashed, Starting)
                | (Ready, Starting)
                | (Starting, Ready)
                | (Starting, Crashed)
                | (Ready, Busy)
                | (Busy, Ready)
                | (Ready, Crashed)
                | (Busy, Crashed)
                | (Uninitialized, Terminated)
                | (Starting, Terminated)
                | (Ready, Terminated)
                | (Busy, Terminated)
                | (Crashed, Terminated)
        )
    }

    /// Attempt to transition to a new state.
    ///
    /// Returns `Ok(())` if the transition is valid, or an error otherwise.
    pub fn transition_to(&mut self, target: LifecycleState) -> crate::Result<()> {
        if self.can_transition_to(target) {
            *self = target;
            Ok(())
        } else {
            Err(crate::error::ShellRelayError::InvalidStateTransition {
                from: *self,
                to: target,
            })
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Terminated)
    }

    /// Check if the next command must spawn a fresh process first.
    pub fn needs_spawn(&self) -> bool {
        matches!(
            self,
            LifecycleState::Uninitialized | LifecycleState::Crashed
        )
    }
}
