//! Session state.
//!
//! This module holds the state that outlives any single interpreter
//! process: the lifecycle state machine and the working directory /
//! environment overlay store.

mod context;
mod state;
mod store;

pub use context::SessionContext;
pub use state::LifecycleState;
pub use store::StateStore;
