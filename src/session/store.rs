//! Thread-safe state store.

use std::collections::BTreeMap;
use std::sync::RwLock;

use super::SessionContext;
use crate::error::ShellRelayError;
use crate::Result;

/// Single source of truth for the session's working directory and
/// environment overlay.
///
/// Reads do not take the execution lock. Writers that follow a command
/// (cwd observation) update the store before the lock is released, so a
/// subsequent read always sees the most recently completed command.
#[derive(Debug, Default)]
pub struct StateStore {
    context: RwLock<SessionContext>,
}

impl StateStore {
    /// Create a store rooted at `cwd`.
    pub fn new(cwd: impl Into<String>) -> Self {
        Self {
            context: RwLock::new(SessionContext::with_cwd(cwd)),
        }
    }

    /// Create a store rooted at the engine's own working directory.
    pub fn from_process_cwd() -> Self {
        let cwd = std::env::current_dir()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| ".".to_string());
        Self::new(cwd)
    }

    /// Get the tracked working directory.
    pub fn cwd(&self) -> Result<String> {
        let ctx = self
            .context
            .read()
            .map_err(|_| ShellRelayError::LockPoisoned)?;
        Ok(ctx.cwd().to_string())
    }

    /// Replace the tracked working directory.
    pub fn set_cwd(&self, cwd: impl Into<String>) -> Result<()> {
        let mut ctx = self
            .context
            .write()
            .map_err(|_| ShellRelayError::LockPoisoned)?;
        ctx.set_cwd(cwd);
        Ok(())
    }

    /// Look up a variable: the overlay first, then the inherited
    /// environment of the engine process.
    pub fn env(&self, name: &str) -> Result<Option<String>> {
        let ctx = self
            .context
            .read()
            .map_err(|_| ShellRelayError::LockPoisoned)?;
        Ok(ctx
            .get_env(name)
            .map(str::to_string)
            .or_else(|| std::env::var(name).ok()))
    }

    /// Set an overlay variable; last write wins.
    pub fn set_env(&self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let mut ctx = self
            .context
            .write()
            .map_err(|_| ShellRelayError::LockPoisoned)?;
        ctx.set_env(name, value);
        Ok(())
    }

    /// Exit code of the last completed command and how many have completed.
    pub fn activity(&self) -> Result<(Option<i32>, u64)> {
        let ctx = self
            .context
            .read()
            .map_err(|_| ShellRelayError::LockPoisoned)?;
        Ok((ctx.last_exit_code(), ctx.execution_count()))
    }

    /// Copy of the overlay only.
    pub fn overlay(&self) -> Result<BTreeMap<String, String>> {
        let ctx = self
            .context
            .read()
            .map_err(|_| ShellRelayError::LockPoisoned)?;
        Ok(ctx.env().clone())
    }

    /// Consistent copy of the whole context.
    pub fn snapshot(&self) -> Result<SessionContext> {
        let ctx = self
            .context
            .read()
            .map_err(|_| ShellRelayError::LockPoisoned)?;
        Ok(ctx.clone())
    }

    /// Update the context using a closure.
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut SessionContext),
    {
        let mut ctx = self
            .context
            .write()
            .map_err(|_| ShellRelayError::LockPoisoned)?;
        f(&mut ctx);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cwd_roundtrip() {
        let store = StateStore::new("/home/user");
        assert_eq!(store.cwd().unwrap(), "/home/user");

        store.set_cwd("/tmp").unwrap();
        assert_eq!(store.cwd().unwrap(), "/tmp");
        // Idempotent reads
        assert_eq!(store.cwd().unwrap(), store.cwd().unwrap());
    }

    #[test]
    fn test_from_process_cwd() {
        let store = StateStore::from_process_cwd();
        let expected = std::env::current_dir().unwrap();
        assert_eq!(store.cwd().unwrap(), expected.to_string_lossy());
    }

    #[test]
    fn test_overlay_shadows_inherited() {
        let store = StateStore::new("/");
        let inherited = std::env::var("PATH").ok();
        assert_eq!(store.env("PATH").unwrap(), inherited);

        store.set_env("PATH", "/overlay/bin").unwrap();
        assert_eq!(store.env("PATH").unwrap().as_deref(), Some("/overlay/bin"));
    }

    #[test]
    fn test_missing_variable() {
        let store = StateStore::new("/");
        assert_eq!(
            store.env("SHELL_RELAY_SURELY_UNSET_VARIABLE").unwrap(),
            None
        );
    }

    #[test]
    fn test_overlay_only_lists_overrides() {
        let store = StateStore::new("/");
        store.set_env("FOO", "bar").unwrap();
        store.set_env("FOO", "baz").unwrap();

        let overlay = store.overlay().unwrap();
        assert_eq!(overlay.len(), 1);
        assert_eq!(overlay.get("FOO").map(String::as_str), Some("baz"));
    }

    #[test]
    fn test_update_and_snapshot() {
        let store = StateStore::new("/");
        store.update(|ctx| ctx.record_execution(Some(3))).unwrap();

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.last_exit_code(), Some(3));
        assert_eq!(snapshot.execution_count(), 1);
        assert_eq!(store.activity().unwrap(), (Some(3), 1));
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(StateStore::new("/"));
        let mut handles = vec![];

        for i in 0..50 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                store.set_env(format!("VAR_{}", i), i.to_string()).unwrap();
                store.cwd().unwrap()
            }));
        }

        for handle in handles {
            assert_eq!(handle.join().unwrap(), "/");
        }
        assert_eq!(store.overlay().unwrap().len(), 50);
    }
}
