//! Process-independent session state.

use std::collections::BTreeMap;

/// Working directory and environment overlay tracked outside the
/// interpreter.
///
/// This is the authoritative copy: it is re-applied to every freshly
/// spawned process and re-asserted by every framed command, so losing the
/// process never loses the state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    /// Current working directory.
    cwd: String,
    /// Variables layered on top of the inherited environment.
    env: BTreeMap<String, String>,
    /// Exit code of the last completed command.
    last_exit_code: Option<i32>,
    /// Number of completed commands.
    execution_count: u64,
}

impl SessionContext {
    /// Create a context rooted at `cwd`.
    pub fn with_cwd(cwd: impl Into<String>) -> Self {
        Self {
            cwd: cwd.into(),
            ..Default::default()
        }
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    /// Set the current working directory.
    pub fn set_cwd(&mut self, cwd: impl Into<String>) {
        self.cwd = cwd.into();
    }

    /// Get the environment overlay.
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Get an overlay variable.
    pub fn get_env(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(|s| s.as_str())
    }

    /// Set an overlay variable; last write wins.
    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env.insert(key.into(), value.into());
    }

    /// Get the exit code of the last completed command.
    pub fn last_exit_code(&self) -> Option<i32> {
        self.last_exit_code
    }

    /// Get the number of completed commands.
    pub fn execution_count(&self) -> u64 {
        self.execution_count
    }

    /// Record a completed command.
    pub fn record_execution(&mut self, exit_code: Option<i32>) {
        self.last_exit_code = exit_code;
        self.execution_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_default() {
        let ctx = SessionContext::default();
        assert_eq!(ctx.cwd(), "");
        assert!(ctx.env().is_empty());
        assert!(ctx.last_exit_code().is_none());
        assert_eq!(ctx.execution_count(), 0);
    }

    #[test]
    fn test_context_set_cwd() {
        let mut ctx = SessionContext::with_cwd("/home/user");
        assert_eq!(ctx.cwd(), "/home/user");
        ctx.set_cwd("/tmp");
        assert_eq!(ctx.cwd(), "/tmp");
    }

    #[test]
    fn test_env_last_write_wins() {
        let mut ctx = SessionContext::default();
        ctx.set_env("FOO", "one");
        ctx.set_env("FOO", "two");
        ctx.set_env("BAR", "x");

        assert_eq!(ctx.get_env("FOO"), Some("two"));
        assert_eq!(ctx.env().len(), 2);
        assert_eq!(ctx.get_env("MISSING"), None);
    }

    #[test]
    fn test_env_is_ordered() {
        let mut ctx = SessionContext::default();
        ctx.set_env("ZED", "1");
        ctx.set_env("ALPHA", "2");
        let keys: Vec<_> = ctx.env().keys().cloned().collect();
        assert_eq!(keys, vec!["ALPHA", "ZED"]);
    }

    #[test]
    fn test_record_execution() {
        let mut ctx = SessionContext::default();
        ctx.record_execution(Some(0));
        ctx.record_execution(Some(2));
        ctx.record_execution(None);

        assert_eq!(ctx.last_exit_code(), None);
        assert_eq!(ctx.execution_count(), 3);
    }
}
