//! Memoized device command output.

use super::{Cache, CacheConfig, CacheMetrics};
use crate::dispatch::CommandOutput;
use std::sync::Arc;
use tracing::trace;

/// Default number of outputs kept per run
pub const DEFAULT_CAPACITY: usize = 128;

/// `(session identity, exact command text)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandKey {
    pub session: String,
    pub command: String,
}

impl CommandKey {
    pub fn new(session: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            command: command.into(),
        }
    }
}

/// Command output cache shared by every check in a run
#[derive(Debug)]
pub struct CommandCache {
    inner: Cache<CommandKey, CommandOutput>,
}

impl Default for CommandCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl CommandCache {
    /// A capacity of 0 disables memoization
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Cache::new(CacheConfig::with_capacity(capacity)),
        }
    }

    pub fn disabled() -> Self {
        Self::new(0)
    }

    pub fn shared(capacity: usize) -> Arc<Self> {
        Arc::new(Self::new(capacity))
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_enabled()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    pub fn get(&self, session: &str, command: &str) -> Option<CommandOutput> {
        let hit = self.inner.get(&CommandKey::new(session, command));
        if hit.is_some() {
            trace!(session, command, "Command cache hit");
        }
        hit
    }

    pub fn insert(&self, session: &str, command: &str, output: CommandOutput) {
        self.inner.insert(CommandKey::new(session, command), output);
    }

    /// Forget every cached output
    pub fn clear(&self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn metrics(&self) -> Arc<CacheMetrics> {
        self.inner.metrics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_keyed_by_session_and_command() {
        let cache = CommandCache::default();
        cache.insert("admin@leaf1:22#1", "show version", CommandOutput::Text("v1".into()));

        assert!(cache.get("admin@leaf1:22#1", "show version").is_some());
        assert!(cache.get("admin@leaf1:22#2", "show version").is_none());
        assert!(cache.get("admin@leaf1:22#1", "show version | json").is_none());
        assert_eq!(cache.metrics().hits.load(Ordering::Relaxed), 1);
        assert_eq!(cache.metrics().misses.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_zero_capacity_disables() {
        let cache = CommandCache::new(0);
        cache.insert("s", "show vlan", CommandOutput::Text(String::new()));
        assert!(!cache.is_enabled());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_forgets_every_session() {
        let cache = CommandCache::default();
        cache.insert("s1", "show vlan", CommandOutput::Text("a".into()));
        cache.insert("s2", "show vlan", CommandOutput::Text("b".into()));

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get("s1", "show vlan").is_none());
        assert_eq!(cache.metrics().invalidations.load(Ordering::Relaxed), 2);
    }
}
