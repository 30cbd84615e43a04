//! In-memory mirror of the registry's active domains

use ignore_registry::RegistryStore;
use std::collections::HashSet;
use tracing::warn;

/// Set of hosts the collector believes are persisted as active
///
/// Rebuilt from the store at startup and never written to disk itself. It
/// only exists to short-circuit repeated failures on the hot path.
#[derive(Debug, Clone, Default)]
pub struct IgnoreSetCache {
    hosts: HashSet<String>,
}

impl IgnoreSetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents with the store's active domains
    ///
    /// Returns the number of cached hosts. A failed read keeps the current
    /// contents.
    pub fn rebuild(&mut self, store: &RegistryStore) -> usize {
        match store.try_list_active() {
            Ok(domains) => self.hosts = domains.into_iter().collect(),
            Err(e) => warn!("Keeping {} cached hosts, registry read failed: {}", self.hosts.len(), e),
        }
        self.hosts.len()
    }

    pub fn contains(&self, host: &str) -> bool {
        self.hosts.contains(host)
    }

    /// Returns false if the host was already cached
    pub fn insert(&mut self, host: impl Into<String>) -> bool {
        self.hosts.insert(host.into())
    }

    /// Cached hosts in lexicographic order
    pub fn sorted(&self) -> Vec<String> {
        let mut hosts: Vec<String> = self.hosts.iter().cloned().collect();
        hosts.sort();
        hosts
    }
}
