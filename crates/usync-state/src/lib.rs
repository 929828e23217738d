//! Applied-state snapshot storage.
//!
//! The snapshot is the reconciler's only memory of what the control plane was
//! told. `load` on a missing snapshot is an empty set, not an error: a first
//! run and a cold start look the same as "nothing applied yet". `save` is a
//! full replace.

use std::sync::Mutex;

use anyhow::{anyhow, Result};
use usync_schemas::AccountSet;

mod file;

pub use file::{JsonFileStore, SnapshotDocument, SNAPSHOT_SCHEMA};

/// Durable mapping from email to last-applied account.
pub trait SnapshotStore: Send + Sync {
    fn load(&self) -> Result<AccountSet>;

    /// Replace the stored set with `applied`.
    fn save(&self, applied: &AccountSet) -> Result<()>;

    /// Forget everything (cold start). Resetting an absent snapshot is a no-op.
    fn reset(&self) -> Result<()>;
}

/// In-process store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<AccountSet>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Result<AccountSet> {
        let guard = self
            .inner
            .lock()
            .map_err(|_| anyhow!("memory snapshot lock poisoned"))?;
        Ok(guard.clone())
    }

    fn save(&self, applied: &AccountSet) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| anyhow!("memory snapshot lock poisoned"))?;
        *guard = applied.clone();
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| anyhow!("memory snapshot lock poisoned"))?;
        *guard = AccountSet::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use usync_schemas::Account;

    #[test]
    fn memory_store_starts_empty_and_replaces_on_save() {
        let store = MemoryStore::new();
        assert!(store.load().unwrap().is_empty());

        let first: AccountSet = vec![Account::new("1", 0, "ssapi", "a")].into_iter().collect();
        store.save(&first).unwrap();
        let second: AccountSet = vec![Account::new("2", 0, "ssapi", "b")].into_iter().collect();
        store.save(&second).unwrap();

        assert_eq!(store.load().unwrap(), second);
        store.reset().unwrap();
        assert!(store.load().unwrap().is_empty());
    }
}
