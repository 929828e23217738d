use std::collections::HashSet;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use usync_runtime::{DesiredSource, TrafficLedger};
use usync_schemas::{Account, AccountSet, TrafficSample};
use usync_state::{MemoryStore, SnapshotStore};

/// Desired source backed by a replaceable row list.
#[derive(Default)]
pub struct StaticSource {
    rows: Mutex<Vec<Account>>,
    unavailable: Mutex<bool>,
}

impl StaticSource {
    pub fn new(rows: Vec<Account>) -> Self {
        Self {
            rows: Mutex::new(rows),
            unavailable: Mutex::new(false),
        }
    }

    pub fn set_rows(&self, rows: Vec<Account>) {
        *self.rows.lock().unwrap_or_else(|p| p.into_inner()) = rows;
    }

    /// While set, every read fails as if the database were down.
    pub fn set_unavailable(&self, down: bool) {
        *self.unavailable.lock().unwrap_or_else(|p| p.into_inner()) = down;
    }
}

#[async_trait]
impl DesiredSource for StaticSource {
    async fn enabled_accounts(&self) -> Result<Vec<Account>> {
        if *self.unavailable.lock().unwrap_or_else(|p| p.into_inner()) {
            bail!("desired source unavailable");
        }
        Ok(self.rows.lock().unwrap_or_else(|p| p.into_inner()).clone())
    }
}

/// Ledger that records every accepted write, in order.
#[derive(Default)]
pub struct RecordingLedger {
    writes: Mutex<Vec<(String, TrafficSample)>>,
    fail: Mutex<HashSet<String>>,
}

impl RecordingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, email: &str, fail: bool) {
        let mut set = self.fail.lock().unwrap_or_else(|p| p.into_inner());
        if fail {
            set.insert(email.to_string());
        } else {
            set.remove(email);
        }
    }

    pub fn writes(&self) -> Vec<(String, TrafficSample)> {
        self.writes.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Sum of every accepted write for `email`.
    pub fn total_for(&self, email: &str) -> TrafficSample {
        self.writes()
            .iter()
            .filter(|(e, _)| e == email)
            .fold(TrafficSample::default(), |acc, (_, s)| {
                TrafficSample::new(acc.download + s.download, acc.upload + s.upload)
            })
    }
}

#[async_trait]
impl TrafficLedger for RecordingLedger {
    async fn add_traffic(&self, email: &str, sample: TrafficSample) -> Result<()> {
        if self.fail.lock().unwrap_or_else(|p| p.into_inner()).contains(email) {
            return Err(anyhow!("ledger write rejected for {email}"));
        }
        self.writes
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((email.to_string(), sample));
        Ok(())
    }
}

/// [`MemoryStore`] whose load and save can be made to fail independently.
#[derive(Default)]
pub struct ScriptedStore {
    inner: MemoryStore,
    fail_load: Mutex<bool>,
    fail_save: Mutex<bool>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_load(&self, fail: bool) {
        *self.fail_load.lock().unwrap_or_else(|p| p.into_inner()) = fail;
    }

    pub fn set_fail_save(&self, fail: bool) {
        *self.fail_save.lock().unwrap_or_else(|p| p.into_inner()) = fail;
    }

    /// What the last successful save persisted, regardless of injected
    /// load failures.
    pub fn applied(&self) -> AccountSet {
        self.inner.load().unwrap_or_default()
    }
}

impl SnapshotStore for ScriptedStore {
    fn load(&self) -> Result<AccountSet> {
        if *self.fail_load.lock().unwrap_or_else(|p| p.into_inner()) {
            bail!("snapshot unreadable");
        }
        self.inner.load()
    }

    fn save(&self, applied: &AccountSet) -> Result<()> {
        if *self.fail_save.lock().unwrap_or_else(|p| p.into_inner()) {
            bail!("snapshot not writable");
        }
        self.inner.save(applied)
    }

    fn reset(&self) -> Result<()> {
        self.inner.reset()
    }
}
