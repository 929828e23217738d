use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use usync_control::{ControlPlane, ControlPlaneError};
use usync_schemas::{Account, AccountSet};

/// One call as the fake control plane received it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Add { email: String, inbound_tag: String },
    Remove { email: String, inbound_tag: String },
    Query { name: String, reset: bool },
}

#[derive(Default)]
struct Inner {
    /// (inbound_tag, email) -> account, like a real inbound user table.
    users: BTreeMap<(String, String), Account>,
    counters: HashMap<String, i64>,
    calls: Vec<Call>,
    fail_add: HashSet<String>,
    fail_remove: HashSet<String>,
    fail_counter: HashSet<String>,
    stall: HashSet<String>,
}

/// Fake proxy admin API.
///
/// Behaves like the real one where it matters to the reconciler: adding an
/// email already present on the inbound is rejected, removing an absent one is
/// rejected, and counters are zeroed by a resetting read. Failures and stalls
/// are injected per email (or per counter name).
#[derive(Default)]
pub struct FakeControlPlane {
    inner: Mutex<Inner>,
    stall_for: Duration,
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls for stalled emails sleep this long before answering.
    pub fn with_stall(stall_for: Duration) -> Self {
        Self {
            inner: Mutex::default(),
            stall_for,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A panicking test thread is the only way to poison this.
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Pretend `account` is already attached (no call recorded).
    pub fn seed(&self, account: Account) {
        self.lock().users.insert(
            (account.inbound_tag.clone(), account.email.clone()),
            account,
        );
    }

    pub fn set_counter(&self, name: impl Into<String>, value: i64) {
        self.lock().counters.insert(name.into(), value);
    }

    /// Set both directional counters for `email`.
    pub fn set_traffic(&self, email: &str, download: i64, upload: i64) {
        self.set_counter(usync_control::downlink_counter(email), download);
        self.set_counter(usync_control::uplink_counter(email), upload);
    }

    pub fn counter(&self, name: &str) -> Option<i64> {
        self.lock().counters.get(name).copied()
    }

    pub fn fail_add(&self, email: &str, fail: bool) {
        toggle(&mut self.lock().fail_add, email, fail);
    }

    pub fn fail_remove(&self, email: &str, fail: bool) {
        toggle(&mut self.lock().fail_remove, email, fail);
    }

    pub fn fail_counter(&self, name: &str, fail: bool) {
        toggle(&mut self.lock().fail_counter, name, fail);
    }

    /// Make every call touching `email` stall (see [`Self::with_stall`]).
    pub fn stall(&self, email: &str, stall: bool) {
        toggle(&mut self.lock().stall, email, stall);
    }

    /// Stall reads of one counter only.
    pub fn stall_counter(&self, name: &str, stall: bool) {
        toggle(&mut self.lock().stall, name, stall);
    }

    /// Accounts currently attached, keyed by email.
    pub fn users(&self) -> AccountSet {
        self.lock().users.values().cloned().collect()
    }

    pub fn has_user(&self, email: &str) -> bool {
        self.lock().users.keys().any(|(_, e)| e == email)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Add/remove calls only.
    pub fn mutations(&self) -> Vec<Call> {
        self.lock()
            .calls
            .iter()
            .filter(|c| !matches!(c, Call::Query { .. }))
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    async fn maybe_stall(&self, key: &str) {
        let stalled = self.lock().stall.contains(key);
        if stalled {
            tokio::time::sleep(self.stall_for).await;
        }
    }
}

fn toggle(set: &mut HashSet<String>, key: &str, on: bool) {
    if on {
        set.insert(key.to_string());
    } else {
        set.remove(key);
    }
}

fn rpc(message: String) -> ControlPlaneError {
    ControlPlaneError::Rpc {
        code: "Unknown".to_string(),
        message,
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn add_account(&self, account: &Account) -> Result<(), ControlPlaneError> {
        self.lock().calls.push(Call::Add {
            email: account.email.clone(),
            inbound_tag: account.inbound_tag.clone(),
        });
        self.maybe_stall(&account.email).await;

        let mut inner = self.lock();
        if inner.fail_add.contains(&account.email) {
            return Err(ControlPlaneError::Transport(format!(
                "injected add failure for {}",
                account.email
            )));
        }
        let key = (account.inbound_tag.clone(), account.email.clone());
        if inner.users.contains_key(&key) {
            return Err(rpc(format!("User {} already exists.", account.email)));
        }
        inner.users.insert(key, account.clone());
        Ok(())
    }

    async fn remove_account(&self, email: &str, inbound_tag: &str) -> Result<(), ControlPlaneError> {
        self.lock().calls.push(Call::Remove {
            email: email.to_string(),
            inbound_tag: inbound_tag.to_string(),
        });
        self.maybe_stall(email).await;

        let mut inner = self.lock();
        if inner.fail_remove.contains(email) {
            return Err(ControlPlaneError::Transport(format!(
                "injected remove failure for {email}"
            )));
        }
        let key = (inbound_tag.to_string(), email.to_string());
        match inner.users.remove(&key) {
            Some(_) => Ok(()),
            None => Err(rpc(format!("User {email} not found."))),
        }
    }

    async fn query_counter(&self, name: &str, reset: bool) -> Result<Option<i64>, ControlPlaneError> {
        self.lock().calls.push(Call::Query {
            name: name.to_string(),
            reset,
        });
        // user>>>{email}>>>traffic>>>{dir}
        let email = name.split(">>>").nth(1).unwrap_or(name);
        let stalled = {
            let inner = self.lock();
            inner.stall.contains(email) || inner.stall.contains(name)
        };
        if stalled {
            tokio::time::sleep(self.stall_for).await;
        }

        let mut inner = self.lock();
        if inner.fail_counter.contains(name) {
            return Err(ControlPlaneError::Transport(format!(
                "injected counter failure for {name}"
            )));
        }
        let value = if reset {
            inner.counters.get_mut(name).map(std::mem::take)
        } else {
            inner.counters.get(name).copied()
        };
        Ok(value)
    }
}
