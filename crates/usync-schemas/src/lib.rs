//! Shared record types for usync.
//!
//! An [`Account`] is the unit the reconciler converges: one proxy user, keyed by
//! `email` (the panel row's port rendered as text). [`AccountSet`] is the keyed
//! collection used for both the desired set and the applied set.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One proxy account as the control plane sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Stable identity. The control plane calls this the user's email.
    pub email: String,
    /// Access tier.
    pub level: u32,
    /// Inbound the account is attached to.
    pub inbound_tag: String,
    /// Shadowsocks password.
    pub password: String,
}

impl Account {
    pub fn new(
        email: impl Into<String>,
        level: u32,
        inbound_tag: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            level,
            inbound_tag: inbound_tag.into(),
            password: password.into(),
        }
    }
}

// Password is a credential; keep it out of Debug-formatted log lines.
impl std::fmt::Display for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (level={}, inbound={})",
            self.email, self.level, self.inbound_tag
        )
    }
}

/// Accounts keyed by email. Iteration order is the key order, so everything
/// derived from a set (plans, reports, snapshot files) is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountSet {
    accounts: BTreeMap<String, Account>,
}

impl AccountSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from rows in query order. A later row with an email already
    /// seen replaces the earlier one; the replaced emails are returned sorted
    /// and deduplicated.
    pub fn from_accounts(accounts: impl IntoIterator<Item = Account>) -> (Self, Vec<String>) {
        let mut set = Self::new();
        let mut duplicates = Vec::new();
        for acct in accounts {
            if let Some(prev) = set.insert(acct) {
                duplicates.push(prev.email);
            }
        }
        duplicates.sort();
        duplicates.dedup();
        (set, duplicates)
    }

    /// Insert or replace; returns the previous record for that email.
    pub fn insert(&mut self, account: Account) -> Option<Account> {
        self.accounts.insert(account.email.clone(), account)
    }

    pub fn remove(&mut self, email: &str) -> Option<Account> {
        self.accounts.remove(email)
    }

    pub fn get(&self, email: &str) -> Option<&Account> {
        self.accounts.get(email)
    }

    pub fn contains(&self, email: &str) -> bool {
        self.accounts.contains_key(email)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn emails(&self) -> impl Iterator<Item = &str> {
        self.accounts.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn into_vec(self) -> Vec<Account> {
        self.accounts.into_values().collect()
    }
}

impl FromIterator<Account> for AccountSet {
    fn from_iter<I: IntoIterator<Item = Account>>(iter: I) -> Self {
        Self::from_accounts(iter).0
    }
}

/// Traffic drained from the control plane for one account over one interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficSample {
    /// Downlink bytes.
    pub download: i64,
    /// Uplink bytes.
    pub upload: i64,
}

impl TrafficSample {
    pub fn new(download: i64, upload: i64) -> Self {
        Self { download, upload }
    }

    /// True when at least one direction is strictly above `floor`.
    pub fn exceeds_noise_floor(&self, floor: i64) -> bool {
        self.download > floor || self.upload > floor
    }
}
