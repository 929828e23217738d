use serde::Serialize;
use usync_schemas::Account;

/// Which attribute of an account differs between applied and desired.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangedField {
    Password,
    Level,
    InboundTag,
}

/// An account present on both sides whose record differs.
///
/// The control plane has no in-place update, so this is executed as
/// remove(`previous`) followed by add(`next`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountUpdate {
    pub previous: Account,
    pub next: Account,
    pub changed: Vec<ChangedField>,
}

impl AccountUpdate {
    pub fn email(&self) -> &str {
        &self.next.email
    }
}

/// Mutations needed to move the applied set onto the desired set.
/// Every list is ordered by email.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Desired but not applied.
    pub adds: Vec<Account>,
    /// Applied with a different record.
    pub updates: Vec<AccountUpdate>,
    /// Applied but no longer desired. Carries the applied record so the
    /// remove targets the inbound the account was actually attached to.
    pub removes: Vec<Account>,
    /// Present on both sides and identical.
    pub unchanged: usize,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.updates.is_empty() && self.removes.is_empty()
    }

    /// Number of control-plane calls a fully successful execution issues.
    pub fn mutation_calls(&self) -> usize {
        self.adds.len() + 2 * self.updates.len() + self.removes.len()
    }
}
