use anyhow::{Context, Result};
use usync_schemas::Account;

/// One enabled row of the panel's `user` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub port: i64,
    pub passwd: String,
}

/// Deployment-wide attributes stamped onto every account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountProfile {
    pub inbound_tag: String,
    pub level: u32,
}

impl UserRow {
    /// Deterministic mapping: the same row always yields the same account, so
    /// an unchanged row diffs as "no change".
    pub fn to_account(&self, profile: &AccountProfile) -> Account {
        Account {
            email: self.port.to_string(),
            level: profile.level,
            inbound_tag: profile.inbound_tag.clone(),
            password: derive_password(self.port, &self.passwd),
        }
    }
}

/// Port digits followed by the stored secret.
pub fn derive_password(port: i64, passwd: &str) -> String {
    format!("{port}{passwd}")
}

/// Inverse of the email mapping, for the traffic write.
pub fn port_from_email(email: &str) -> Result<i64> {
    email
        .trim()
        .parse::<i64>()
        .with_context(|| format!("account email {email:?} is not a port number"))
}
