//! Runtime secret resolution.
//!
//! Config stores only env var NAMES. [`resolve_secrets`] is called once at
//! startup; the result is passed into constructors. Error messages mention the
//! variable NAME, never its value, and `Debug` output is redacted.

use anyhow::{bail, Result};

use crate::SyncConfig;

#[derive(Clone)]
pub struct ResolvedSecrets {
    /// MySQL connection URL (credentials included).
    pub database_url: String,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("database_url", &"<REDACTED>")
            .finish()
    }
}

/// Unset or blank resolves to `None`.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

pub fn resolve_secrets(cfg: &SyncConfig) -> Result<ResolvedSecrets> {
    let var = cfg.database.url_env.trim();
    let Some(database_url) = resolve_env(var) else {
        bail!("SECRET_MISSING: env var {var} (database.url_env) is not set");
    };
    Ok(ResolvedSecrets { database_url })
}
