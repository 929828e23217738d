//! JSON file snapshot.
//!
//! Saves are crash-atomic: the document is written to a temp file in the
//! target directory, fsynced, then renamed over the old file. A crash leaves
//! either the old snapshot or the new one, never a torn file.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use usync_schemas::{Account, AccountSet};

use crate::SnapshotStore;

pub const SNAPSHOT_SCHEMA: &str = "usync.applied.v1";

/// On-disk form. Accounts are sorted by email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDocument {
    pub schema: String,
    pub accounts: Vec<Account>,
}

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> Result<AccountSet> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(AccountSet::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("read snapshot: {}", self.path.display()));
            }
        };

        let doc: SnapshotDocument = serde_json::from_slice(&raw)
            .with_context(|| format!("parse snapshot: {}", self.path.display()))?;
        if doc.schema != SNAPSHOT_SCHEMA {
            bail!(
                "snapshot schema mismatch in {}: expected '{}', got '{}'",
                self.path.display(),
                SNAPSHOT_SCHEMA,
                doc.schema
            );
        }

        let (set, duplicates) = AccountSet::from_accounts(doc.accounts);
        if !duplicates.is_empty() {
            bail!(
                "snapshot {} lists duplicate emails: {:?}",
                self.path.display(),
                duplicates
            );
        }
        Ok(set)
    }

    fn save(&self, applied: &AccountSet) -> Result<()> {
        let doc = SnapshotDocument {
            schema: SNAPSHOT_SCHEMA.to_string(),
            accounts: applied.clone().into_vec(),
        };
        let mut bytes = serde_json::to_vec_pretty(&doc).context("serialize snapshot")?;
        bytes.push(b'\n');

        let dir = self.parent_dir();
        fs::create_dir_all(&dir)
            .with_context(|| format!("create snapshot dir: {}", dir.display()))?;

        let mut tmp = NamedTempFile::new_in(&dir)
            .with_context(|| format!("create temp snapshot in {}", dir.display()))?;
        tmp.write_all(&bytes).context("write temp snapshot")?;
        tmp.as_file().sync_all().context("fsync temp snapshot")?;
        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .with_context(|| format!("rename snapshot into {}", self.path.display()))?;
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("remove snapshot: {}", self.path.display()))
            }
        }
    }
}
