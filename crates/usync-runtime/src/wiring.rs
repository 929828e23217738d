//! Production wiring: MySQL panel + Xray gRPC + JSON snapshot file.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::mysql::MySqlPool;
use tracing::info;
use usync_config::{ResolvedSecrets, SyncConfig};
use usync_control::XrayClient;
use usync_db::AccountProfile;
use usync_state::{JsonFileStore, SnapshotStore};

use crate::{MySqlSource, Reconciler, ReconcilerOptions};

pub fn account_profile(cfg: &SyncConfig) -> AccountProfile {
    AccountProfile {
        inbound_tag: cfg.accounts.inbound_tag.clone(),
        level: cfg.accounts.level,
    }
}

pub fn snapshot_store(cfg: &SyncConfig) -> Arc<JsonFileStore> {
    Arc::new(JsonFileStore::new(&cfg.snapshot.path))
}

/// Open the database pool. Fatal at startup.
pub async fn connect_database(cfg: &SyncConfig, secrets: &ResolvedSecrets) -> Result<MySqlPool> {
    let pool = usync_db::connect(&secrets.database_url, cfg.database.max_connections)
        .await
        .context("database connect failed")?;
    info!(max_connections = cfg.database.max_connections, "database pool ready");
    Ok(pool)
}

/// Connect every collaborator and assemble a reconciler. Fails if either the
/// database or the control plane cannot be reached.
pub async fn connect_reconciler(cfg: &SyncConfig, secrets: &ResolvedSecrets) -> Result<Reconciler> {
    let pool = connect_database(cfg, secrets).await?;

    let control = XrayClient::connect(&cfg.control_plane)
        .await
        .with_context(|| {
            format!(
                "control plane connect failed: {}",
                cfg.control_plane.endpoint_uri()
            )
        })?;
    info!(endpoint = %cfg.control_plane.endpoint_uri(), "control plane connected");

    let panel = Arc::new(MySqlSource::new(pool, account_profile(cfg)));
    let store: Arc<dyn SnapshotStore> = snapshot_store(cfg);
    Ok(Reconciler::new(
        panel.clone(),
        store,
        Arc::new(control),
        panel,
        ReconcilerOptions::from_config(cfg),
    ))
}
