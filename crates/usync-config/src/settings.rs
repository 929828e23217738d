//! Typed view of the merged config.
//!
//! Every section and field has a default taken from the reference deployment,
//! so an empty config is valid. [`SyncConfig::from_json`] validates values that
//! would otherwise only fail at runtime (zero intervals, empty inbound tag).

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub database: DatabaseSettings,
    pub control_plane: ControlPlaneSettings,
    pub accounts: AccountsSettings,
    pub reconcile: ReconcileSettings,
    pub snapshot: SnapshotSettings,
    pub daemon: DaemonSettings,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            database: DatabaseSettings::default(),
            control_plane: ControlPlaneSettings::default(),
            accounts: AccountsSettings::default(),
            reconcile: ReconcileSettings::default(),
            snapshot: SnapshotSettings::default(),
            daemon: DaemonSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// NAME of the env var holding the MySQL URL.
    pub url_env: String,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url_env: "USYNC_DATABASE_URL".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlPlaneSettings {
    pub address: String,
    pub port: u16,
    pub connect_timeout_ms: u64,
    pub call_timeout_ms: u64,
    pub cipher: Cipher,
}

impl Default for ControlPlaneSettings {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 9085,
            connect_timeout_ms: 5_000,
            call_timeout_ms: 5_000,
            cipher: Cipher::Aes128Gcm,
        }
    }
}

impl ControlPlaneSettings {
    /// `http://address:port`, the form tonic endpoints expect.
    pub fn endpoint_uri(&self) -> String {
        format!("http://{}:{}", self.address, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

/// Shadowsocks AEAD ciphers accepted by the inbound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cipher {
    #[serde(rename = "aes-128-gcm")]
    Aes128Gcm,
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,
    #[serde(rename = "chacha20-poly1305")]
    Chacha20Poly1305,
    #[serde(rename = "xchacha20-poly1305")]
    Xchacha20Poly1305,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountsSettings {
    pub inbound_tag: String,
    pub level: u32,
}

impl Default for AccountsSettings {
    fn default() -> Self {
        Self {
            inbound_tag: "ssapi".to_string(),
            level: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileSettings {
    pub interval_secs: u64,
    pub noise_floor_bytes: i64,
    /// Wipe the snapshot before the first cycle, forcing a full resync.
    ///
    /// Only safe when the proxy restarts along with the daemon. If the proxy
    /// kept its users, every add is rejected as a duplicate, those accounts
    /// never re-enter the snapshot, and their later credential changes and
    /// removals are never issued. Disable it when the proxy outlives the
    /// daemon.
    pub cold_start: bool,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            noise_floor_bytes: 100,
            cold_start: true,
        }
    }
}

impl ReconcileSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotSettings {
    pub path: String,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            path: "current_users.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonSettings {
    /// Bind address of the read-only status surface. Unset = disabled.
    pub status_addr: Option<String>,
}

impl DaemonSettings {
    pub fn status_socket_addr(&self) -> Result<Option<SocketAddr>> {
        match self.status_addr.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => s
                .parse()
                .map(Some)
                .with_context(|| format!("invalid daemon.status_addr: {s}")),
        }
    }
}

impl SyncConfig {
    pub fn from_json(config_json: &Value) -> Result<Self> {
        let cfg: SyncConfig =
            serde_json::from_value(config_json.clone()).context("config does not match schema")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.url_env.trim().is_empty() {
            bail!("CONFIG_INVALID: database.url_env must name an env var");
        }
        if self.database.max_connections == 0 {
            bail!("CONFIG_INVALID: database.max_connections must be > 0");
        }
        if self.control_plane.address.trim().is_empty() {
            bail!("CONFIG_INVALID: control_plane.address is empty");
        }
        if self.control_plane.port == 0 {
            bail!("CONFIG_INVALID: control_plane.port must be > 0");
        }
        if self.control_plane.connect_timeout_ms == 0 || self.control_plane.call_timeout_ms == 0 {
            bail!("CONFIG_INVALID: control_plane timeouts must be > 0");
        }
        if self.accounts.inbound_tag.trim().is_empty() {
            bail!("CONFIG_INVALID: accounts.inbound_tag is empty");
        }
        if self.reconcile.interval_secs == 0 {
            bail!("CONFIG_INVALID: reconcile.interval_secs must be > 0");
        }
        if self.reconcile.noise_floor_bytes < 0 {
            bail!("CONFIG_INVALID: reconcile.noise_floor_bytes must be >= 0");
        }
        if self.snapshot.path.trim().is_empty() {
            bail!("CONFIG_INVALID: snapshot.path is empty");
        }
        self.daemon.status_socket_addr()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_uri_uses_http_scheme() {
        let cp = ControlPlaneSettings::default();
        assert_eq!(cp.endpoint_uri(), "http://127.0.0.1:9085");
    }

    #[test]
    fn blank_status_addr_is_disabled() {
        let d = DaemonSettings {
            status_addr: Some("  ".to_string()),
        };
        assert_eq!(d.status_socket_addr().unwrap(), None);
    }
}
