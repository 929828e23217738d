//! Shared runtime state for usync-daemon.
//!
//! The run loop is the only writer; HTTP handlers only read. Handlers receive
//! `State<Arc<AppState>>` from Axum.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use usync_runtime::{CycleError, CycleReport, CycleSummary};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health / status responses.
#[derive(Clone, Debug, Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// StatusSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time view of the reconcile loop, returned by GET /v1/status.
#[derive(Clone, Debug, Serialize)]
pub struct StatusSnapshot {
    pub daemon_uptime_secs: u64,
    /// "starting" | "idle" | "reconciling" | "stopping"
    pub state: String,
    pub config_hash: Option<String>,
    /// Cycles that ran to the end (including ones with per-account failures).
    pub cycles_completed: u64,
    /// Cycles that aborted or could not persist their snapshot.
    pub cycles_failed: u64,
    pub last_cycle_id: Option<Uuid>,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_summary: Option<CycleSummary>,
    pub last_error: Option<String>,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared by the run loop and all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub build: BuildInfo,
    pub status: Arc<RwLock<StatusSnapshot>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        let initial_status = StatusSnapshot {
            daemon_uptime_secs: uptime_secs(),
            state: "starting".to_string(),
            config_hash: None,
            cycles_completed: 0,
            cycles_failed: 0,
            last_cycle_id: None,
            last_cycle_at: None,
            last_summary: None,
            last_error: None,
        };

        Self {
            build: BuildInfo {
                service: "usync-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            status: Arc::new(RwLock::new(initial_status)),
        }
    }

    pub async fn set_config_hash(&self, hash: &str) {
        self.status.write().await.config_hash = Some(hash.to_string());
    }

    pub async fn set_state(&self, state: &str) {
        self.status.write().await.state = state.to_string();
    }

    /// Fold one cycle outcome into the status snapshot.
    pub async fn record_cycle(&self, outcome: &Result<CycleReport, CycleError>) {
        let mut st = self.status.write().await;
        match outcome {
            Ok(report) => {
                st.cycles_completed += 1;
                st.last_cycle_id = Some(report.cycle_id);
                st.last_cycle_at = Some(report.finished_at);
                st.last_summary = Some(report.summary());
                st.last_error = None;
            }
            Err(err) => {
                st.cycles_failed += 1;
                if let Some(report) = err.report() {
                    st.last_cycle_id = Some(report.cycle_id);
                    st.last_cycle_at = Some(report.finished_at);
                    st.last_summary = Some(report.summary());
                } else {
                    st.last_cycle_at = Some(Utc::now());
                }
                st.last_error = Some(err.to_string());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}
