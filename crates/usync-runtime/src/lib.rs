//! usync-runtime
//!
//! Drives one reconcile cycle end to end: read the desired set, load the
//! applied snapshot, execute the plan against the control plane with
//! per-account failure isolation, settle traffic for every desired account,
//! then persist what actually got applied.
//!
//! The collaborators are traits so the cycle runs without a database, a
//! proxy or a filesystem in tests (see `usync-testkit`).

use anyhow::Result;
use async_trait::async_trait;
use usync_schemas::{Account, TrafficSample};

mod reconciler;
mod report;
mod settlement;
mod sources;
mod wiring;

pub use reconciler::{preview, Reconciler, ReconcilerOptions};
pub use report::{
    CounterDirection, CounterFailure, CycleError, CycleReport, CycleSummary, FailedOp,
    LostTraffic, MutationOp, SettledTraffic,
};
pub use settlement::{AccountSettlement, SettlementOutcome, TrafficSettlement};
pub use sources::MySqlSource;
pub use wiring::{account_profile, connect_database, connect_reconciler, snapshot_store};

/// Source of truth for which accounts should exist.
#[async_trait]
pub trait DesiredSource: Send + Sync {
    /// Every currently enabled account, in source order. An error aborts the
    /// cycle before anything is mutated.
    async fn enabled_accounts(&self) -> Result<Vec<Account>>;
}

/// Cumulative traffic accounting in the source of truth.
#[async_trait]
pub trait TrafficLedger: Send + Sync {
    /// Add `sample` to the account's counters (add-to-existing).
    async fn add_traffic(&self, email: &str, sample: TrafficSample) -> Result<()>;
}
