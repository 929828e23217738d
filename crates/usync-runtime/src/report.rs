//! Per-cycle outcome reporting.
//!
//! The reconciler never decides how a failure is surfaced; it records it in
//! the [`CycleReport`] and carries on with the next account.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use usync_schemas::TrafficSample;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOp {
    Add,
    Remove,
    /// Remove half of an update; the add was not attempted.
    UpdateRemove,
    /// Add half of an update; the old record is already gone.
    UpdateAdd,
}

impl fmt::Display for MutationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MutationOp::Add => "add",
            MutationOp::Remove => "remove",
            MutationOp::UpdateRemove => "update_remove",
            MutationOp::UpdateAdd => "update_add",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FailedOp {
    pub email: String,
    pub op: MutationOp,
    pub error: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterDirection {
    Uplink,
    Downlink,
}

/// A counter read failed; the direction counted as zero for this interval.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CounterFailure {
    pub email: String,
    pub direction: CounterDirection,
    pub error: String,
}

/// Traffic written back to the source of truth.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SettledTraffic {
    pub email: String,
    pub sample: TrafficSample,
}

/// Traffic whose write-back failed. The remote counter was already reset,
/// so this sample is gone for good.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LostTraffic {
    pub email: String,
    pub sample: TrafficSample,
    pub error: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Size of the desired set.
    pub desired: usize,
    /// Size of the applied set persisted at the end of the cycle.
    pub applied: usize,
    /// Emails that appeared on more than one enabled row.
    pub duplicates: Vec<String>,
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
    pub failed: Vec<FailedOp>,
    pub settled: Vec<SettledTraffic>,
    /// Accounts with traffic at or under the noise floor (not written).
    pub below_floor: usize,
    pub counter_failures: Vec<CounterFailure>,
    pub lost_traffic: Vec<LostTraffic>,
}

impl CycleReport {
    pub fn new(cycle_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            cycle_id,
            started_at,
            finished_at: started_at,
            desired: 0,
            applied: 0,
            duplicates: Vec::new(),
            added: Vec::new(),
            updated: Vec::new(),
            removed: Vec::new(),
            failed: Vec::new(),
            settled: Vec::new(),
            below_floor: 0,
            counter_failures: Vec::new(),
            lost_traffic: Vec::new(),
        }
    }

    /// No mutation failed and no traffic was lost.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.counter_failures.is_empty() && self.lost_traffic.is_empty()
    }

    pub fn summary(&self) -> CycleSummary {
        CycleSummary {
            cycle_id: self.cycle_id,
            finished_at: self.finished_at,
            desired: self.desired,
            applied: self.applied,
            added: self.added.len(),
            updated: self.updated.len(),
            removed: self.removed.len(),
            failed: self.failed.len(),
            settled: self.settled.len(),
            below_floor: self.below_floor,
            counter_failures: self.counter_failures.len(),
            lost_traffic: self.lost_traffic.len(),
        }
    }
}

/// Counts-only view of a [`CycleReport`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub cycle_id: Uuid,
    pub finished_at: DateTime<Utc>,
    pub desired: usize,
    pub applied: usize,
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub failed: usize,
    pub settled: usize,
    pub below_floor: usize,
    pub counter_failures: usize,
    pub lost_traffic: usize,
}

/// A cycle that could not complete.
#[derive(Debug)]
pub enum CycleError {
    /// Desired set unreadable; nothing was mutated.
    DesiredUnavailable(String),
    /// Applied snapshot unreadable; nothing was mutated.
    SnapshotLoad(String),
    /// Mutations and settlement ran but the new applied set was not persisted.
    SnapshotSave {
        message: String,
        report: Box<CycleReport>,
    },
}

impl CycleError {
    /// The partial report, when the cycle got far enough to produce one.
    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            CycleError::SnapshotSave { report, .. } => Some(report),
            _ => None,
        }
    }
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleError::DesiredUnavailable(msg) => {
                write!(f, "desired set unavailable, cycle aborted: {msg}")
            }
            CycleError::SnapshotLoad(msg) => {
                write!(f, "applied snapshot unreadable, cycle aborted: {msg}")
            }
            CycleError::SnapshotSave { message, .. } => {
                write!(f, "applied snapshot not saved: {message}")
            }
        }
    }
}

impl std::error::Error for CycleError {}
