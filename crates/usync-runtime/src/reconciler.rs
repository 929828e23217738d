//! The reconcile cycle.
//!
//! One cycle, in order:
//! 1. read desired (abort on failure) and applied (abort on failure);
//! 2. add accounts missing from the applied set;
//! 3. update changed accounts as remove-then-add;
//! 4. remove accounts no longer desired;
//! 5. settle traffic for every desired account;
//! 6. persist the working copy unconditionally.
//!
//! The working copy starts as the applied set and only changes when a call
//! succeeds, so the persisted snapshot always matches what the control plane
//! confirmed. Failed operations are exactly the ones the next diff retries.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, info_span, warn, Instrument};
use usync_config::SyncConfig;
use usync_control::ControlPlane;
use usync_reconcile::{plan, ReconcilePlan};
use usync_schemas::AccountSet;
use usync_state::SnapshotStore;
use uuid::Uuid;

use crate::report::{CycleError, CycleReport, FailedOp, LostTraffic, MutationOp, SettledTraffic};
use crate::settlement::{bounded, SettlementOutcome, TrafficSettlement};
use crate::{DesiredSource, TrafficLedger};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcilerOptions {
    /// Upper bound on every control-plane call.
    pub call_timeout: Duration,
    /// Traffic at or under this many bytes in both directions is not written.
    pub noise_floor: i64,
}

impl Default for ReconcilerOptions {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(5),
            noise_floor: 100,
        }
    }
}

impl ReconcilerOptions {
    pub fn from_config(cfg: &SyncConfig) -> Self {
        Self {
            call_timeout: cfg.control_plane.call_timeout(),
            noise_floor: cfg.reconcile.noise_floor_bytes,
        }
    }
}

/// Compute the plan the next cycle would execute from the same inputs.
/// Nothing is mutated and no counter is read.
pub async fn preview(
    desired: &dyn DesiredSource,
    store: &dyn SnapshotStore,
) -> Result<ReconcilePlan, CycleError> {
    let (desired, _) = read_desired(desired).await?;
    let applied = read_applied(store)?;
    Ok(plan(&desired, &applied))
}

async fn read_desired(source: &dyn DesiredSource) -> Result<(AccountSet, Vec<String>), CycleError> {
    let rows = source.enabled_accounts().await.map_err(|e| {
        let msg = format!("{e:#}");
        error!(error = %msg, "failed to read desired accounts; cycle aborted");
        CycleError::DesiredUnavailable(msg)
    })?;
    Ok(AccountSet::from_accounts(rows))
}

fn read_applied(store: &dyn SnapshotStore) -> Result<AccountSet, CycleError> {
    store.load().map_err(|e| {
        let msg = format!("{e:#}");
        error!(error = %msg, "failed to load applied snapshot; cycle aborted");
        CycleError::SnapshotLoad(msg)
    })
}

pub struct Reconciler {
    desired: Arc<dyn DesiredSource>,
    store: Arc<dyn SnapshotStore>,
    control: Arc<dyn ControlPlane>,
    ledger: Arc<dyn TrafficLedger>,
    opts: ReconcilerOptions,
}

impl Reconciler {
    pub fn new(
        desired: Arc<dyn DesiredSource>,
        store: Arc<dyn SnapshotStore>,
        control: Arc<dyn ControlPlane>,
        ledger: Arc<dyn TrafficLedger>,
        opts: ReconcilerOptions,
    ) -> Self {
        Self {
            desired,
            store,
            control,
            ledger,
            opts,
        }
    }

    /// Forget the applied set so the next cycle resynchronizes from empty.
    ///
    /// Assumes the control plane is empty too. Accounts it still holds are
    /// rejected on add and stay out of the applied set, so the reconciler
    /// never updates or removes them until the control plane is emptied.
    pub fn cold_start(&self) -> anyhow::Result<()> {
        self.store.reset()
    }

    /// Run one full cycle.
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("cycle", %cycle_id);
        self.run_cycle_inner(cycle_id).instrument(span).await
    }

    async fn run_cycle_inner(&self, cycle_id: Uuid) -> Result<CycleReport, CycleError> {
        let mut report = CycleReport::new(cycle_id, Utc::now());

        let (desired, duplicates) = read_desired(self.desired.as_ref()).await?;
        for email in &duplicates {
            warn!(email = %email, "email on more than one enabled row; last row wins");
        }
        report.duplicates = duplicates;
        report.desired = desired.len();

        let applied = read_applied(self.store.as_ref())?;
        let pending = plan(&desired, &applied);
        let mut working = applied;
        let limit = self.opts.call_timeout;

        for acct in &pending.adds {
            info!(email = %acct.email, inbound = %acct.inbound_tag, "adding account");
            match bounded("add_account", limit, self.control.add_account(acct)).await {
                Ok(()) => {
                    working.insert(acct.clone());
                    report.added.push(acct.email.clone());
                }
                Err(e) => {
                    warn!(email = %acct.email, op = "add", error = %e, "add failed; retry next cycle");
                    report.failed.push(FailedOp {
                        email: acct.email.clone(),
                        op: MutationOp::Add,
                        error: e.to_string(),
                    });
                }
            }
        }

        for upd in &pending.updates {
            let email = upd.email();
            info!(email = %email, changed = ?upd.changed, "updating account");

            // Never add on top of an unconfirmed remove.
            let removed = bounded(
                "remove_account",
                limit,
                self.control
                    .remove_account(&upd.previous.email, &upd.previous.inbound_tag),
            )
            .await;
            if let Err(e) = removed {
                warn!(email = %email, op = "update_remove", error = %e, "remove for update failed; retry next cycle");
                report.failed.push(FailedOp {
                    email: email.to_string(),
                    op: MutationOp::UpdateRemove,
                    error: e.to_string(),
                });
                continue;
            }
            working.remove(email);

            match bounded("add_account", limit, self.control.add_account(&upd.next)).await {
                Ok(()) => {
                    working.insert(upd.next.clone());
                    report.updated.push(email.to_string());
                }
                Err(e) => {
                    warn!(email = %email, op = "update_add", error = %e, "add after remove failed; account now absent, retry next cycle");
                    report.failed.push(FailedOp {
                        email: email.to_string(),
                        op: MutationOp::UpdateAdd,
                        error: e.to_string(),
                    });
                }
            }
        }

        for acct in &pending.removes {
            info!(email = %acct.email, inbound = %acct.inbound_tag, "removing account");
            let res = bounded(
                "remove_account",
                limit,
                self.control.remove_account(&acct.email, &acct.inbound_tag),
            )
            .await;
            match res {
                Ok(()) => {
                    working.remove(&acct.email);
                    report.removed.push(acct.email.clone());
                }
                Err(e) => {
                    warn!(email = %acct.email, op = "remove", error = %e, "remove failed; retry next cycle");
                    report.failed.push(FailedOp {
                        email: acct.email.clone(),
                        op: MutationOp::Remove,
                        error: e.to_string(),
                    });
                }
            }
        }

        let settlement = TrafficSettlement::new(
            self.control.as_ref(),
            self.ledger.as_ref(),
            limit,
            self.opts.noise_floor,
        );
        for email in desired.emails() {
            let s = settlement.settle(email).await;
            report.counter_failures.extend(s.counter_failures);
            match s.outcome {
                SettlementOutcome::BelowFloor => report.below_floor += 1,
                SettlementOutcome::Written => report.settled.push(SettledTraffic {
                    email: s.email,
                    sample: s.sample,
                }),
                SettlementOutcome::Lost { error } => report.lost_traffic.push(LostTraffic {
                    email: s.email,
                    sample: s.sample,
                    error,
                }),
            }
        }

        report.applied = working.len();
        report.finished_at = Utc::now();

        if let Err(e) = self.store.save(&working) {
            let message = format!("{e:#}");
            error!(error = %message, "failed to persist applied snapshot");
            return Err(CycleError::SnapshotSave {
                message,
                report: Box::new(report),
            });
        }

        let summary = report.summary();
        info!(
            desired = summary.desired,
            applied = summary.applied,
            added = summary.added,
            updated = summary.updated,
            removed = summary.removed,
            failed = summary.failed,
            settled = summary.settled,
            lost = summary.lost_traffic,
            "cycle complete"
        );
        Ok(report)
    }
}
